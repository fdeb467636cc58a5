//! 图形后端模块
//!
//! `renderer` 中的 GPU 核心对后端泛型，本模块提供具体实现：
//! - DirectX 12：Windows 平台，基于 `windows` crate
//!
//! 单元测试使用 `renderer::testing` 中的模拟后端，不需要 GPU。

#[cfg(target_os = "windows")]
pub mod dx12;

#[cfg(target_os = "windows")]
pub use dx12::{Dx12Backend, Dx12Device, Dx12SwapChain};
