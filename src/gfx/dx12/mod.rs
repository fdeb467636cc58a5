//! DirectX 12 后端
//!
//! 用 `windows` crate 实现 `renderer::backend` 中的全部对象接口。
//!
//! # 主要组件
//!
//! - `Dx12Device`：设备和 DXGI 工厂，负责创建所有原生对象
//! - `Dx12Resource` / `Dx12DescriptorHeap`：资源与描述符堆的包装
//! - `Dx12CommandList` / `Dx12Queue` / `Dx12Fence`：命令录制与提交
//! - `Dx12SwapChain`：基于 HWND 的翻转模型交换链
//!
//! # 线程安全
//!
//! D3D12 对象本身是自由线程的，包装类型通过 `unsafe impl Send/Sync`
//! 声明这一点。命令列表只在持有它的线程上录制。

mod command;
mod convert;
mod device;
mod resource;
mod swap_chain;

pub use command::{Dx12CommandList, Dx12Fence, Dx12Queue};
pub use device::Dx12Device;
pub use resource::{Dx12DescriptorHeap, Dx12PipelineState, Dx12Resource, Dx12RootSignature};
pub use swap_chain::Dx12SwapChain;

use crate::core::error::{DaybreakError, GraphicsError};
use crate::renderer::backend::Backend;

/// DirectX 12 后端
pub struct Dx12Backend;

impl Backend for Dx12Backend {
    type Device = Dx12Device;
    type Resource = Dx12Resource;
    type DescriptorHeap = Dx12DescriptorHeap;
    type RootSignature = Dx12RootSignature;
    type PipelineState = Dx12PipelineState;
    type CommandList = Dx12CommandList;
    type Queue = Dx12Queue;
    type Fence = Dx12Fence;
    type SwapChain = Dx12SwapChain;
}

/// 把 `windows::core::Error` 映射为资源创建错误
pub(crate) fn resource_error(what: &'static str) -> impl FnOnce(windows::core::Error) -> DaybreakError {
    move |e| DaybreakError::Graphics(GraphicsError::ResourceCreation(format!("{}: {:?}", what, e)))
}

/// 把 `windows::core::Error` 映射为命令执行错误
pub(crate) fn execution_error(what: &'static str) -> impl FnOnce(windows::core::Error) -> DaybreakError {
    move |e| DaybreakError::Graphics(GraphicsError::CommandExecution(format!("{}: {:?}", what, e)))
}
