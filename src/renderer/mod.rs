//! 渲染器模块
//!
//! 与后端无关的 GPU 核心：描述符分配、资源状态跟踪、命令列表录制、
//! 动态描述符堆、命令队列和上传缓冲区。所有类型都对 `Backend` 泛型，
//! DirectX 12 实现位于 `gfx::dx12`。
//!
//! # 架构设计
//!
//! - `GpuContext`：设备和全局共享状态（描述符分配器、全局资源状态、纹理缓存）
//! - `CommandQueue`：提交命令列表并在后台回收
//! - `CommandList`：录制命令，自动插入资源屏障并提交暂存的描述符
//! - `Application`：交换链、后台缓冲和帧节奏

pub mod backend;
pub mod resource;
pub mod sync;
pub mod command;
pub mod descriptor;
pub mod root_signature;
pub mod state_tracker;
pub mod dynamic_heap;
pub mod upload;
pub mod buffer;
pub mod texture;
pub mod mips;
pub mod context;
pub mod command_list;
pub mod command_queue;
pub mod application;

#[cfg(test)]
pub mod testing;

pub use application::Application;
pub use backend::Backend;
pub use command::{ClearFlags, CommandListType, RenderTarget};
pub use command_list::CommandList;
pub use command_queue::CommandQueue;
pub use context::GpuContext;
pub use descriptor::{DescriptorAllocation, DescriptorAllocator, DescriptorHeapType};
pub use dynamic_heap::DynamicDescriptorHeap;
pub use resource::{Format, ResourceDesc, ResourceStates};
pub use root_signature::{RootSignature, RootSignatureDesc};
pub use state_tracker::ResourceStateTracker;
pub use texture::{Texture, TextureUsage};
pub use upload::UploadBuffer;
