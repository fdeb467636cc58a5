//! 资源、描述符堆、根签名和管线对象的包装

use windows::core::{Interface, HSTRING};
use windows::Win32::Graphics::Direct3D12::*;

use crate::renderer::backend::{DescriptorHeap, GpuResource};
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorHeapType, GpuDescriptorHandle};
use crate::renderer::resource::{ResourceDesc, ResourceId};

use super::convert;

/// D3D12 资源
///
/// 克隆只增加 COM 引用计数，标识取自接口指针。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dx12Resource {
    resource: ID3D12Resource,
}

// SAFETY: ID3D12Resource 是自由线程对象
unsafe impl Send for Dx12Resource {}
unsafe impl Sync for Dx12Resource {}

impl Dx12Resource {
    pub fn new(resource: ID3D12Resource) -> Self {
        Self { resource }
    }

    pub fn raw(&self) -> &ID3D12Resource {
        &self.resource
    }
}

impl GpuResource for Dx12Resource {
    fn id(&self) -> ResourceId {
        ResourceId(self.resource.as_raw() as usize)
    }

    fn desc(&self) -> ResourceDesc {
        // SAFETY: GetDesc 只读取资源创建时的描述
        let desc = unsafe { self.resource.GetDesc() };
        convert::from_resource_desc(&desc)
    }

    fn gpu_virtual_address(&self) -> u64 {
        // SAFETY: 纹理返回 0，缓冲区返回其 GPU 地址
        unsafe { self.resource.GetGPUVirtualAddress() }
    }

    fn set_name(&self, name: &str) {
        // SAFETY: HSTRING 在调用期间有效
        if let Err(e) = unsafe { self.resource.SetName(&HSTRING::from(name)) } {
            tracing::warn!(name, error = ?e, "Failed to set resource name");
        }
    }
}

/// D3D12 描述符堆
#[derive(Debug, Clone, PartialEq)]
pub struct Dx12DescriptorHeap {
    heap: ID3D12DescriptorHeap,
    heap_type: DescriptorHeapType,
    num_descriptors: u32,
    cpu_start: CpuDescriptorHandle,
    gpu_start: GpuDescriptorHandle,
}

// SAFETY: 描述符堆是自由线程对象，起始句柄在创建后不变
unsafe impl Send for Dx12DescriptorHeap {}
unsafe impl Sync for Dx12DescriptorHeap {}

impl Dx12DescriptorHeap {
    pub(crate) fn new(
        heap: ID3D12DescriptorHeap,
        heap_type: DescriptorHeapType,
        num_descriptors: u32,
        shader_visible: bool,
    ) -> Self {
        // SAFETY: 堆已创建成功，只有着色器可见的堆才能取 GPU 句柄
        let (cpu_start, gpu_start) = unsafe {
            let cpu = heap.GetCPUDescriptorHandleForHeapStart();
            let gpu = if shader_visible {
                GpuDescriptorHandle::new(heap.GetGPUDescriptorHandleForHeapStart().ptr)
            } else {
                GpuDescriptorHandle::default()
            };
            (CpuDescriptorHandle::new(cpu.ptr), gpu)
        };
        Self {
            heap,
            heap_type,
            num_descriptors,
            cpu_start,
            gpu_start,
        }
    }

    pub fn raw(&self) -> &ID3D12DescriptorHeap {
        &self.heap
    }
}

impl DescriptorHeap for Dx12DescriptorHeap {
    fn heap_type(&self) -> DescriptorHeapType {
        self.heap_type
    }

    fn num_descriptors(&self) -> u32 {
        self.num_descriptors
    }

    fn cpu_start(&self) -> CpuDescriptorHandle {
        self.cpu_start
    }

    fn gpu_start(&self) -> GpuDescriptorHandle {
        self.gpu_start
    }
}

/// D3D12 根签名
#[derive(Debug, Clone)]
pub struct Dx12RootSignature(pub(crate) ID3D12RootSignature);

// SAFETY: 根签名创建后不可变
unsafe impl Send for Dx12RootSignature {}
unsafe impl Sync for Dx12RootSignature {}

/// D3D12 管线状态对象
#[derive(Debug, Clone)]
pub struct Dx12PipelineState(pub(crate) ID3D12PipelineState);

// SAFETY: 管线状态对象创建后不可变
unsafe impl Send for Dx12PipelineState {}
unsafe impl Sync for Dx12PipelineState {}
