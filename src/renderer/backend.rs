//! 统一的图形后端接口
//!
//! 本模块定义了 GPU 核心（描述符分配、状态跟踪、命令列表、命令队列）依赖的
//! 原生对象接口。核心代码对后端泛型，DirectX 12 后端在 `gfx::dx12` 中实现，
//! 单元测试使用一个记录调用的模拟后端。
//!
//! # 设计理念
//!
//! - **抽象化**：隐藏原生 API 的调用细节，核心只处理簿记逻辑
//! - **关联类型**：每个后端用一组关联类型声明自己的设备、资源、堆等对象
//! - **零成本抽象**：全部静态分发，不使用 trait object
//! - **可测试**：簿记逻辑可以脱离 GPU 运行

use std::fmt::Debug;
use std::ptr::NonNull;

use crate::core::error::Result;
use crate::renderer::command::{ClearFlags, CommandListType};
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorHeapType, GpuDescriptorHandle};
use crate::renderer::resource::{
    ClearValue, Format, HeapKind, IndexBufferView, PrimitiveTopology, ResourceDesc, ResourceId,
    ResourceStates, ScissorRect, SubresourceData, VertexBufferView, Viewport,
};
use crate::renderer::root_signature::RootSignatureDesc;

/// 图形后端
///
/// 只是一组关联类型的集合，具体行为由各个对象 trait 定义。
pub trait Backend: Sized + Send + Sync + 'static {
    type Device: Device<Self>;
    type Resource: GpuResource;
    type DescriptorHeap: DescriptorHeap;
    type RootSignature: Clone + Send + Sync + 'static;
    type PipelineState: Clone + Send + Sync + 'static;
    type CommandList: NativeCommandList<Self>;
    type Queue: NativeQueue<Self>;
    type Fence: NativeFence;
    type SwapChain: SwapChain<Self>;
}

/// GPU 资源
///
/// 克隆只增加原生对象的引用计数。
pub trait GpuResource: Clone + Debug + Send + Sync + 'static {
    /// 全局状态表使用的稳定标识
    fn id(&self) -> ResourceId;

    /// 资源描述
    fn desc(&self) -> ResourceDesc;

    /// GPU 虚拟地址（仅缓冲区有效）
    fn gpu_virtual_address(&self) -> u64;

    /// 设置调试名称
    fn set_name(&self, name: &str);
}

/// 原生描述符堆
pub trait DescriptorHeap: Clone + PartialEq + Debug + Send + Sync + 'static {
    fn heap_type(&self) -> DescriptorHeapType;
    fn num_descriptors(&self) -> u32;
    fn cpu_start(&self) -> CpuDescriptorHandle;

    /// 着色器不可见的堆返回空句柄
    fn gpu_start(&self) -> GpuDescriptorHandle;
}

/// 纹理视图描述
///
/// 传 `None` 时使用资源自身的默认视图。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewDesc {
    pub format: Format,
    /// 起始 mip 层级（UAV 为目标层级）
    pub most_detailed_mip: u32,
    /// SRV 可见的 mip 层数，UAV 忽略
    pub mip_levels: u32,
}

/// 资源屏障
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceBarrier<R> {
    /// 状态转换
    Transition {
        resource: R,
        subresource: u32,
        before: ResourceStates,
        after: ResourceStates,
    },
    /// 别名屏障，`None` 表示任意资源
    Aliasing { before: Option<R>, after: Option<R> },
    /// UAV 屏障，`None` 表示所有 UAV 访问
    Uav { resource: Option<R> },
}

impl<R: GpuResource> ResourceBarrier<R> {
    /// 屏障作用的资源标识（转换屏障）
    pub fn transition_target(&self) -> Option<(ResourceId, u32)> {
        match self {
            ResourceBarrier::Transition {
                resource, subresource, ..
            } => Some((resource.id(), *subresource)),
            _ => None,
        }
    }
}

/// 设备
///
/// 负责创建所有原生对象。线程安全，可在多个线程间共享。
pub trait Device<B: Backend>: Send + Sync + 'static {
    /// 创建描述符堆
    fn create_descriptor_heap(
        &self,
        heap_type: DescriptorHeapType,
        num_descriptors: u32,
        shader_visible: bool,
    ) -> Result<B::DescriptorHeap>;

    /// 相邻描述符之间的字节步长
    fn descriptor_increment_size(&self, heap_type: DescriptorHeapType) -> u32;

    /// 把若干单个描述符拷贝到以 `dst` 开头的连续区间
    fn copy_descriptors(&self, dst: CpuDescriptorHandle, src: &[CpuDescriptorHandle], heap_type: DescriptorHeapType);

    /// 在指定类型的堆上创建资源
    fn create_committed_resource(
        &self,
        desc: &ResourceDesc,
        heap: HeapKind,
        initial_state: ResourceStates,
        clear_value: Option<&ClearValue>,
    ) -> Result<B::Resource>;

    /// 持久映射上传堆中的资源
    fn map(&self, resource: &B::Resource) -> Result<NonNull<u8>>;

    /// 上传指定子资源所需的中间缓冲区大小
    fn required_intermediate_size(&self, resource: &B::Resource, first_subresource: u32, num_subresources: u32) -> u64;

    fn create_root_signature(&self, desc: &RootSignatureDesc) -> Result<B::RootSignature>;

    /// 创建生成 mip 的计算管线
    fn create_generate_mips_pipeline(&self, root_signature: &B::RootSignature) -> Result<B::PipelineState>;

    fn create_command_list(&self, list_type: CommandListType) -> Result<B::CommandList>;

    fn create_command_queue(&self, list_type: CommandListType) -> Result<B::Queue>;

    fn create_fence(&self, initial_value: u64) -> Result<B::Fence>;

    /// `resource` 为 `None` 时写入空描述符
    fn create_shader_resource_view(
        &self,
        resource: Option<&B::Resource>,
        desc: Option<&TextureViewDesc>,
        dst: CpuDescriptorHandle,
    );

    /// `resource` 为 `None` 时写入空描述符
    fn create_unordered_access_view(
        &self,
        resource: Option<&B::Resource>,
        desc: Option<&TextureViewDesc>,
        dst: CpuDescriptorHandle,
    );

    fn create_render_target_view(&self, resource: &B::Resource, dst: CpuDescriptorHandle);

    fn create_depth_stencil_view(&self, resource: &B::Resource, dst: CpuDescriptorHandle);

    /// 在 `format` 下不超过 `max_samples` 的最高可用多重采样，返回 (采样数, 质量)
    fn multisample_quality_levels(&self, format: Format, max_samples: u32) -> (u32, u32);
}

/// 原生命令列表
///
/// 只录制命令，不做任何状态跟踪。
pub trait NativeCommandList<B: Backend>: Send + 'static {
    fn list_type(&self) -> CommandListType;

    /// 重置命令分配器和命令列表，开始新的录制
    fn reset(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn resource_barriers(&mut self, barriers: &[ResourceBarrier<B::Resource>]);

    fn copy_resource(&mut self, dst: &B::Resource, src: &B::Resource);

    fn copy_buffer_region(&mut self, dst: &B::Resource, dst_offset: u64, src: &B::Resource, src_offset: u64, size: u64);

    fn resolve_subresource(&mut self, dst: &B::Resource, dst_subresource: u32, src: &B::Resource, src_subresource: u32, format: Format);

    /// 经中间缓冲区把 CPU 数据上传到 `dst` 的连续子资源
    fn update_subresources(
        &mut self,
        dst: &B::Resource,
        intermediate: &B::Resource,
        first_subresource: u32,
        data: &[SubresourceData<'_>],
    ) -> Result<()>;

    fn set_descriptor_heaps(&mut self, heaps: &[&B::DescriptorHeap]);

    fn set_graphics_root_signature(&mut self, root_signature: &B::RootSignature);

    fn set_compute_root_signature(&mut self, root_signature: &B::RootSignature);

    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, base: GpuDescriptorHandle);

    fn set_compute_root_descriptor_table(&mut self, root_index: u32, base: GpuDescriptorHandle);

    fn set_graphics_root_constant_buffer_view(&mut self, root_index: u32, address: u64);

    fn set_compute_root_constant_buffer_view(&mut self, root_index: u32, address: u64);

    fn set_graphics_root_32bit_constants(&mut self, root_index: u32, constants: &[u32]);

    fn set_compute_root_32bit_constants(&mut self, root_index: u32, constants: &[u32]);

    fn set_pipeline_state(&mut self, pipeline_state: &B::PipelineState);

    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]);

    fn set_index_buffer(&mut self, view: &IndexBufferView);

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);

    fn set_viewports(&mut self, viewports: &[Viewport]);

    fn set_scissor_rects(&mut self, rects: &[ScissorRect]);

    fn set_render_targets(&mut self, rtvs: &[CpuDescriptorHandle], dsv: Option<CpuDescriptorHandle>);

    fn clear_render_target_view(&mut self, rtv: CpuDescriptorHandle, color: [f32; 4]);

    fn clear_depth_stencil_view(&mut self, dsv: CpuDescriptorHandle, flags: ClearFlags, depth: f32, stencil: u8);

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, start_vertex: u32, start_instance: u32);

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    );

    fn dispatch(&mut self, x: u32, y: u32, z: u32);
}

/// 原生命令队列
pub trait NativeQueue<B: Backend>: Send + Sync + 'static {
    /// 提交已关闭的命令列表
    fn execute_command_lists(&self, lists: &[&B::CommandList]) -> Result<()>;

    /// 队列执行到此处时把 fence 设为 `value`
    fn signal(&self, fence: &B::Fence, value: u64) -> Result<()>;

    /// 让队列在 GPU 侧等待 `fence` 达到 `value`
    fn wait(&self, fence: &B::Fence, value: u64) -> Result<()>;
}

/// 原生 Fence
pub trait NativeFence: Send + Sync + 'static {
    fn completed_value(&self) -> u64;

    /// 阻塞当前线程直到 fence 达到 `value`
    fn wait_for_value(&self, value: u64) -> Result<()>;
}

/// 交换链
pub trait SwapChain<B: Backend>: Send + 'static {
    fn current_back_buffer_index(&self) -> u32;

    fn back_buffer(&self, index: u32) -> Result<B::Resource>;

    fn present(&self, sync_interval: u32, allow_tearing: bool) -> Result<()>;

    /// 调整后台缓冲大小，调用前必须释放所有后台缓冲引用
    fn resize_buffers(&self, buffer_count: u32, width: u32, height: u32) -> Result<()>;

    /// 是否支持无撕裂限制的呈现
    fn tearing_supported(&self) -> bool;

    fn format(&self) -> Format;
}
