//! 模拟后端
//!
//! 记录所有调用的内存后端，供簿记逻辑的单元测试使用。资源带有唯一标识和
//! 互不重叠的 GPU 地址，上传堆资源有真实可写的内存；命令列表把录制的命令
//! 保存下来；fence 可以自动完成，也可以由测试手动触发。

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::core::error::{GraphicsError, Result};
use crate::renderer::backend::{
    Backend, DescriptorHeap, Device, GpuResource, NativeCommandList, NativeFence, NativeQueue, ResourceBarrier,
    SwapChain, TextureViewDesc,
};
use crate::renderer::command::{ClearFlags, CommandListType};
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorHeapType, GpuDescriptorHandle};
use crate::renderer::resource::{
    ClearValue, Format, HeapKind, IndexBufferView, PrimitiveTopology, ResourceDesc, ResourceDimension, ResourceFlags,
    ResourceId, ResourceStates, ScissorRect, SubresourceData, VertexBufferView, Viewport,
};
use crate::renderer::root_signature::RootSignatureDesc;

static NEXT_OBJECT_ID: AtomicUsize = AtomicUsize::new(1);

fn next_id() -> usize {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 模拟后端
pub struct MockBackend;

impl Backend for MockBackend {
    type Device = MockDevice;
    type Resource = MockResource;
    type DescriptorHeap = MockDescriptorHeap;
    type RootSignature = MockRootSignature;
    type PipelineState = MockPipelineState;
    type CommandList = MockCommandList;
    type Queue = MockQueue;
    type Fence = MockFence;
    type SwapChain = MockSwapChain;
}

// ---------------------------------------------------------------------------
// 资源
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ResourceInner {
    id: usize,
    desc: ResourceDesc,
    heap: HeapKind,
    memory: Option<Mutex<Vec<u8>>>,
    name: Mutex<String>,
}

/// 模拟资源，克隆共享同一个资源
#[derive(Debug, Clone)]
pub struct MockResource {
    inner: Arc<ResourceInner>,
}

impl MockResource {
    /// 默认堆上的资源
    pub fn new(desc: ResourceDesc) -> Self {
        Self::with_heap(desc, HeapKind::Default)
    }

    /// 指定堆类型的资源，上传/回读堆的缓冲区带有 CPU 内存
    pub fn with_heap(desc: ResourceDesc, heap: HeapKind) -> Self {
        let memory = match (heap, desc.dimension) {
            (HeapKind::Default, _) => None,
            (_, ResourceDimension::Buffer) => Some(Mutex::new(vec![0u8; desc.width as usize])),
            _ => None,
        };

        Self {
            inner: Arc::new(ResourceInner {
                id: next_id(),
                desc,
                heap,
                memory,
                name: Mutex::new(String::new()),
            }),
        }
    }

    pub fn heap(&self) -> HeapKind {
        self.inner.heap
    }

    pub fn name(&self) -> String {
        lock(&self.inner.name).clone()
    }

    /// 上传内存的拷贝
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.inner.memory.as_ref().map(|memory| lock(memory).clone())
    }

    fn memory_ptr(&self) -> Option<NonNull<u8>> {
        let memory = self.inner.memory.as_ref()?;
        NonNull::new(lock(memory).as_mut_ptr())
    }
}

impl PartialEq for MockResource {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl GpuResource for MockResource {
    fn id(&self) -> ResourceId {
        ResourceId(self.inner.id)
    }

    fn desc(&self) -> ResourceDesc {
        self.inner.desc
    }

    fn gpu_virtual_address(&self) -> u64 {
        (self.inner.id as u64) << 32
    }

    fn set_name(&self, name: &str) {
        *lock(&self.inner.name) = name.to_string();
    }
}

// ---------------------------------------------------------------------------
// 描述符堆、根签名、管线
// ---------------------------------------------------------------------------

/// 模拟描述符堆
#[derive(Debug, Clone)]
pub struct MockDescriptorHeap {
    id: usize,
    heap_type: DescriptorHeapType,
    num_descriptors: u32,
    shader_visible: bool,
}

impl PartialEq for MockDescriptorHeap {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl DescriptorHeap for MockDescriptorHeap {
    fn heap_type(&self) -> DescriptorHeapType {
        self.heap_type
    }

    fn num_descriptors(&self) -> u32 {
        self.num_descriptors
    }

    fn cpu_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle::new(self.id << 24)
    }

    fn gpu_start(&self) -> GpuDescriptorHandle {
        if self.shader_visible {
            GpuDescriptorHandle::new((self.id as u64) << 40)
        } else {
            GpuDescriptorHandle::default()
        }
    }
}

/// 模拟根签名
#[derive(Debug, Clone, PartialEq)]
pub struct MockRootSignature {
    pub id: usize,
    pub num_parameters: usize,
}

/// 模拟管线状态
#[derive(Debug, Clone, PartialEq)]
pub struct MockPipelineState {
    pub id: usize,
}

// ---------------------------------------------------------------------------
// 设备
// ---------------------------------------------------------------------------

/// 创建过的视图数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockViewCounts {
    pub shader_resource: usize,
    pub unordered_access: usize,
    pub render_target: usize,
    pub depth_stencil: usize,
}

/// 模拟设备
pub struct MockDevice {
    auto_complete_fences: bool,
    descriptor_copies: AtomicUsize,
    views: Mutex<MockViewCounts>,
    fences: Mutex<Vec<MockFence>>,
    max_samples: u32,
}

impl MockDevice {
    /// fence 在 signal 时立即完成
    pub fn new() -> Self {
        Self {
            auto_complete_fences: true,
            descriptor_copies: AtomicUsize::new(0),
            views: Mutex::new(MockViewCounts::default()),
            fences: Mutex::new(Vec::new()),
            max_samples: 4,
        }
    }

    /// fence 只在测试调用 `MockFence::complete_pending` 时完成
    pub fn with_manual_fences() -> Self {
        Self {
            auto_complete_fences: false,
            ..Self::new()
        }
    }

    /// 创建过的所有 fence
    pub fn fences(&self) -> Vec<MockFence> {
        lock(&self.fences).clone()
    }

    /// `copy_descriptors` 的调用次数
    pub fn num_descriptor_copies(&self) -> usize {
        self.descriptor_copies.load(Ordering::Relaxed)
    }

    pub fn view_counts(&self) -> MockViewCounts {
        *lock(&self.views)
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device<MockBackend> for MockDevice {
    fn create_descriptor_heap(
        &self,
        heap_type: DescriptorHeapType,
        num_descriptors: u32,
        shader_visible: bool,
    ) -> Result<MockDescriptorHeap> {
        Ok(MockDescriptorHeap {
            id: next_id(),
            heap_type,
            num_descriptors,
            shader_visible,
        })
    }

    fn descriptor_increment_size(&self, _heap_type: DescriptorHeapType) -> u32 {
        32
    }

    fn copy_descriptors(&self, _dst: CpuDescriptorHandle, _src: &[CpuDescriptorHandle], _heap_type: DescriptorHeapType) {
        self.descriptor_copies.fetch_add(1, Ordering::Relaxed);
    }

    fn create_committed_resource(
        &self,
        desc: &ResourceDesc,
        heap: HeapKind,
        _initial_state: ResourceStates,
        _clear_value: Option<&ClearValue>,
    ) -> Result<MockResource> {
        if desc.width == 0 {
            return Err(GraphicsError::ResourceCreation("zero sized resource".to_string()).into());
        }
        Ok(MockResource::with_heap(*desc, heap))
    }

    fn map(&self, resource: &MockResource) -> Result<NonNull<u8>> {
        resource
            .memory_ptr()
            .ok_or_else(|| GraphicsError::InvalidResource("resource is not CPU visible".to_string()).into())
    }

    fn required_intermediate_size(&self, resource: &MockResource, first_subresource: u32, num_subresources: u32) -> u64 {
        let desc = resource.desc();
        if desc.dimension == ResourceDimension::Buffer {
            return desc.width;
        }

        let mip_levels = desc.mip_levels.max(1) as u32;
        (first_subresource..first_subresource + num_subresources)
            .map(|subresource| {
                let mip = subresource % mip_levels;
                let width = (desc.width >> mip).max(1);
                let height = (desc.height >> mip).max(1) as u64;
                width * height * 4
            })
            .sum()
    }

    fn create_root_signature(&self, desc: &RootSignatureDesc) -> Result<MockRootSignature> {
        Ok(MockRootSignature {
            id: next_id(),
            num_parameters: desc.parameters.len(),
        })
    }

    fn create_generate_mips_pipeline(&self, _root_signature: &MockRootSignature) -> Result<MockPipelineState> {
        Ok(MockPipelineState { id: next_id() })
    }

    fn create_command_list(&self, list_type: CommandListType) -> Result<MockCommandList> {
        Ok(MockCommandList::new(list_type))
    }

    fn create_command_queue(&self, list_type: CommandListType) -> Result<MockQueue> {
        Ok(MockQueue::new(list_type))
    }

    fn create_fence(&self, initial_value: u64) -> Result<MockFence> {
        let fence = MockFence::new(initial_value, self.auto_complete_fences);
        lock(&self.fences).push(fence.clone());
        Ok(fence)
    }

    fn create_shader_resource_view(
        &self,
        _resource: Option<&MockResource>,
        _desc: Option<&TextureViewDesc>,
        _dst: CpuDescriptorHandle,
    ) {
        lock(&self.views).shader_resource += 1;
    }

    fn create_unordered_access_view(
        &self,
        _resource: Option<&MockResource>,
        _desc: Option<&TextureViewDesc>,
        _dst: CpuDescriptorHandle,
    ) {
        lock(&self.views).unordered_access += 1;
    }

    fn create_render_target_view(&self, _resource: &MockResource, _dst: CpuDescriptorHandle) {
        lock(&self.views).render_target += 1;
    }

    fn create_depth_stencil_view(&self, _resource: &MockResource, _dst: CpuDescriptorHandle) {
        lock(&self.views).depth_stencil += 1;
    }

    fn multisample_quality_levels(&self, _format: Format, max_samples: u32) -> (u32, u32) {
        let mut samples = 1;
        while samples * 2 <= max_samples.min(self.max_samples) {
            samples *= 2;
        }
        (samples, 1)
    }
}

// ---------------------------------------------------------------------------
// 命令列表
// ---------------------------------------------------------------------------

/// 录制的命令
#[derive(Debug, Clone)]
pub enum MockCommand {
    Barriers(Vec<ResourceBarrier<MockResource>>),
    CopyResource { dst: ResourceId, src: ResourceId },
    CopyBufferRegion { dst: ResourceId, src: ResourceId, size: u64 },
    ResolveSubresource { dst: ResourceId, src: ResourceId, format: Format },
    UpdateSubresources { dst: ResourceId, intermediate: ResourceId, first_subresource: u32, num_subresources: u32 },
    SetDescriptorHeaps(Vec<DescriptorHeapType>),
    SetGraphicsRootSignature(usize),
    SetComputeRootSignature(usize),
    SetGraphicsRootDescriptorTable { root_index: u32, base: GpuDescriptorHandle },
    SetComputeRootDescriptorTable { root_index: u32, base: GpuDescriptorHandle },
    SetGraphicsRootConstantBufferView { root_index: u32, address: u64 },
    SetComputeRootConstantBufferView { root_index: u32, address: u64 },
    SetGraphicsRoot32BitConstants { root_index: u32, values: Vec<u32> },
    SetComputeRoot32BitConstants { root_index: u32, values: Vec<u32> },
    SetPipelineState(usize),
    SetVertexBuffers { start_slot: u32, views: Vec<VertexBufferView> },
    SetIndexBuffer(IndexBufferView),
    SetPrimitiveTopology(PrimitiveTopology),
    SetViewports(Vec<Viewport>),
    SetScissorRects(Vec<ScissorRect>),
    SetRenderTargets { rtvs: Vec<CpuDescriptorHandle>, dsv: Option<CpuDescriptorHandle> },
    ClearRenderTargetView { rtv: CpuDescriptorHandle, color: [f32; 4] },
    ClearDepthStencilView { dsv: CpuDescriptorHandle, flags: ClearFlags, depth: f32, stencil: u8 },
    DrawInstanced { vertex_count: u32, instance_count: u32, start_vertex: u32, start_instance: u32 },
    DrawIndexedInstanced { index_count: u32, instance_count: u32, start_index: u32, base_vertex: i32, start_instance: u32 },
    Dispatch { x: u32, y: u32, z: u32 },
}

/// 模拟命令列表
#[derive(Debug)]
pub struct MockCommandList {
    id: usize,
    list_type: CommandListType,
    commands: Vec<MockCommand>,
    closed: bool,
    reset_count: usize,
}

impl MockCommandList {
    pub fn new(list_type: CommandListType) -> Self {
        Self {
            id: next_id(),
            list_type,
            commands: Vec::new(),
            closed: false,
            reset_count: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn commands(&self) -> &[MockCommand] {
        &self.commands
    }

    /// 按录制顺序展开的所有屏障
    pub fn barriers(&self) -> Vec<ResourceBarrier<MockResource>> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                MockCommand::Barriers(barriers) => Some(barriers.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn reset_count(&self) -> usize {
        self.reset_count
    }

    fn record(&mut self, command: MockCommand) {
        assert!(!self.closed, "recording into a closed command list");
        self.commands.push(command);
    }
}

impl NativeCommandList<MockBackend> for MockCommandList {
    fn list_type(&self) -> CommandListType {
        self.list_type
    }

    fn reset(&mut self) -> Result<()> {
        self.commands.clear();
        self.closed = false;
        self.reset_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(GraphicsError::CommandExecution("command list already closed".to_string()).into());
        }
        self.closed = true;
        Ok(())
    }

    fn resource_barriers(&mut self, barriers: &[ResourceBarrier<MockResource>]) {
        self.record(MockCommand::Barriers(barriers.to_vec()));
    }

    fn copy_resource(&mut self, dst: &MockResource, src: &MockResource) {
        self.record(MockCommand::CopyResource {
            dst: dst.id(),
            src: src.id(),
        });
    }

    fn copy_buffer_region(&mut self, dst: &MockResource, _dst_offset: u64, src: &MockResource, _src_offset: u64, size: u64) {
        self.record(MockCommand::CopyBufferRegion {
            dst: dst.id(),
            src: src.id(),
            size,
        });
    }

    fn resolve_subresource(
        &mut self,
        dst: &MockResource,
        _dst_subresource: u32,
        src: &MockResource,
        _src_subresource: u32,
        format: Format,
    ) {
        self.record(MockCommand::ResolveSubresource {
            dst: dst.id(),
            src: src.id(),
            format,
        });
    }

    fn update_subresources(
        &mut self,
        dst: &MockResource,
        intermediate: &MockResource,
        first_subresource: u32,
        data: &[SubresourceData<'_>],
    ) -> Result<()> {
        self.record(MockCommand::UpdateSubresources {
            dst: dst.id(),
            intermediate: intermediate.id(),
            first_subresource,
            num_subresources: data.len() as u32,
        });
        Ok(())
    }

    fn set_descriptor_heaps(&mut self, heaps: &[&MockDescriptorHeap]) {
        self.record(MockCommand::SetDescriptorHeaps(
            heaps.iter().map(|heap| heap.heap_type).collect(),
        ));
    }

    fn set_graphics_root_signature(&mut self, root_signature: &MockRootSignature) {
        self.record(MockCommand::SetGraphicsRootSignature(root_signature.id));
    }

    fn set_compute_root_signature(&mut self, root_signature: &MockRootSignature) {
        self.record(MockCommand::SetComputeRootSignature(root_signature.id));
    }

    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, base: GpuDescriptorHandle) {
        self.record(MockCommand::SetGraphicsRootDescriptorTable { root_index, base });
    }

    fn set_compute_root_descriptor_table(&mut self, root_index: u32, base: GpuDescriptorHandle) {
        self.record(MockCommand::SetComputeRootDescriptorTable { root_index, base });
    }

    fn set_graphics_root_constant_buffer_view(&mut self, root_index: u32, address: u64) {
        self.record(MockCommand::SetGraphicsRootConstantBufferView { root_index, address });
    }

    fn set_compute_root_constant_buffer_view(&mut self, root_index: u32, address: u64) {
        self.record(MockCommand::SetComputeRootConstantBufferView { root_index, address });
    }

    fn set_graphics_root_32bit_constants(&mut self, root_index: u32, constants: &[u32]) {
        self.record(MockCommand::SetGraphicsRoot32BitConstants {
            root_index,
            values: constants.to_vec(),
        });
    }

    fn set_compute_root_32bit_constants(&mut self, root_index: u32, constants: &[u32]) {
        self.record(MockCommand::SetComputeRoot32BitConstants {
            root_index,
            values: constants.to_vec(),
        });
    }

    fn set_pipeline_state(&mut self, pipeline_state: &MockPipelineState) {
        self.record(MockCommand::SetPipelineState(pipeline_state.id));
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) {
        self.record(MockCommand::SetVertexBuffers {
            start_slot,
            views: views.to_vec(),
        });
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) {
        self.record(MockCommand::SetIndexBuffer(*view));
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.record(MockCommand::SetPrimitiveTopology(topology));
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.record(MockCommand::SetViewports(viewports.to_vec()));
    }

    fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        self.record(MockCommand::SetScissorRects(rects.to_vec()));
    }

    fn set_render_targets(&mut self, rtvs: &[CpuDescriptorHandle], dsv: Option<CpuDescriptorHandle>) {
        self.record(MockCommand::SetRenderTargets {
            rtvs: rtvs.to_vec(),
            dsv,
        });
    }

    fn clear_render_target_view(&mut self, rtv: CpuDescriptorHandle, color: [f32; 4]) {
        self.record(MockCommand::ClearRenderTargetView { rtv, color });
    }

    fn clear_depth_stencil_view(&mut self, dsv: CpuDescriptorHandle, flags: ClearFlags, depth: f32, stencil: u8) {
        self.record(MockCommand::ClearDepthStencilView {
            dsv,
            flags,
            depth,
            stencil,
        });
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, start_vertex: u32, start_instance: u32) {
        self.record(MockCommand::DrawInstanced {
            vertex_count,
            instance_count,
            start_vertex,
            start_instance,
        });
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.record(MockCommand::DrawIndexedInstanced {
            index_count,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(MockCommand::Dispatch { x, y, z });
    }
}

// ---------------------------------------------------------------------------
// Fence 与队列
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FenceValues {
    completed: u64,
    signaled: u64,
}

/// 模拟 fence，克隆共享同一个 fence
#[derive(Debug, Clone)]
pub struct MockFence {
    shared: Arc<(Mutex<FenceValues>, Condvar)>,
    auto_complete: bool,
}

impl MockFence {
    pub fn new(initial_value: u64, auto_complete: bool) -> Self {
        Self {
            shared: Arc::new((
                Mutex::new(FenceValues {
                    completed: initial_value,
                    signaled: initial_value,
                }),
                Condvar::new(),
            )),
            auto_complete,
        }
    }

    fn signal(&self, value: u64) {
        let (values, cond) = &*self.shared;
        let mut values = lock(values);
        values.signaled = values.signaled.max(value);
        if self.auto_complete {
            values.completed = values.signaled;
            cond.notify_all();
        }
    }

    /// 让 GPU “执行完”所有已提交的 signal
    pub fn complete_pending(&self) {
        let (values, cond) = &*self.shared;
        let mut values = lock(values);
        values.completed = values.signaled;
        cond.notify_all();
    }

    pub fn signaled_value(&self) -> u64 {
        lock(&self.shared.0).signaled
    }
}

impl NativeFence for MockFence {
    fn completed_value(&self) -> u64 {
        lock(&self.shared.0).completed
    }

    fn wait_for_value(&self, value: u64) -> Result<()> {
        let (values, cond) = &*self.shared;
        let mut values = lock(values);
        while values.completed < value {
            values = cond.wait(values).unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        Ok(())
    }
}

/// 一次提交中的一个命令列表
#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub list_id: usize,
    pub commands: Vec<MockCommand>,
}

/// 模拟命令队列
#[derive(Debug)]
pub struct MockQueue {
    list_type: CommandListType,
    submissions: Mutex<Vec<MockSubmission>>,
    gpu_waits: Mutex<Vec<u64>>,
}

impl MockQueue {
    pub fn new(list_type: CommandListType) -> Self {
        Self {
            list_type,
            submissions: Mutex::new(Vec::new()),
            gpu_waits: Mutex::new(Vec::new()),
        }
    }

    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    /// 按提交顺序记录的命令列表快照
    pub fn submissions(&self) -> Vec<MockSubmission> {
        lock(&self.submissions).clone()
    }

    /// GPU 侧等待过的 fence 值
    pub fn gpu_waits(&self) -> Vec<u64> {
        lock(&self.gpu_waits).clone()
    }
}

impl NativeQueue<MockBackend> for MockQueue {
    fn execute_command_lists(&self, lists: &[&MockCommandList]) -> Result<()> {
        let mut submissions = lock(&self.submissions);
        for list in lists {
            if !list.closed {
                return Err(GraphicsError::CommandExecution("command list is not closed".to_string()).into());
            }
            submissions.push(MockSubmission {
                list_id: list.id,
                commands: list.commands.clone(),
            });
        }
        Ok(())
    }

    fn signal(&self, fence: &MockFence, value: u64) -> Result<()> {
        fence.signal(value);
        Ok(())
    }

    fn wait(&self, _fence: &MockFence, value: u64) -> Result<()> {
        lock(&self.gpu_waits).push(value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 交换链
// ---------------------------------------------------------------------------

/// 模拟交换链
pub struct MockSwapChain {
    buffers: Mutex<Vec<MockResource>>,
    current: AtomicU32,
    presents: Mutex<Vec<(u32, bool)>>,
    tearing_supported: bool,
}

impl MockSwapChain {
    pub fn new(buffer_count: u32, width: u32, height: u32) -> Self {
        Self {
            buffers: Mutex::new(Self::create_buffers(buffer_count, width, height)),
            current: AtomicU32::new(0),
            presents: Mutex::new(Vec::new()),
            tearing_supported: true,
        }
    }

    fn create_buffers(buffer_count: u32, width: u32, height: u32) -> Vec<MockResource> {
        (0..buffer_count)
            .map(|_| {
                MockResource::new(
                    ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, width as u64, height, 1, 1)
                        .with_flags(ResourceFlags::ALLOW_RENDER_TARGET),
                )
            })
            .collect()
    }

    /// 每次呈现的 (同步间隔, 允许撕裂)
    pub fn presents(&self) -> Vec<(u32, bool)> {
        lock(&self.presents).clone()
    }
}

impl SwapChain<MockBackend> for MockSwapChain {
    fn current_back_buffer_index(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }

    fn back_buffer(&self, index: u32) -> Result<MockResource> {
        lock(&self.buffers)
            .get(index as usize)
            .cloned()
            .ok_or_else(|| GraphicsError::SwapchainError(format!("no back buffer {}", index)).into())
    }

    fn present(&self, sync_interval: u32, allow_tearing: bool) -> Result<()> {
        let count = lock(&self.buffers).len() as u32;
        lock(&self.presents).push((sync_interval, allow_tearing));
        let next = (self.current.load(Ordering::Acquire) + 1) % count.max(1);
        self.current.store(next, Ordering::Release);
        Ok(())
    }

    fn resize_buffers(&self, buffer_count: u32, width: u32, height: u32) -> Result<()> {
        *lock(&self.buffers) = Self::create_buffers(buffer_count, width, height);
        self.current.store(0, Ordering::Release);
        Ok(())
    }

    fn tearing_supported(&self) -> bool {
        self.tearing_supported
    }

    fn format(&self) -> Format {
        Format::R8G8B8A8Unorm
    }
}
