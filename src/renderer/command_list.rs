//! 命令列表
//!
//! 在原生命令列表之上加入资源状态跟踪、动态描述符堆、上传缓冲和对象跟踪。
//!
//! # 设计原则
//!
//! - **状态自动推导**：调用方只声明资源的目标状态，屏障由状态跟踪器生成
//! - **延迟解析**：第一次使用的资源在提交时才根据全局状态解析，写入挂起列表
//! - **描述符暂存**：SRV/UAV 先暂存在 CPU 侧，Draw/Dispatch 前统一拷贝到 GPU 堆
//! - **生命周期**：录制中引用的资源和对象被跟踪，直到列表在 GPU 上执行完毕后 `reset`
//!
//! 一个命令列表同一时间只由一个线程录制。

use std::path::Path;
use std::sync::Arc;

use bytemuck::Pod;
use tracing::info;

use crate::core::error::{GraphicsError, Result, TextureError};
use crate::renderer::backend::{Backend, Device, GpuResource, NativeCommandList, TextureViewDesc};
use crate::renderer::buffer::{AsResource, IndexBuffer, IndexElement, VertexBuffer};
use crate::renderer::command::{ClearFlags, CommandListType, RenderTarget};
use crate::renderer::context::GpuContext;
use crate::renderer::descriptor::DescriptorHeapType;
use crate::renderer::dynamic_heap::{DescriptorHeapBindings, DynamicDescriptorHeap};
use crate::renderer::mips::{plan_mip_passes, root_index, MAX_MIPS_PER_PASS};
use crate::renderer::resource::{
    Format, HeapKind, PrimitiveTopology, ResourceDesc, ResourceDimension, ResourceFlags, ResourceStates, ScissorRect,
    SubresourceData, Viewport, ALL_SUBRESOURCES, CONSTANT_BUFFER_ALIGNMENT,
};
use crate::renderer::root_signature::RootSignature;
use crate::renderer::state_tracker::{GlobalStateRegistration, GlobalStatesGuard, ResourceStateTracker};
use crate::renderer::texture::{Texture, TextureUsage};
use crate::renderer::upload::UploadBuffer;

/// 每个管线可绑定的视口/裁剪矩形数量上限
pub const MAX_VIEWPORTS: usize = 16;

/// 动态描述符堆只对着色器可见的两种堆类型存在
const DYNAMIC_HEAP_TYPES: [DescriptorHeapType; 2] = [DescriptorHeapType::CbvSrvUav, DescriptorHeapType::Sampler];

/// 录制期间需要保持存活的对象
enum TrackedObject<B: Backend> {
    Resource(B::Resource),
    RootSignature(Arc<RootSignature<B>>),
    PipelineState(B::PipelineState),
    Texture(Arc<Texture<B>>),
}

/// 命令列表
pub struct CommandList<B: Backend> {
    context: Arc<GpuContext<B>>,
    list_type: CommandListType,
    native: B::CommandList,

    upload_buffer: UploadBuffer<B>,
    tracker: ResourceStateTracker<B>,
    dynamic_heaps: [DynamicDescriptorHeap<B>; 2],
    bindings: DescriptorHeapBindings<B>,

    root_signature: Option<Arc<RootSignature<B>>>,
    tracked_objects: Vec<TrackedObject<B>>,
}

impl<B: Backend> CommandList<B> {
    /// 创建命令列表，创建后即处于录制状态
    pub fn new(context: Arc<GpuContext<B>>, list_type: CommandListType) -> Result<Self> {
        let native = context.device().create_command_list(list_type)?;
        let device = context.device_arc();
        let config = context.config();

        let upload_buffer = UploadBuffer::new(Arc::clone(device), config.upload_page_size);
        let dynamic_heaps = DYNAMIC_HEAP_TYPES.map(|heap_type| {
            DynamicDescriptorHeap::new(Arc::clone(device), heap_type, config.dynamic_descriptors_per_heap)
        });

        #[cfg(debug_assertions)]
        tracing::debug!(list_type = ?list_type, "Command list created");

        Ok(Self {
            context,
            list_type,
            native,
            upload_buffer,
            tracker: ResourceStateTracker::new(),
            dynamic_heaps,
            bindings: DescriptorHeapBindings::new(),
            root_signature: None,
            tracked_objects: Vec::new(),
        })
    }

    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    pub fn context(&self) -> &Arc<GpuContext<B>> {
        &self.context
    }

    /// 原生命令列表
    pub fn native(&self) -> &B::CommandList {
        &self.native
    }

    pub fn native_mut(&mut self) -> &mut B::CommandList {
        &mut self.native
    }

    /// CBV/SRV/UAV 动态堆
    fn view_heap_mut(&mut self) -> &mut DynamicDescriptorHeap<B> {
        &mut self.dynamic_heaps[0]
    }

    // ------------------------------------------------------------------
    // 屏障
    // ------------------------------------------------------------------

    /// 把资源转换到 `after` 状态
    ///
    /// # 参数
    ///
    /// * `resource` - 资源
    /// * `after` - 目标状态
    /// * `subresource` - 子资源下标，`ALL_SUBRESOURCES` 表示全部
    /// * `flush` - 是否立即写入屏障
    pub fn transition_resource(&mut self, resource: &B::Resource, after: ResourceStates, subresource: u32, flush: bool) {
        self.tracker.transition_resource(resource, after, subresource);
        if flush {
            self.flush_resource_barriers();
        }
    }

    /// 把纹理或缓冲区转换到 `after` 状态，没有资源时什么都不做
    pub fn transition_barrier<R: AsResource<B> + ?Sized>(
        &mut self,
        object: &R,
        after: ResourceStates,
        subresource: u32,
        flush: bool,
    ) {
        if let Some(resource) = object.as_resource() {
            self.tracker.transition_resource(resource, after, subresource);
        }
        if flush {
            self.flush_resource_barriers();
        }
    }

    /// UAV 屏障，`None` 表示所有 UAV 访问
    pub fn uav_barrier(&mut self, resource: Option<&B::Resource>, flush: bool) {
        self.tracker.uav_barrier(resource);
        if flush {
            self.flush_resource_barriers();
        }
    }

    /// 别名屏障
    pub fn aliasing_barrier(&mut self, before: Option<&B::Resource>, after: Option<&B::Resource>, flush: bool) {
        self.tracker.aliasing_barrier(before, after);
        if flush {
            self.flush_resource_barriers();
        }
    }

    /// 把已解析的屏障写入命令列表，返回写入数量
    pub fn flush_resource_barriers(&mut self) -> usize {
        self.tracker.flush_resource_barriers(&mut self.native)
    }

    // ------------------------------------------------------------------
    // 拷贝
    // ------------------------------------------------------------------

    /// 整个资源的拷贝
    pub fn copy_resource<D, S>(&mut self, dst: &D, src: &S)
    where
        D: AsResource<B> + ?Sized,
        S: AsResource<B> + ?Sized,
    {
        let (Some(dst), Some(src)) = (dst.as_resource(), src.as_resource()) else {
            return;
        };

        self.tracker
            .transition_resource(dst, ResourceStates::COPY_DEST, ALL_SUBRESOURCES);
        self.tracker
            .transition_resource(src, ResourceStates::COPY_SOURCE, ALL_SUBRESOURCES);
        self.flush_resource_barriers();

        self.native.copy_resource(dst, src);

        self.track_resource(dst);
        self.track_resource(src);
    }

    /// 把多重采样子资源解析到非多重采样子资源，使用目标格式
    pub fn resolve_subresource<D, S>(&mut self, dst: &D, src: &S, dst_subresource: u32, src_subresource: u32)
    where
        D: AsResource<B> + ?Sized,
        S: AsResource<B> + ?Sized,
    {
        let (Some(dst), Some(src)) = (dst.as_resource(), src.as_resource()) else {
            return;
        };

        self.tracker
            .transition_resource(dst, ResourceStates::RESOLVE_DEST, dst_subresource);
        self.tracker
            .transition_resource(src, ResourceStates::RESOLVE_SOURCE, src_subresource);
        self.flush_resource_barriers();

        let format = dst.desc().format;
        self.native
            .resolve_subresource(dst, dst_subresource, src, src_subresource, format);

        self.track_resource(dst);
        self.track_resource(src);
    }

    /// 在默认堆上创建缓冲区并上传数据，大小为 0 时返回 `None`
    fn copy_buffer(
        &mut self,
        data: Option<&[u8]>,
        num_elements: usize,
        element_size: usize,
        flags: ResourceFlags,
    ) -> Result<Option<(B::Resource, GlobalStateRegistration)>> {
        let size = (num_elements * element_size) as u64;
        if size == 0 {
            return Ok(None);
        }

        let device = self.context.device();
        let resource = device.create_committed_resource(
            &ResourceDesc::buffer(size, flags),
            HeapKind::Default,
            ResourceStates::COMMON,
            None,
        )?;
        let registration = self.context.register_resource_state(&resource, ResourceStates::COMMON);

        if let Some(data) = data {
            let upload = device.create_committed_resource(
                &ResourceDesc::buffer(size, ResourceFlags::NONE),
                HeapKind::Upload,
                ResourceStates::GENERIC_READ,
                None,
            )?;

            self.tracker
                .transition_resource(&resource, ResourceStates::COPY_DEST, ALL_SUBRESOURCES);
            self.flush_resource_barriers();

            let subresource = SubresourceData {
                data,
                row_pitch: size as usize,
                slice_pitch: size as usize,
            };
            self.native
                .update_subresources(&resource, &upload, 0, &[subresource])?;

            self.tracked_objects.push(TrackedObject::Resource(upload));
        }

        self.track_resource(&resource);
        Ok(Some((resource, registration)))
    }

    /// 上传顶点数据
    pub fn copy_vertex_buffer<T: Pod>(&mut self, buffer: &mut VertexBuffer<B>, vertices: &[T]) -> Result<()> {
        let stride = std::mem::size_of::<T>();
        let resource = self.copy_buffer(
            Some(bytemuck::cast_slice(vertices)),
            vertices.len(),
            stride,
            ResourceFlags::NONE,
        )?;
        let (resource, registration) = resource.unzip();
        buffer.set_resource(resource, vertices.len() as u32, stride as u32);
        if let Some(registration) = registration {
            buffer.adopt_registration(registration);
        }
        Ok(())
    }

    /// 上传索引数据，格式由元素类型决定（`u16` / `u32`）
    pub fn copy_index_buffer<I: IndexElement>(&mut self, buffer: &mut IndexBuffer<B>, indices: &[I]) -> Result<()> {
        let resource = self.copy_buffer(
            Some(bytemuck::cast_slice(indices)),
            indices.len(),
            std::mem::size_of::<I>(),
            ResourceFlags::NONE,
        )?;
        let (resource, registration) = resource.unzip();
        buffer.set_resource(resource, indices.len() as u32, I::FORMAT);
        if let Some(registration) = registration {
            buffer.adopt_registration(registration);
        }
        Ok(())
    }

    /// 经中间上传缓冲区写入纹理的连续子资源
    pub fn copy_texture_subresource(
        &mut self,
        texture: &Texture<B>,
        first_subresource: u32,
        data: &[SubresourceData<'_>],
    ) -> Result<()> {
        let Some(dst) = texture.resource() else {
            return Ok(());
        };

        self.tracker
            .transition_resource(dst, ResourceStates::COPY_DEST, ALL_SUBRESOURCES);
        self.flush_resource_barriers();

        let device = self.context.device();
        let size = device.required_intermediate_size(dst, first_subresource, data.len() as u32);
        let intermediate = device.create_committed_resource(
            &ResourceDesc::buffer(size, ResourceFlags::NONE),
            HeapKind::Upload,
            ResourceStates::GENERIC_READ,
            None,
        )?;

        self.native
            .update_subresources(dst, &intermediate, first_subresource, data)?;

        self.tracked_objects.push(TrackedObject::Resource(intermediate));
        self.track_resource(dst);
        Ok(())
    }

    // ------------------------------------------------------------------
    // 输入装配
    // ------------------------------------------------------------------

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: &VertexBuffer<B>) {
        self.transition_barrier(buffer, ResourceStates::VERTEX_AND_CONSTANT_BUFFER, ALL_SUBRESOURCES, false);
        self.native.set_vertex_buffers(slot, &[*buffer.view()]);
        if let Some(resource) = buffer.as_resource() {
            self.track_resource(resource);
        }
    }

    pub fn set_index_buffer(&mut self, buffer: &IndexBuffer<B>) {
        self.transition_barrier(buffer, ResourceStates::INDEX_BUFFER, ALL_SUBRESOURCES, false);
        self.native.set_index_buffer(buffer.view());
        if let Some(resource) = buffer.as_resource() {
            self.track_resource(resource);
        }
    }

    /// 把顶点写入上传内存并直接绑定
    pub fn set_dynamic_vertex_buffer<T: Pod>(&mut self, slot: u32, vertices: &[T]) -> Result<()> {
        let stride = std::mem::size_of::<T>();
        let size = std::mem::size_of_val(vertices);

        let mut allocation = self.upload_buffer.allocate(size, stride.next_power_of_two())?;
        allocation.write_slice(vertices);

        let view = crate::renderer::resource::VertexBufferView {
            buffer_location: allocation.gpu_address(),
            size_in_bytes: size as u32,
            stride_in_bytes: stride as u32,
        };
        self.native.set_vertex_buffers(slot, &[view]);
        Ok(())
    }

    /// 把索引写入上传内存并直接绑定
    pub fn set_dynamic_index_buffer<I: IndexElement>(&mut self, indices: &[I]) -> Result<()> {
        let size = std::mem::size_of_val(indices);

        let mut allocation = self.upload_buffer.allocate(size, std::mem::size_of::<I>())?;
        allocation.write_slice(indices);

        let view = crate::renderer::resource::IndexBufferView {
            buffer_location: allocation.gpu_address(),
            size_in_bytes: size as u32,
            format: I::FORMAT,
        };
        self.native.set_index_buffer(&view);
        Ok(())
    }

    pub fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.native.set_primitive_topology(topology);
    }

    // ------------------------------------------------------------------
    // 常量
    // ------------------------------------------------------------------

    /// 把常量写入上传内存（256 字节对齐），以根 CBV 绑定
    pub fn set_graphics_dynamic_constant_buffer<T: Pod>(&mut self, root_parameter_index: u32, data: &T) -> Result<()> {
        let mut allocation = self
            .upload_buffer
            .allocate(std::mem::size_of::<T>(), CONSTANT_BUFFER_ALIGNMENT)?;
        allocation.write(bytemuck::bytes_of(data));

        self.native
            .set_graphics_root_constant_buffer_view(root_parameter_index, allocation.gpu_address());
        Ok(())
    }

    pub fn set_graphics_32bit_constants(&mut self, root_parameter_index: u32, constants: &[u32]) {
        self.native
            .set_graphics_root_32bit_constants(root_parameter_index, constants);
    }

    pub fn set_compute_32bit_constants(&mut self, root_parameter_index: u32, constants: &[u32]) {
        self.native
            .set_compute_root_32bit_constants(root_parameter_index, constants);
    }

    /// 以 32 位常量的形式设置一个 POD 结构体，大小必须是 4 的倍数
    pub fn set_compute_constants<T: Pod>(&mut self, root_parameter_index: u32, constants: &T) {
        let values: &[u32] = bytemuck::cast_slice(std::slice::from_ref(constants));
        self.set_compute_32bit_constants(root_parameter_index, values);
    }

    // ------------------------------------------------------------------
    // 光栅化与输出合并
    // ------------------------------------------------------------------

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.set_viewports(&[viewport]);
    }

    pub fn set_viewports(&mut self, viewports: &[Viewport]) {
        assert!(viewports.len() <= MAX_VIEWPORTS, "too many viewports");
        self.native.set_viewports(viewports);
    }

    pub fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.set_scissor_rects(&[rect]);
    }

    pub fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        assert!(rects.len() <= MAX_VIEWPORTS, "too many scissor rects");
        self.native.set_scissor_rects(rects);
    }

    /// 绑定渲染目标，颜色附件转换为 RENDER_TARGET，深度附件转换为 DEPTH_WRITE
    pub fn set_render_target(&mut self, render_target: &RenderTarget<B>) {
        let mut rtvs = Vec::new();

        for texture in render_target.color_attachments() {
            if let Some(resource) = texture.resource() {
                self.tracker
                    .transition_resource(resource, ResourceStates::RENDER_TARGET, ALL_SUBRESOURCES);
                rtvs.push(texture.render_target_view());
                self.track_resource(resource);
            }
        }

        let mut dsv = None;
        if let Some(texture) = render_target.depth_stencil() {
            if let Some(resource) = texture.resource() {
                self.tracker
                    .transition_resource(resource, ResourceStates::DEPTH_WRITE, ALL_SUBRESOURCES);
                dsv = Some(texture.depth_stencil_view());
                self.track_resource(resource);
            }
        }

        self.native.set_render_targets(&rtvs, dsv);
    }

    /// 清除颜色纹理
    pub fn clear_texture(&mut self, texture: &Texture<B>, color: [f32; 4]) {
        self.transition_barrier(texture, ResourceStates::RENDER_TARGET, ALL_SUBRESOURCES, true);
        self.native
            .clear_render_target_view(texture.render_target_view(), color);
        if let Some(resource) = texture.resource() {
            self.track_resource(resource);
        }
    }

    /// 清除深度模板纹理
    pub fn clear_depth_stencil_texture(&mut self, texture: &Texture<B>, flags: ClearFlags, depth: f32, stencil: u8) {
        self.transition_barrier(texture, ResourceStates::DEPTH_WRITE, ALL_SUBRESOURCES, true);
        self.native
            .clear_depth_stencil_view(texture.depth_stencil_view(), flags, depth, stencil);
        if let Some(resource) = texture.resource() {
            self.track_resource(resource);
        }
    }

    // ------------------------------------------------------------------
    // 管线与根签名
    // ------------------------------------------------------------------

    pub fn set_pipeline_state(&mut self, pipeline_state: &B::PipelineState) {
        self.native.set_pipeline_state(pipeline_state);
        self.tracked_objects
            .push(TrackedObject::PipelineState(pipeline_state.clone()));
    }

    /// 绑定图形根签名，已绑定时什么都不做
    pub fn set_graphics_root_signature(&mut self, root_signature: &Arc<RootSignature<B>>) -> Result<()> {
        if !self.bind_root_signature(root_signature)? {
            return Ok(());
        }
        self.native.set_graphics_root_signature(root_signature.native());
        Ok(())
    }

    /// 绑定计算根签名，已绑定时什么都不做
    pub fn set_compute_root_signature(&mut self, root_signature: &Arc<RootSignature<B>>) -> Result<()> {
        if !self.bind_root_signature(root_signature)? {
            return Ok(());
        }
        self.native.set_compute_root_signature(root_signature.native());
        Ok(())
    }

    /// 记录新的根签名并让动态堆按它的布局重建缓存，返回是否发生了变化
    fn bind_root_signature(&mut self, root_signature: &Arc<RootSignature<B>>) -> Result<bool> {
        if let Some(bound) = &self.root_signature {
            if Arc::ptr_eq(bound, root_signature) {
                return Ok(false);
            }
        }

        for heap in self.dynamic_heaps.iter_mut() {
            heap.parse_root_signature(root_signature)?;
        }

        self.root_signature = Some(Arc::clone(root_signature));
        self.tracked_objects
            .push(TrackedObject::RootSignature(Arc::clone(root_signature)));
        Ok(true)
    }

    /// 绑定着色器可见的描述符堆，只在发生变化时重新绑定
    pub fn set_descriptor_heap(&mut self, heap_type: DescriptorHeapType, heap: &B::DescriptorHeap) {
        self.bindings.set(&mut self.native, heap_type, heap);
    }

    // ------------------------------------------------------------------
    // 视图
    // ------------------------------------------------------------------

    fn transition_subresources(
        &mut self,
        resource: &B::Resource,
        after: ResourceStates,
        first_subresource: u32,
        num_subresources: u32,
    ) {
        if num_subresources < ALL_SUBRESOURCES {
            // 越界的子资源编号截断在 ALL_SUBRESOURCES 之前
            let end = first_subresource
                .saturating_add(num_subresources)
                .min(ALL_SUBRESOURCES);
            for subresource in first_subresource..end {
                self.tracker.transition_resource(resource, after, subresource);
            }
        } else {
            self.tracker
                .transition_resource(resource, after, ALL_SUBRESOURCES);
        }
    }

    /// 暂存一个 SRV 到描述符表
    ///
    /// # 参数
    ///
    /// * `root_parameter_index` - 描述符表的根索引
    /// * `descriptor_offset` - 表内偏移
    /// * `texture` - 纹理
    /// * `after` - 资源的目标状态
    /// * `first_subresource` / `num_subresources` - 需要转换的子资源范围，
    ///   `num_subresources` 为 `ALL_SUBRESOURCES` 时转换整个资源
    /// * `desc` - 视图描述，`None` 使用默认视图
    #[allow(clippy::too_many_arguments)]
    pub fn set_shader_resource_view(
        &mut self,
        root_parameter_index: u32,
        descriptor_offset: u32,
        texture: &Texture<B>,
        after: ResourceStates,
        first_subresource: u32,
        num_subresources: u32,
        desc: Option<&TextureViewDesc>,
    ) -> Result<()> {
        if let Some(resource) = texture.resource() {
            self.transition_subresources(resource, after, first_subresource, num_subresources);
        }

        let srv = texture.shader_resource_view(desc)?;
        self.view_heap_mut()
            .stage_descriptors(root_parameter_index, descriptor_offset, 1, srv)?;

        if let Some(resource) = texture.resource() {
            self.track_resource(resource);
        }
        Ok(())
    }

    /// 暂存一个 UAV 到描述符表，参数同 `set_shader_resource_view`
    #[allow(clippy::too_many_arguments)]
    pub fn set_unordered_access_view(
        &mut self,
        root_parameter_index: u32,
        descriptor_offset: u32,
        texture: &Texture<B>,
        after: ResourceStates,
        first_subresource: u32,
        num_subresources: u32,
        desc: Option<&TextureViewDesc>,
    ) -> Result<()> {
        if let Some(resource) = texture.resource() {
            self.transition_subresources(resource, after, first_subresource, num_subresources);
        }

        let uav = texture.unordered_access_view(desc)?;
        self.view_heap_mut()
            .stage_descriptors(root_parameter_index, descriptor_offset, 1, uav)?;

        if let Some(resource) = texture.resource() {
            self.track_resource(resource);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Draw / Dispatch
    // ------------------------------------------------------------------

    fn commit_for_draw(&mut self) -> Result<()> {
        self.flush_resource_barriers();
        for heap in self.dynamic_heaps.iter_mut() {
            heap.commit_staged_descriptors_for_draw(&mut self.native, &mut self.bindings)?;
        }
        Ok(())
    }

    fn commit_for_dispatch(&mut self) -> Result<()> {
        self.flush_resource_barriers();
        for heap in self.dynamic_heaps.iter_mut() {
            heap.commit_staged_descriptors_for_dispatch(&mut self.native, &mut self.bindings)?;
        }
        Ok(())
    }

    fn ensure_can_dispatch(&self, what: &str) -> Result<()> {
        if self.list_type.supports_dispatch() {
            return Ok(());
        }
        Err(GraphicsError::CommandExecution(format!("{} is not supported on a copy command list", what)).into())
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, start_vertex: u32, start_instance: u32) -> Result<()> {
        self.ensure_can_dispatch("Draw")?;
        self.commit_for_draw()?;
        self.native
            .draw_instanced(vertex_count, instance_count, start_vertex, start_instance);
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) -> Result<()> {
        self.ensure_can_dispatch("DrawIndexed")?;
        self.commit_for_draw()?;
        self.native
            .draw_indexed_instanced(index_count, instance_count, start_index, base_vertex, start_instance);
        Ok(())
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.ensure_can_dispatch("Dispatch")?;
        self.commit_for_dispatch()?;
        self.native.dispatch(x, y, z);
        Ok(())
    }

    // ------------------------------------------------------------------
    // 纹理加载与 mip 生成
    // ------------------------------------------------------------------

    /// 从文件加载纹理
    ///
    /// 同一路径只解码一次，之后直接复用缓存中的资源。只上传 mip 0，
    /// 其余 mip 由 `generate_mips` 生成。
    pub fn load_texture_from_file(
        &mut self,
        texture: &mut Texture<B>,
        path: impl AsRef<Path>,
        usage: TextureUsage,
    ) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TextureError::FileNotFound(path.to_path_buf()).into());
        }

        let name = path.to_string_lossy();
        texture.set_usage(usage);
        texture.set_name(&name);

        if let Some(resource) = self.context.texture_cache().get(path) {
            #[cfg(debug_assertions)]
            tracing::debug!(path = %name, "Texture cache hit");
            return texture.set_resource(resource, None);
        }

        let image = image::open(path)?.to_rgba8();
        let (width, height) = image.dimensions();

        let format = match usage {
            TextureUsage::Albedo => Format::R8G8B8A8Unorm.to_srgb(),
            _ => Format::R8G8B8A8Unorm,
        };
        let desc = ResourceDesc::texture_2d(format, width as u64, height, 1, 0);

        let resource = self.context.device().create_committed_resource(
            &desc,
            HeapKind::Default,
            ResourceStates::COMMON,
            None,
        )?;
        let registration = self.context.register_resource_state(&resource, ResourceStates::COMMON);
        texture.set_resource(resource.clone(), None)?;

        let row_pitch = width as usize * 4;
        let mip0 = SubresourceData {
            data: image.as_raw(),
            row_pitch,
            slice_pitch: row_pitch * height as usize,
        };
        self.copy_texture_subresource(texture, 0, &[mip0])?;

        if desc.mip_levels > 1 {
            self.generate_mips(texture)?;
        }

        self.context
            .texture_cache()
            .insert(path.to_path_buf(), resource, registration);

        info!(path = %name, width, height, mip_levels = desc.mip_levels, "Texture loaded");
        Ok(())
    }

    /// 生成纹理的全部 mip
    ///
    /// 只支持数组大小为 1 的 2D 纹理。UAV 兼容格式直接生成；sRGB 格式在线性
    /// 格式的暂存纹理上生成，着色器负责颜色空间转换；BGR 格式不支持。
    pub fn generate_mips(&mut self, texture: &Texture<B>) -> Result<()> {
        if self.list_type == CommandListType::Copy {
            return Err(GraphicsError::CommandExecution(
                "mip generation requires a direct or compute command list".to_string(),
            )
            .into());
        }

        let Some(desc) = texture.desc() else {
            return Ok(());
        };
        if desc.mip_levels <= 1 {
            return Ok(());
        }

        if desc.dimension != ResourceDimension::Texture2D || desc.depth_or_array_size != 1 {
            return Err(GraphicsError::InvalidResource(format!(
                "mip generation supports single 2D textures, got {:?} with array size {}",
                desc.dimension, desc.depth_or_array_size
            ))
            .into());
        }

        let format = desc.format;
        if format.is_uav_compatible() {
            self.generate_mips_uav(texture, false)
        } else if format.is_bgr() {
            Err(GraphicsError::UnsupportedFormat(format!("{:?}: BGR mip generation is not supported", format)).into())
        } else if format.is_srgb() && format.to_linear().is_uav_compatible() {
            self.generate_mips_uav(texture, true)
        } else {
            Err(GraphicsError::UnsupportedFormat(format!("{:?}: no UAV compatible format", format)).into())
        }
    }

    fn generate_mips_uav(&mut self, texture: &Texture<B>, is_srgb: bool) -> Result<()> {
        let Some(desc) = texture.desc() else {
            return Ok(());
        };
        let pipeline = self.context.generate_mips_pipeline()?;

        let uav_format = if is_srgb { desc.format.to_linear() } else { desc.format };
        let staging = if is_srgb || !desc.flags.contains(ResourceFlags::ALLOW_UNORDERED_ACCESS) {
            let mut staging_desc = desc.with_flags(desc.flags | ResourceFlags::ALLOW_UNORDERED_ACCESS);
            staging_desc.format = uav_format;

            let staging = Arc::new(Texture::new(
                &self.context,
                staging_desc,
                None,
                texture.usage(),
                "Generate Mips UAV Staging Texture",
            )?);
            self.copy_resource(&*staging, texture);
            Some(staging)
        } else {
            None
        };
        let target: &Texture<B> = staging.as_deref().unwrap_or(texture);

        self.set_pipeline_state(pipeline.pipeline_state());
        self.set_compute_root_signature(pipeline.root_signature())?;

        for pass in plan_mip_passes(desc.width, desc.height, desc.mip_levels as u32) {
            self.set_compute_constants(root_index::GENERATE_MIPS_CB, &pass.constants(is_srgb));

            self.set_shader_resource_view(
                root_index::SRC_MIP,
                0,
                target,
                ResourceStates::NON_PIXEL_SHADER_RESOURCE,
                pass.src_mip,
                1,
                None,
            )?;

            for mip in 0..pass.num_mips {
                let dst_mip = pass.src_mip + mip + 1;
                let uav_desc = TextureViewDesc {
                    format: uav_format,
                    most_detailed_mip: dst_mip,
                    mip_levels: 1,
                };
                self.set_unordered_access_view(
                    root_index::OUT_MIP,
                    mip,
                    target,
                    ResourceStates::UNORDERED_ACCESS,
                    dst_mip,
                    1,
                    Some(&uav_desc),
                )?;
            }

            // 不足 4 级时用空 UAV 填满表
            if pass.num_mips < MAX_MIPS_PER_PASS {
                self.view_heap_mut().stage_descriptors(
                    root_index::OUT_MIP,
                    pass.num_mips,
                    MAX_MIPS_PER_PASS - pass.num_mips,
                    pipeline.default_uav(pass.num_mips),
                )?;
            }

            let (groups_x, groups_y) = pass.thread_groups();
            self.dispatch(groups_x, groups_y, 1)?;

            self.uav_barrier(target.resource(), false);
        }

        if let Some(staging) = staging {
            self.copy_resource(texture, &*staging);
            self.tracked_objects.push(TrackedObject::Texture(staging));
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // 生命周期
    // ------------------------------------------------------------------

    /// 保持资源存活直到命令列表执行完毕
    pub fn track_resource(&mut self, resource: &B::Resource) {
        self.tracked_objects
            .push(TrackedObject::Resource(resource.clone()));
    }

    /// 保持纹理（连同其视图）存活直到命令列表执行完毕
    pub fn track_texture(&mut self, texture: Arc<Texture<B>>) {
        self.tracked_objects.push(TrackedObject::Texture(texture));
    }

    pub fn num_tracked_objects(&self) -> usize {
        self.tracked_objects.len()
    }

    pub fn release_tracked_objects(&mut self) {
        self.tracked_objects.clear();
    }

    /// 关闭命令列表，并把挂起屏障写入 `pending`
    ///
    /// 必须在持有全局状态锁时调用。返回 `pending` 是否收到了屏障，
    /// 收到时需要先于本列表提交。
    pub fn close_with_pending(&mut self, pending: &mut CommandList<B>, guard: &mut GlobalStatesGuard<'_>) -> Result<bool> {
        self.flush_resource_barriers();
        self.native.close()?;

        let num_pending = self
            .tracker
            .flush_pending_resource_barriers(guard, &mut pending.native);
        self.tracker.commit_final_resource_states(guard);

        Ok(num_pending > 0)
    }

    /// 关闭命令列表
    pub fn close(&mut self) -> Result<()> {
        self.flush_resource_barriers();
        self.native.close()
    }

    /// 重置以便重新录制
    ///
    /// 只能在命令列表在 GPU 上执行完毕后调用。
    pub fn reset(&mut self) -> Result<()> {
        self.native.reset()?;

        self.tracker.reset();
        self.upload_buffer.reset();
        self.release_tracked_objects();

        for heap in self.dynamic_heaps.iter_mut() {
            heap.reset();
        }
        self.bindings.clear();
        self.root_signature = None;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RendererConfig;
    use crate::core::error::DaybreakError;
    use crate::renderer::backend::ResourceBarrier;
    use crate::renderer::root_signature::{
        DescriptorRange, DescriptorRangeType, RootParameter, RootSignatureDesc, ShaderVisibility,
    };
    use crate::renderer::testing::{MockBackend, MockCommand, MockDevice};

    type Context = Arc<GpuContext<MockBackend>>;

    fn setup(list_type: CommandListType) -> (Context, CommandList<MockBackend>) {
        let context = GpuContext::<MockBackend>::new(MockDevice::new(), RendererConfig::default());
        let list = CommandList::new(Arc::clone(&context), list_type).unwrap();
        (context, list)
    }

    fn texture(context: &Context, format: Format, size: u32, mips: u16) -> Texture<MockBackend> {
        let desc = ResourceDesc::texture_2d(format, size as u64, size, 1, mips);
        Texture::new(context, desc, None, TextureUsage::Albedo, "Test Texture").unwrap()
    }

    fn count(list: &CommandList<MockBackend>, predicate: impl Fn(&MockCommand) -> bool) -> usize {
        list.native().commands().iter().filter(|c| predicate(c)).count()
    }

    #[test]
    fn test_copy_vertex_buffer() {
        let (context, mut list) = setup(CommandListType::Copy);
        let mut buffer = VertexBuffer::new("Triangle");
        let vertices = [[0.0f32, 1.0, 0.0], [1.0, -1.0, 0.0], [-1.0, -1.0, 0.0]];

        list.copy_vertex_buffer(&mut buffer, &vertices).unwrap();

        assert_eq!(buffer.num_vertices(), 3);
        assert_eq!(buffer.view().size_in_bytes, 36);
        assert_eq!(buffer.view().stride_in_bytes, 12);

        let resource = buffer.as_resource().unwrap();
        assert!(context.global_states().global_state(resource.id()).is_some());

        // 第一次使用的缓冲区转换被挂起，本地只有上传命令
        assert!(list.native().barriers().is_empty());
        assert_eq!(count(&list, |c| matches!(c, MockCommand::UpdateSubresources { .. })), 1);
        assert_eq!(list.num_tracked_objects(), 2);
    }

    #[test]
    fn test_dropped_buffer_leaves_global_table() {
        let (context, mut list) = setup(CommandListType::Copy);
        let mut buffer = VertexBuffer::new("Quad");
        list.copy_vertex_buffer(&mut buffer, &[[0.0f32; 2]; 4]).unwrap();
        let id = buffer.as_resource().unwrap().id();
        assert!(context.global_states().global_state(id).is_some());

        // 列表仍持有底层资源，但全局条目随包装一起移除
        drop(buffer);
        assert!(context.global_states().global_state(id).is_none());

        // 之后提交也不会把条目加回来
        let mut pending = CommandList::new(Arc::clone(&context), CommandListType::Copy).unwrap();
        let mut guard = context.global_states().lock();
        list.close_with_pending(&mut pending, &mut guard).unwrap();
        drop(guard);
        assert!(context.global_states().global_state(id).is_none());
        assert!(context.global_states().is_empty());
    }

    #[test]
    fn test_subresource_range_overflow_is_clamped() {
        let (context, mut list) = setup(CommandListType::Direct);
        let root_signature = srv_root_signature(&context);
        let diffuse = texture(&context, Format::R8G8B8A8Unorm, 16, 1);
        list.set_graphics_root_signature(&root_signature).unwrap();

        // first + num 溢出时不会 panic
        list.set_shader_resource_view(
            0,
            0,
            &diffuse,
            ResourceStates::PIXEL_SHADER_RESOURCE,
            u32::MAX - 1,
            8,
            None,
        )
        .unwrap();
        assert!(list.native().barriers().is_empty());
    }

    #[test]
    fn test_empty_index_buffer_has_no_resource() {
        let (_context, mut list) = setup(CommandListType::Copy);
        let mut buffer = IndexBuffer::new("Empty");
        list.copy_index_buffer::<u32>(&mut buffer, &[]).unwrap();
        assert!(buffer.as_resource().is_none());
        assert!(list.native().commands().is_empty());

        list.copy_index_buffer(&mut buffer, &[0u16, 1, 2]).unwrap();
        assert_eq!(buffer.format(), Format::R16Uint);
        assert_eq!(buffer.view().size_in_bytes, 6);
    }

    #[test]
    fn test_close_with_pending_resolves_against_global_state() {
        let (context, mut list) = setup(CommandListType::Direct);
        let target = texture(&context, Format::R8G8B8A8Unorm, 16, 1);
        list.transition_barrier(&target, ResourceStates::RENDER_TARGET, ALL_SUBRESOURCES, true);

        let mut pending = CommandList::new(Arc::clone(&context), CommandListType::Direct).unwrap();
        let mut guard = context.global_states().lock();
        assert!(list.close_with_pending(&mut pending, &mut guard).unwrap());
        drop(guard);

        let barriers = pending.native().barriers();
        assert_eq!(barriers.len(), 1);
        assert!(matches!(
            barriers[0],
            ResourceBarrier::Transition { before, after, .. }
                if before == ResourceStates::COMMON && after == ResourceStates::RENDER_TARGET
        ));

        let id = target.resource().unwrap().id();
        assert_eq!(
            context.global_states().global_state(id).unwrap().state(),
            ResourceStates::RENDER_TARGET
        );
        assert!(list.native().is_closed());
    }

    #[test]
    fn test_close_without_pending_barriers() {
        let (context, mut list) = setup(CommandListType::Direct);
        let mut pending = CommandList::new(Arc::clone(&context), CommandListType::Direct).unwrap();
        let mut guard = context.global_states().lock();
        assert!(!list.close_with_pending(&mut pending, &mut guard).unwrap());
    }

    #[test]
    fn test_clear_texture_flushes_before_clear() {
        let (context, mut list) = setup(CommandListType::Direct);
        let desc = ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 8, 8, 1, 1)
            .with_flags(ResourceFlags::ALLOW_RENDER_TARGET);
        let target = Texture::new(&context, desc, None, TextureUsage::RenderTarget, "Color").unwrap();

        list.transition_barrier(&target, ResourceStates::COPY_DEST, ALL_SUBRESOURCES, true);
        list.clear_texture(&target, [0.4, 0.6, 0.9, 1.0]);

        let commands = list.native().commands();
        let n = commands.len();
        assert!(matches!(&commands[n - 2], MockCommand::Barriers(barriers) if barriers.len() == 1));
        assert!(matches!(
            &commands[n - 1],
            MockCommand::ClearRenderTargetView { rtv, .. } if *rtv == target.render_target_view()
        ));
    }

    fn srv_root_signature(context: &Context) -> Arc<RootSignature<MockBackend>> {
        let desc = RootSignatureDesc {
            parameters: vec![RootParameter::DescriptorTable {
                ranges: vec![DescriptorRange::new(DescriptorRangeType::Srv, 2, 0)],
                visibility: ShaderVisibility::Pixel,
            }],
            ..Default::default()
        };
        Arc::new(RootSignature::new(context.device(), desc).unwrap())
    }

    #[test]
    fn test_srv_staged_and_committed_on_draw() {
        let (context, mut list) = setup(CommandListType::Direct);
        let root_signature = srv_root_signature(&context);
        let diffuse = texture(&context, Format::R8G8B8A8Unorm, 16, 0);

        list.set_graphics_root_signature(&root_signature).unwrap();
        list.set_graphics_root_signature(&root_signature).unwrap();
        assert_eq!(count(&list, |c| matches!(c, MockCommand::SetGraphicsRootSignature(_))), 1);

        for offset in 0..2 {
            list.set_shader_resource_view(
                0,
                offset,
                &diffuse,
                ResourceStates::PIXEL_SHADER_RESOURCE,
                0,
                ALL_SUBRESOURCES,
                None,
            )
            .unwrap();
        }
        list.draw(3, 1, 0, 0).unwrap();

        let commands = list.native().commands();
        assert!(commands
            .iter()
            .any(|c| matches!(c, MockCommand::SetGraphicsRootDescriptorTable { root_index: 0, .. })));
        assert!(matches!(commands.last(), Some(MockCommand::DrawInstanced { vertex_count: 3, .. })));
    }

    #[test]
    fn test_srv_offset_past_table_fails() {
        let (context, mut list) = setup(CommandListType::Direct);
        let root_signature = srv_root_signature(&context);
        let diffuse = texture(&context, Format::R8G8B8A8Unorm, 16, 1);

        list.set_graphics_root_signature(&root_signature).unwrap();
        let err = list
            .set_shader_resource_view(0, 2, &diffuse, ResourceStates::PIXEL_SHADER_RESOURCE, 0, ALL_SUBRESOURCES, None)
            .unwrap_err();
        assert!(matches!(err, DaybreakError::Graphics(GraphicsError::DescriptorRange { .. })));
    }

    #[test]
    fn test_dynamic_constant_buffer_alignment() {
        let (_context, mut list) = setup(CommandListType::Direct);
        list.set_dynamic_vertex_buffer(0, &[[0.0f32; 3]; 3]).unwrap();
        list.set_graphics_dynamic_constant_buffer(1, &[1.0f32; 16]).unwrap();
        list.set_dynamic_index_buffer(&[0u16, 1, 2]).unwrap();

        let address = list
            .native()
            .commands()
            .iter()
            .find_map(|c| match c {
                MockCommand::SetGraphicsRootConstantBufferView { root_index: 1, address } => Some(*address),
                _ => None,
            })
            .unwrap();
        assert_eq!(address % CONSTANT_BUFFER_ALIGNMENT as u64, 0);
    }

    #[test]
    fn test_generate_mips_uses_staging_texture() {
        let (context, mut list) = setup(CommandListType::Compute);
        let albedo = texture(&context, Format::R8G8B8A8Unorm, 256, 0);

        list.generate_mips(&albedo).unwrap();

        // 9 级 mip 分两轮
        assert_eq!(count(&list, |c| matches!(c, MockCommand::Dispatch { x: 16, y: 16, z: 1 })), 1);
        assert_eq!(count(&list, |c| matches!(c, MockCommand::Dispatch { .. })), 2);
        // 拷入暂存纹理，再拷回
        assert_eq!(count(&list, |c| matches!(c, MockCommand::CopyResource { .. })), 2);
        assert!(list.native().barriers().iter().any(|b| matches!(b, ResourceBarrier::Uav { .. })));
    }

    #[test]
    fn test_generate_mips_in_place_for_uav_textures() {
        let (context, mut list) = setup(CommandListType::Compute);
        let desc = ResourceDesc::texture_2d(Format::R16G16B16A16Float, 64, 64, 1, 0)
            .with_flags(ResourceFlags::ALLOW_UNORDERED_ACCESS);
        let hdr = Texture::new(&context, desc, None, TextureUsage::RenderTarget, "HDR").unwrap();

        list.generate_mips(&hdr).unwrap();
        assert_eq!(count(&list, |c| matches!(c, MockCommand::CopyResource { .. })), 0);
        assert_eq!(count(&list, |c| matches!(c, MockCommand::Dispatch { .. })), 2);
    }

    #[test]
    fn test_generate_mips_srgb_sets_flag() {
        let (context, mut list) = setup(CommandListType::Direct);
        let albedo = texture(&context, Format::R8G8B8A8UnormSrgb, 16, 0);

        list.generate_mips(&albedo).unwrap();

        let flags: Vec<u32> = list
            .native()
            .commands()
            .iter()
            .filter_map(|c| match c {
                MockCommand::SetComputeRoot32BitConstants { values, .. } => Some(values[3]),
                _ => None,
            })
            .collect();
        assert!(!flags.is_empty());
        assert!(flags.iter().all(|&is_srgb| is_srgb == 1));
    }

    #[test]
    fn test_generate_mips_rejections() {
        let (context, mut list) = setup(CommandListType::Direct);

        let bgr = texture(&context, Format::B8G8R8A8Unorm, 16, 0);
        let err = list.generate_mips(&bgr).unwrap_err();
        assert!(matches!(err, DaybreakError::Graphics(GraphicsError::UnsupportedFormat(_))));

        let desc = ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 16, 16, 2, 0);
        let array = Texture::new(&context, desc, None, TextureUsage::Albedo, "Array").unwrap();
        let err = list.generate_mips(&array).unwrap_err();
        assert!(matches!(err, DaybreakError::Graphics(GraphicsError::InvalidResource(_))));

        // 只有一级 mip 时什么都不做
        let single = texture(&context, Format::B8G8R8A8Unorm, 16, 1);
        let before = list.native().commands().len();
        list.generate_mips(&single).unwrap();
        assert_eq!(list.native().commands().len(), before);

        let (context, mut copy_list) = setup(CommandListType::Copy);
        let albedo = texture(&context, Format::R8G8B8A8Unorm, 16, 0);
        let err = copy_list.generate_mips(&albedo).unwrap_err();
        assert!(matches!(err, DaybreakError::Graphics(GraphicsError::CommandExecution(_))));
        assert!(copy_list.dispatch(1, 1, 1).is_err());
    }

    #[test]
    fn test_load_texture_from_file_and_cache() {
        let (context, mut list) = setup(CommandListType::Direct);
        let path = std::env::temp_dir().join(format!("daybreak_load_texture_{}.png", std::process::id()));
        image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 128, 0, 255]))
            .save(&path)
            .unwrap();

        let mut first = Texture::empty(&context, TextureUsage::Albedo, "");
        list.load_texture_from_file(&mut first, &path, TextureUsage::Albedo)
            .unwrap();

        let desc = first.desc().unwrap();
        assert_eq!(desc.format, Format::R8G8B8A8UnormSrgb);
        assert_eq!((desc.width, desc.height, desc.mip_levels), (4, 4, 3));
        assert_eq!(count(&list, |c| matches!(c, MockCommand::UpdateSubresources { .. })), 1);
        assert_eq!(count(&list, |c| matches!(c, MockCommand::Dispatch { .. })), 1);

        let mut second = Texture::empty(&context, TextureUsage::Albedo, "");
        list.load_texture_from_file(&mut second, &path, TextureUsage::Albedo)
            .unwrap();
        assert_eq!(
            first.resource().unwrap().id(),
            second.resource().unwrap().id()
        );
        assert_eq!(count(&list, |c| matches!(c, MockCommand::UpdateSubresources { .. })), 1);
        assert_eq!(context.texture_cache().len(), 1);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_texture_fails() {
        let (context, mut list) = setup(CommandListType::Direct);
        let mut texture = Texture::empty(&context, TextureUsage::Albedo, "");
        let err = list
            .load_texture_from_file(&mut texture, "does/not/exist.png", TextureUsage::Albedo)
            .unwrap_err();
        assert!(matches!(err, DaybreakError::Texture(TextureError::FileNotFound(_))));
        assert!(!texture.is_valid());
    }

    #[test]
    fn test_reset_releases_everything() {
        let (context, mut list) = setup(CommandListType::Direct);
        let root_signature = srv_root_signature(&context);
        let src = texture(&context, Format::R8G8B8A8Unorm, 16, 1);
        let dst = texture(&context, Format::R8G8B8A8Unorm, 16, 1);

        list.set_graphics_root_signature(&root_signature).unwrap();
        list.copy_resource(&dst, &src);
        assert!(list.num_tracked_objects() > 0);
        list.close().unwrap();

        list.reset().unwrap();
        assert_eq!(list.num_tracked_objects(), 0);
        assert!(list.native().commands().is_empty());
        assert_eq!(list.native().reset_count(), 1);

        // 重置后同一个根签名需要重新绑定
        list.set_graphics_root_signature(&root_signature).unwrap();
        assert_eq!(count(&list, |c| matches!(c, MockCommand::SetGraphicsRootSignature(_))), 1);
    }

    #[test]
    fn test_render_target_binding() {
        let (context, mut list) = setup(CommandListType::Direct);
        let color_desc = ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 8, 8, 1, 1)
            .with_flags(ResourceFlags::ALLOW_RENDER_TARGET);
        let depth_desc = ResourceDesc::texture_2d(Format::D32Float, 8, 8, 1, 1)
            .with_flags(ResourceFlags::ALLOW_DEPTH_STENCIL);

        let mut render_target = RenderTarget::new();
        render_target.attach_color(
            0,
            Arc::new(Texture::new(&context, color_desc, None, TextureUsage::RenderTarget, "Color").unwrap()),
        );
        render_target.attach_depth_stencil(Arc::new(
            Texture::new(&context, depth_desc, None, TextureUsage::RenderTarget, "Depth").unwrap(),
        ));

        list.set_render_target(&render_target);
        assert!(matches!(
            list.native().commands().last(),
            Some(MockCommand::SetRenderTargets { rtvs, dsv: Some(_) }) if rtvs.len() == 1
        ));
    }
}
