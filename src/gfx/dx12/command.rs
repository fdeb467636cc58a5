//! 命令列表、命令队列和 Fence

use std::ffi::c_void;
use std::mem::ManuallyDrop;

use windows::core::Interface;
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObject, INFINITE};

use crate::core::error::{DaybreakError, GraphicsError, Result};
use crate::renderer::backend::{NativeCommandList, NativeFence, NativeQueue, ResourceBarrier};
use crate::renderer::command::{ClearFlags, CommandListType};
use crate::renderer::descriptor::{CpuDescriptorHandle, GpuDescriptorHandle};
use crate::renderer::resource::{
    Format, IndexBufferView, PrimitiveTopology, ScissorRect, SubresourceData, VertexBufferView, Viewport,
};

use super::resource::{Dx12DescriptorHeap, Dx12PipelineState, Dx12Resource, Dx12RootSignature};
use super::{convert, execution_error, resource_error, Dx12Backend};

/// 借用资源指针填入屏障或拷贝位置，不增加引用计数
///
/// 返回值只能在 `resource` 存活期间使用，且不能被 drop。
fn borrowed(resource: Option<&Dx12Resource>) -> ManuallyDrop<Option<ID3D12Resource>> {
    // SAFETY: Option<&ID3D12Resource> 与 Option<ID3D12Resource> 布局相同，ManuallyDrop 保证不会 Release
    unsafe { std::mem::transmute_copy(&resource.map(|resource| resource.raw())) }
}

fn raw_barrier(barrier: &ResourceBarrier<Dx12Resource>) -> D3D12_RESOURCE_BARRIER {
    match barrier {
        ResourceBarrier::Transition {
            resource,
            subresource,
            before,
            after,
        } => D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                    pResource: borrowed(Some(resource)),
                    Subresource: *subresource,
                    StateBefore: convert::states(*before),
                    StateAfter: convert::states(*after),
                }),
            },
        },
        ResourceBarrier::Aliasing { before, after } => D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_ALIASING,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                Aliasing: ManuallyDrop::new(D3D12_RESOURCE_ALIASING_BARRIER {
                    pResourceBefore: borrowed(before.as_ref()),
                    pResourceAfter: borrowed(after.as_ref()),
                }),
            },
        },
        ResourceBarrier::Uav { resource } => D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_UAV,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                UAV: ManuallyDrop::new(D3D12_RESOURCE_UAV_BARRIER {
                    pResource: borrowed(resource.as_ref()),
                }),
            },
        },
    }
}

/// 命令分配器 + 图形命令列表
pub struct Dx12CommandList {
    list_type: CommandListType,
    device: ID3D12Device,
    allocator: ID3D12CommandAllocator,
    list: ID3D12GraphicsCommandList,
}

// SAFETY: 命令列表只被持有它的线程录制，移动到回收线程后才重置
unsafe impl Send for Dx12CommandList {}

impl Dx12CommandList {
    /// 创建处于录制状态的命令列表
    pub(crate) fn new(device: &ID3D12Device, list_type: CommandListType) -> Result<Self> {
        let raw_type = convert::list_type(list_type);
        // SAFETY: 分配器与列表类型一致
        unsafe {
            let allocator: ID3D12CommandAllocator = device
                .CreateCommandAllocator(raw_type)
                .map_err(resource_error("Failed to create command allocator"))?;
            let list: ID3D12GraphicsCommandList = device
                .CreateCommandList(0, raw_type, &allocator, None)
                .map_err(resource_error("Failed to create command list"))?;

            Ok(Self {
                list_type,
                device: device.clone(),
                allocator,
                list,
            })
        }
    }

    pub fn raw(&self) -> &ID3D12GraphicsCommandList {
        &self.list
    }
}

impl NativeCommandList<Dx12Backend> for Dx12CommandList {
    fn list_type(&self) -> CommandListType {
        self.list_type
    }

    fn reset(&mut self) -> Result<()> {
        // SAFETY: 调用方保证 GPU 已经执行完这个列表
        unsafe {
            self.allocator
                .Reset()
                .map_err(execution_error("Failed to reset command allocator"))?;
            self.list
                .Reset(&self.allocator, None)
                .map_err(execution_error("Failed to reset command list"))
        }
    }

    fn close(&mut self) -> Result<()> {
        // SAFETY: 列表处于录制状态
        unsafe { self.list.Close() }.map_err(execution_error("Failed to close command list"))
    }

    fn resource_barriers(&mut self, barriers: &[ResourceBarrier<Dx12Resource>]) {
        if barriers.is_empty() {
            return;
        }
        let raw: Vec<D3D12_RESOURCE_BARRIER> = barriers.iter().map(raw_barrier).collect();
        // SAFETY: 屏障借用的资源在调用期间存活
        unsafe { self.list.ResourceBarrier(&raw) };
    }

    fn copy_resource(&mut self, dst: &Dx12Resource, src: &Dx12Resource) {
        // SAFETY: 调用方已把两个资源转换到拷贝状态
        unsafe { self.list.CopyResource(dst.raw(), src.raw()) };
    }

    fn copy_buffer_region(&mut self, dst: &Dx12Resource, dst_offset: u64, src: &Dx12Resource, src_offset: u64, size: u64) {
        // SAFETY: 同上
        unsafe { self.list.CopyBufferRegion(dst.raw(), dst_offset, src.raw(), src_offset, size) };
    }

    fn resolve_subresource(&mut self, dst: &Dx12Resource, dst_subresource: u32, src: &Dx12Resource, src_subresource: u32, format: Format) {
        // SAFETY: 调用方已把资源转换到解析状态
        unsafe {
            self.list.ResolveSubresource(
                dst.raw(),
                dst_subresource,
                src.raw(),
                src_subresource,
                convert::format(format),
            )
        };
    }

    fn update_subresources(
        &mut self,
        dst: &Dx12Resource,
        intermediate: &Dx12Resource,
        first_subresource: u32,
        data: &[SubresourceData<'_>],
    ) -> Result<()> {
        let count = data.len();
        if count == 0 {
            return Ok(());
        }

        let mut layouts = vec![D3D12_PLACED_SUBRESOURCE_FOOTPRINT::default(); count];
        let mut num_rows = vec![0u32; count];
        let mut row_sizes = vec![0u64; count];
        let mut total_bytes = 0u64;

        // SAFETY: 输出数组长度与子资源数量一致
        let (dst_desc, intermediate_width) = unsafe {
            let dst_desc = dst.raw().GetDesc();
            self.device.GetCopyableFootprints(
                &dst_desc,
                first_subresource,
                count as u32,
                0,
                Some(layouts.as_mut_ptr()),
                Some(num_rows.as_mut_ptr()),
                Some(row_sizes.as_mut_ptr()),
                Some(&mut total_bytes),
            );
            (dst_desc, intermediate.raw().GetDesc().Width)
        };

        if intermediate_width < total_bytes {
            return Err(DaybreakError::Graphics(GraphicsError::InvalidResource(format!(
                "Intermediate buffer too small: {} < {}",
                intermediate_width, total_bytes
            ))));
        }

        let mut mapped: *mut c_void = std::ptr::null_mut();
        // SAFETY: 中间缓冲区位于上传堆
        unsafe { intermediate.raw().Map(0, None, Some(&mut mapped)) }
            .map_err(resource_error("Failed to map intermediate buffer"))?;
        let mapped = mapped as *mut u8;

        for (index, source) in data.iter().enumerate() {
            let layout = &layouts[index];
            let rows = num_rows[index] as usize;
            let row_size = row_sizes[index] as usize;
            let dst_row_pitch = layout.Footprint.RowPitch as usize;

            for z in 0..layout.Footprint.Depth as usize {
                for y in 0..rows {
                    let src_offset = z * source.slice_pitch + y * source.row_pitch;
                    let Some(row) = source.data.get(src_offset..src_offset + row_size) else {
                        // SAFETY: 与上面的 Map 配对
                        unsafe { intermediate.raw().Unmap(0, None) };
                        return Err(DaybreakError::Graphics(GraphicsError::InvalidResource(format!(
                            "Subresource {} data is shorter than its footprint",
                            first_subresource as usize + index
                        ))));
                    };
                    let dst_offset = layout.Offset as usize + z * dst_row_pitch * rows + y * dst_row_pitch;
                    // SAFETY: 目标偏移位于 GetCopyableFootprints 计算出的范围内
                    unsafe { std::ptr::copy_nonoverlapping(row.as_ptr(), mapped.add(dst_offset), row_size) };
                }
            }
        }

        // SAFETY: 与上面的 Map 配对
        unsafe { intermediate.raw().Unmap(0, None) };

        if dst_desc.Dimension == D3D12_RESOURCE_DIMENSION_BUFFER {
            // SAFETY: 两个资源都是缓冲区
            unsafe {
                self.list.CopyBufferRegion(
                    dst.raw(),
                    0,
                    intermediate.raw(),
                    layouts[0].Offset,
                    layouts[0].Footprint.Width as u64,
                )
            };
            return Ok(());
        }

        for (index, layout) in layouts.iter().enumerate() {
            let dst_location = D3D12_TEXTURE_COPY_LOCATION {
                pResource: borrowed(Some(dst)),
                Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                    SubresourceIndex: first_subresource + index as u32,
                },
            };
            let src_location = D3D12_TEXTURE_COPY_LOCATION {
                pResource: borrowed(Some(intermediate)),
                Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 { PlacedFootprint: *layout },
            };
            // SAFETY: 拷贝位置借用的资源在调用期间存活
            unsafe { self.list.CopyTextureRegion(&dst_location, 0, 0, 0, &src_location, None) };
        }

        Ok(())
    }

    fn set_descriptor_heaps(&mut self, heaps: &[&Dx12DescriptorHeap]) {
        let raw: Vec<Option<ID3D12DescriptorHeap>> = heaps.iter().map(|heap| Some(heap.raw().clone())).collect();
        // SAFETY: 最多一个 CBV/SRV/UAV 堆和一个采样器堆
        unsafe { self.list.SetDescriptorHeaps(&raw) };
    }

    fn set_graphics_root_signature(&mut self, root_signature: &Dx12RootSignature) {
        // SAFETY: 根签名在列表执行完之前由调用方持有
        unsafe { self.list.SetGraphicsRootSignature(&root_signature.0) };
    }

    fn set_compute_root_signature(&mut self, root_signature: &Dx12RootSignature) {
        // SAFETY: 同上
        unsafe { self.list.SetComputeRootSignature(&root_signature.0) };
    }

    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, base: GpuDescriptorHandle) {
        // SAFETY: 句柄指向当前绑定的着色器可见堆
        unsafe { self.list.SetGraphicsRootDescriptorTable(root_index, convert::gpu_handle(base)) };
    }

    fn set_compute_root_descriptor_table(&mut self, root_index: u32, base: GpuDescriptorHandle) {
        // SAFETY: 同上
        unsafe { self.list.SetComputeRootDescriptorTable(root_index, convert::gpu_handle(base)) };
    }

    fn set_graphics_root_constant_buffer_view(&mut self, root_index: u32, address: u64) {
        // SAFETY: 地址来自仍然存活的上传页
        unsafe { self.list.SetGraphicsRootConstantBufferView(root_index, address) };
    }

    fn set_compute_root_constant_buffer_view(&mut self, root_index: u32, address: u64) {
        // SAFETY: 同上
        unsafe { self.list.SetComputeRootConstantBufferView(root_index, address) };
    }

    fn set_graphics_root_32bit_constants(&mut self, root_index: u32, constants: &[u32]) {
        // SAFETY: 常量在调用时被拷贝进命令列表
        unsafe {
            self.list.SetGraphicsRoot32BitConstants(
                root_index,
                constants.len() as u32,
                constants.as_ptr() as *const c_void,
                0,
            )
        };
    }

    fn set_compute_root_32bit_constants(&mut self, root_index: u32, constants: &[u32]) {
        // SAFETY: 同上
        unsafe {
            self.list.SetComputeRoot32BitConstants(
                root_index,
                constants.len() as u32,
                constants.as_ptr() as *const c_void,
                0,
            )
        };
    }

    fn set_pipeline_state(&mut self, pipeline_state: &Dx12PipelineState) {
        // SAFETY: 管线在列表执行完之前由调用方持有
        unsafe { self.list.SetPipelineState(&pipeline_state.0) };
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) {
        let raw: Vec<D3D12_VERTEX_BUFFER_VIEW> = views.iter().map(convert::vertex_buffer_view).collect();
        // SAFETY: 视图在调用时被拷贝
        unsafe { self.list.IASetVertexBuffers(start_slot, Some(&raw)) };
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) {
        let raw = convert::index_buffer_view(view);
        // SAFETY: 同上
        unsafe { self.list.IASetIndexBuffer(Some(&raw)) };
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        // SAFETY: 纯状态设置
        unsafe { self.list.IASetPrimitiveTopology(convert::topology(topology)) };
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        let raw: Vec<D3D12_VIEWPORT> = viewports.iter().map(convert::viewport).collect();
        // SAFETY: 同上
        unsafe { self.list.RSSetViewports(&raw) };
    }

    fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        let raw: Vec<_> = rects.iter().map(convert::rect).collect();
        // SAFETY: 同上
        unsafe { self.list.RSSetScissorRects(&raw) };
    }

    fn set_render_targets(&mut self, rtvs: &[CpuDescriptorHandle], dsv: Option<CpuDescriptorHandle>) {
        let raw_rtvs: Vec<D3D12_CPU_DESCRIPTOR_HANDLE> = rtvs.iter().map(|h| convert::cpu_handle(*h)).collect();
        let raw_dsv = dsv.map(convert::cpu_handle);
        // SAFETY: 句柄数组在调用期间存活
        unsafe {
            self.list.OMSetRenderTargets(
                raw_rtvs.len() as u32,
                (!raw_rtvs.is_empty()).then_some(raw_rtvs.as_ptr()),
                false,
                raw_dsv.as_ref().map(|dsv| dsv as *const _),
            )
        };
    }

    fn clear_render_target_view(&mut self, rtv: CpuDescriptorHandle, color: [f32; 4]) {
        // SAFETY: rtv 是有效的渲染目标视图
        unsafe { self.list.ClearRenderTargetView(convert::cpu_handle(rtv), &color, None) };
    }

    fn clear_depth_stencil_view(&mut self, dsv: CpuDescriptorHandle, flags: ClearFlags, depth: f32, stencil: u8) {
        // SAFETY: dsv 是有效的深度模板视图
        unsafe {
            self.list.ClearDepthStencilView(
                convert::cpu_handle(dsv),
                D3D12_CLEAR_FLAGS(flags.bits() as i32),
                depth,
                stencil,
                None,
            )
        };
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, start_vertex: u32, start_instance: u32) {
        // SAFETY: 管线状态由调用方设置
        unsafe { self.list.DrawInstanced(vertex_count, instance_count, start_vertex, start_instance) };
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        // SAFETY: 同上
        unsafe {
            self.list
                .DrawIndexedInstanced(index_count, instance_count, start_index, base_vertex, start_instance)
        };
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        // SAFETY: 同上
        unsafe { self.list.Dispatch(x, y, z) };
    }
}

/// D3D12 命令队列
pub struct Dx12Queue {
    queue: ID3D12CommandQueue,
}

// SAFETY: 命令队列是自由线程对象
unsafe impl Send for Dx12Queue {}
unsafe impl Sync for Dx12Queue {}

impl Dx12Queue {
    pub(crate) fn new(device: &ID3D12Device, list_type: CommandListType) -> Result<Self> {
        let desc = D3D12_COMMAND_QUEUE_DESC {
            Type: convert::list_type(list_type),
            Priority: D3D12_COMMAND_QUEUE_PRIORITY_NORMAL.0,
            Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
            NodeMask: 0,
        };
        // SAFETY: desc 是有效的队列描述
        let queue: ID3D12CommandQueue =
            unsafe { device.CreateCommandQueue(&desc) }.map_err(resource_error("Failed to create command queue"))?;
        Ok(Self { queue })
    }

    pub fn raw(&self) -> &ID3D12CommandQueue {
        &self.queue
    }
}

impl NativeQueue<Dx12Backend> for Dx12Queue {
    fn execute_command_lists(&self, lists: &[&Dx12CommandList]) -> Result<()> {
        let raw = lists
            .iter()
            .map(|list| list.raw().cast::<ID3D12CommandList>().map(Some))
            .collect::<windows::core::Result<Vec<_>>>()
            .map_err(execution_error("Failed to cast command list"))?;
        // SAFETY: 所有列表都已关闭
        unsafe { self.queue.ExecuteCommandLists(&raw) };
        Ok(())
    }

    fn signal(&self, fence: &Dx12Fence, value: u64) -> Result<()> {
        // SAFETY: fence 在队列之前创建、之后销毁
        unsafe { self.queue.Signal(&fence.fence, value) }.map_err(execution_error("Failed to signal fence"))
    }

    fn wait(&self, fence: &Dx12Fence, value: u64) -> Result<()> {
        // SAFETY: 同上
        unsafe { self.queue.Wait(&fence.fence, value) }.map_err(execution_error("Failed to wait for fence"))
    }
}

/// D3D12 Fence
///
/// 每次 CPU 等待使用独立的事件对象，多个线程可以同时等待。
pub struct Dx12Fence {
    fence: ID3D12Fence,
}

// SAFETY: ID3D12Fence 是自由线程对象
unsafe impl Send for Dx12Fence {}
unsafe impl Sync for Dx12Fence {}

impl Dx12Fence {
    pub(crate) fn new(device: &ID3D12Device, initial_value: u64) -> Result<Self> {
        // SAFETY: 纯创建调用
        let fence: ID3D12Fence = unsafe { device.CreateFence(initial_value, D3D12_FENCE_FLAG_NONE) }
            .map_err(resource_error("Failed to create fence"))?;
        Ok(Self { fence })
    }
}

impl NativeFence for Dx12Fence {
    fn completed_value(&self) -> u64 {
        // SAFETY: 纯查询
        unsafe { self.fence.GetCompletedValue() }
    }

    fn wait_for_value(&self, value: u64) -> Result<()> {
        if self.completed_value() >= value {
            return Ok(());
        }
        // SAFETY: 事件在等待结束后关闭
        unsafe {
            let event = CreateEventA(None, false, false, None).map_err(execution_error("Failed to create fence event"))?;
            let result = self
                .fence
                .SetEventOnCompletion(value, event)
                .map_err(execution_error("Failed to set fence event"));
            if result.is_ok() {
                WaitForSingleObject(event, INFINITE);
            }
            let _ = CloseHandle(event);
            result
        }
    }
}
