//! 动态描述符堆
//!
//! 在 CPU 侧按根签名的描述符表布局暂存描述符，Draw/Dispatch 之前
//! 把发生变化的表拷贝到着色器可见的 GPU 堆并绑定。
//!
//! # 设计原则
//!
//! - **按表暂存**：CPU 缓存按根索引从低到高连续布局，每张表一段
//! - **脏标记**：只有被暂存过的表（脏位）才会在提交时重新拷贝
//! - **堆轮换**：当前 GPU 堆空间不足时换一个新堆，并把所有表标脏
//! - **复用**：`reset` 后用过的 GPU 堆回到可用队列，下一帧继续使用
//!
//! 未被暂存的表槽位保持空句柄，调用方需在 Draw/Dispatch 前暂存每张表的全部描述符。

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::info;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::backend::{Backend, DescriptorHeap, Device, NativeCommandList};
use crate::renderer::descriptor::{
    CpuDescriptorHandle, DescriptorHeapType, GpuDescriptorHandle, NUM_DESCRIPTOR_HEAP_TYPES,
};
use crate::renderer::root_signature::{RootSignature, MAX_ROOT_PARAMETERS};

/// 根签名中描述符表的最大数量
pub const MAX_DESCRIPTOR_TABLES: usize = MAX_ROOT_PARAMETERS;

/// 每个 GPU 堆默认的描述符数量
pub const DEFAULT_DESCRIPTORS_PER_HEAP: u32 = 1024;

/// 命令列表上绑定的描述符堆
///
/// 只在某种类型的堆发生变化时重新绑定，绑定时提交全部非空的堆。
pub struct DescriptorHeapBindings<B: Backend> {
    heaps: [Option<B::DescriptorHeap>; NUM_DESCRIPTOR_HEAP_TYPES],
}

impl<B: Backend> DescriptorHeapBindings<B> {
    pub fn new() -> Self {
        Self {
            heaps: std::array::from_fn(|_| None),
        }
    }

    /// 绑定 `heap` 作为 `heap_type` 类型的堆
    pub fn set(&mut self, list: &mut B::CommandList, heap_type: DescriptorHeapType, heap: &B::DescriptorHeap) {
        let slot = &mut self.heaps[heap_type.index()];
        if slot.as_ref() == Some(heap) {
            return;
        }
        *slot = Some(heap.clone());

        let bound: Vec<&B::DescriptorHeap> = self.heaps.iter().flatten().collect();
        list.set_descriptor_heaps(&bound);
    }

    pub fn get(&self, heap_type: DescriptorHeapType) -> Option<&B::DescriptorHeap> {
        self.heaps[heap_type.index()].as_ref()
    }

    /// 解除所有绑定
    pub fn clear(&mut self) {
        self.heaps.iter_mut().for_each(|heap| *heap = None);
    }
}

impl<B: Backend> Default for DescriptorHeapBindings<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// 一张描述符表在 CPU 缓存中的位置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DescriptorTableCache {
    num_descriptors: u32,
    base_offset: u32,
}

/// 动态描述符堆
pub struct DynamicDescriptorHeap<B: Backend> {
    device: Arc<B::Device>,
    heap_type: DescriptorHeapType,
    descriptors_per_heap: u32,
    increment_size: u32,

    cpu_cache: Vec<CpuDescriptorHandle>,
    table_cache: [DescriptorTableCache; MAX_DESCRIPTOR_TABLES],
    descriptor_table_bit_mask: u32,
    stale_descriptor_table_bit_mask: u32,

    heap_pool: Vec<B::DescriptorHeap>,
    available_heaps: VecDeque<B::DescriptorHeap>,
    current_heap: Option<B::DescriptorHeap>,
    current_cpu_handle: CpuDescriptorHandle,
    current_gpu_handle: GpuDescriptorHandle,
    num_free_handles: u32,
}

impl<B: Backend> DynamicDescriptorHeap<B> {
    /// 创建动态描述符堆，GPU 堆在第一次提交时创建
    pub fn new(device: Arc<B::Device>, heap_type: DescriptorHeapType, descriptors_per_heap: u32) -> Self {
        let increment_size = device.descriptor_increment_size(heap_type);
        Self {
            device,
            heap_type,
            descriptors_per_heap,
            increment_size,
            cpu_cache: vec![CpuDescriptorHandle::default(); descriptors_per_heap as usize],
            table_cache: [DescriptorTableCache::default(); MAX_DESCRIPTOR_TABLES],
            descriptor_table_bit_mask: 0,
            stale_descriptor_table_bit_mask: 0,
            heap_pool: Vec::new(),
            available_heaps: VecDeque::new(),
            current_heap: None,
            current_cpu_handle: CpuDescriptorHandle::default(),
            current_gpu_handle: GpuDescriptorHandle::default(),
            num_free_handles: 0,
        }
    }

    pub fn heap_type(&self) -> DescriptorHeapType {
        self.heap_type
    }

    /// 暂存描述符
    ///
    /// # 参数
    ///
    /// * `root_index` - 描述符表的根索引
    /// * `offset` - 表内偏移
    /// * `num_descriptors` - 连续描述符数量
    /// * `src` - 第一个源描述符（CPU 可见堆）
    pub fn stage_descriptors(
        &mut self,
        root_index: u32,
        offset: u32,
        num_descriptors: u32,
        src: CpuDescriptorHandle,
    ) -> Result<()> {
        if num_descriptors > self.descriptors_per_heap || root_index as usize >= MAX_DESCRIPTOR_TABLES {
            return Err(GraphicsError::OutOfDescriptors {
                requested: num_descriptors,
                capacity: self.descriptors_per_heap,
            }
            .into());
        }

        let table = self.table_cache[root_index as usize];
        let end = offset.checked_add(num_descriptors);
        if end.map_or(true, |end| end > table.num_descriptors) {
            return Err(GraphicsError::DescriptorRange {
                root_index,
                offset,
                count: num_descriptors,
                table_size: table.num_descriptors,
            }
            .into());
        }

        let start = (table.base_offset + offset) as usize;
        for i in 0..num_descriptors {
            self.cpu_cache[start + i as usize] = src.offset(i, self.increment_size);
        }

        self.stale_descriptor_table_bit_mask |= 1 << root_index;
        Ok(())
    }

    /// 按根签名重新布局 CPU 缓存并清除脏位
    pub fn parse_root_signature(&mut self, root_signature: &RootSignature<B>) -> Result<()> {
        self.stale_descriptor_table_bit_mask = 0;
        self.table_cache = [DescriptorTableCache::default(); MAX_DESCRIPTOR_TABLES];

        let mask = root_signature.descriptor_table_bit_mask(self.heap_type);
        self.descriptor_table_bit_mask = mask;

        let mut current_offset = 0u32;
        for root_index in set_bits(mask) {
            let num_descriptors = root_signature.num_descriptors(root_index);
            if current_offset + num_descriptors > self.descriptors_per_heap {
                return Err(GraphicsError::OutOfDescriptors {
                    requested: current_offset + num_descriptors,
                    capacity: self.descriptors_per_heap,
                }
                .into());
            }

            self.table_cache[root_index as usize] = DescriptorTableCache {
                num_descriptors,
                base_offset: current_offset,
            };
            current_offset += num_descriptors;
        }

        Ok(())
    }

    /// 脏表的描述符总数
    fn compute_stale_descriptor_count(&self) -> u32 {
        set_bits(self.stale_descriptor_table_bit_mask)
            .map(|root_index| self.table_cache[root_index as usize].num_descriptors)
            .sum()
    }

    fn request_descriptor_heap(&mut self) -> Result<B::DescriptorHeap> {
        if let Some(heap) = self.available_heaps.pop_front() {
            return Ok(heap);
        }

        let heap = self
            .device
            .create_descriptor_heap(self.heap_type, self.descriptors_per_heap, true)?;
        self.heap_pool.push(heap.clone());

        info!(
            heap_type = self.heap_type.name(),
            num_descriptors = self.descriptors_per_heap,
            pool_size = self.heap_pool.len(),
            "Dynamic descriptor heap created"
        );

        Ok(heap)
    }

    /// 换到一个新的 GPU 堆，绑定并把所有表标脏
    fn switch_heap(&mut self, list: &mut B::CommandList, bindings: &mut DescriptorHeapBindings<B>) -> Result<()> {
        let heap = self.request_descriptor_heap()?;
        self.current_cpu_handle = heap.cpu_start();
        self.current_gpu_handle = heap.gpu_start();
        self.num_free_handles = self.descriptors_per_heap;

        bindings.set(list, self.heap_type, &heap);
        self.current_heap = Some(heap);

        self.stale_descriptor_table_bit_mask = self.descriptor_table_bit_mask;
        Ok(())
    }

    fn commit_staged_descriptors<F>(
        &mut self,
        list: &mut B::CommandList,
        bindings: &mut DescriptorHeapBindings<B>,
        mut set_descriptor_table: F,
    ) -> Result<usize>
    where
        F: FnMut(&mut B::CommandList, u32, GpuDescriptorHandle),
    {
        let num_descriptors_to_commit = self.compute_stale_descriptor_count();
        if num_descriptors_to_commit == 0 {
            return Ok(0);
        }

        if self.current_heap.is_none() || self.num_free_handles < num_descriptors_to_commit {
            self.switch_heap(list, bindings)?;
        }

        let mut committed = 0usize;
        for root_index in set_bits(self.stale_descriptor_table_bit_mask) {
            let table = self.table_cache[root_index as usize];
            let start = table.base_offset as usize;
            let sources = &self.cpu_cache[start..start + table.num_descriptors as usize];

            self.device
                .copy_descriptors(self.current_cpu_handle, sources, self.heap_type);
            set_descriptor_table(list, root_index, self.current_gpu_handle);

            self.current_cpu_handle = self.current_cpu_handle.offset(table.num_descriptors, self.increment_size);
            self.current_gpu_handle = self.current_gpu_handle.offset(table.num_descriptors, self.increment_size);
            self.num_free_handles -= table.num_descriptors;
            committed += 1;
        }
        self.stale_descriptor_table_bit_mask = 0;

        Ok(committed)
    }

    /// 提交脏表并以图形根参数绑定，返回提交的表数量
    pub fn commit_staged_descriptors_for_draw(
        &mut self,
        list: &mut B::CommandList,
        bindings: &mut DescriptorHeapBindings<B>,
    ) -> Result<usize> {
        self.commit_staged_descriptors(list, bindings, |list, root_index, base| {
            list.set_graphics_root_descriptor_table(root_index, base)
        })
    }

    /// 提交脏表并以计算根参数绑定，返回提交的表数量
    pub fn commit_staged_descriptors_for_dispatch(
        &mut self,
        list: &mut B::CommandList,
        bindings: &mut DescriptorHeapBindings<B>,
    ) -> Result<usize> {
        self.commit_staged_descriptors(list, bindings, |list, root_index, base| {
            list.set_compute_root_descriptor_table(root_index, base)
        })
    }

    /// 把单个描述符直接拷贝到 GPU 堆，返回其 GPU 句柄
    pub fn copy_descriptor(
        &mut self,
        list: &mut B::CommandList,
        bindings: &mut DescriptorHeapBindings<B>,
        cpu_descriptor: CpuDescriptorHandle,
    ) -> Result<GpuDescriptorHandle> {
        if self.current_heap.is_none() || self.num_free_handles < 1 {
            self.switch_heap(list, bindings)?;
        }

        let gpu_handle = self.current_gpu_handle;
        self.device
            .copy_descriptors(self.current_cpu_handle, &[cpu_descriptor], self.heap_type);

        self.current_cpu_handle = self.current_cpu_handle.offset(1, self.increment_size);
        self.current_gpu_handle = self.current_gpu_handle.offset(1, self.increment_size);
        self.num_free_handles -= 1;

        Ok(gpu_handle)
    }

    /// 所有 GPU 堆回到可用队列，清空布局和脏位
    ///
    /// 只能在使用这些堆的命令列表执行完毕后调用。
    pub fn reset(&mut self) {
        self.available_heaps = self.heap_pool.iter().cloned().collect();
        self.current_heap = None;
        self.current_cpu_handle = CpuDescriptorHandle::default();
        self.current_gpu_handle = GpuDescriptorHandle::default();
        self.num_free_handles = 0;
        self.descriptor_table_bit_mask = 0;
        self.stale_descriptor_table_bit_mask = 0;
        self.table_cache = [DescriptorTableCache::default(); MAX_DESCRIPTOR_TABLES];
    }

    /// 创建过的 GPU 堆数量
    pub fn num_heaps(&self) -> usize {
        self.heap_pool.len()
    }

    /// 当前 GPU 堆中剩余的描述符数量
    pub fn num_free_handles(&self) -> u32 {
        self.num_free_handles
    }

    /// 等待提交的表的位掩码
    pub fn stale_table_mask(&self) -> u32 {
        self.stale_descriptor_table_bit_mask
    }
}

/// 按从低到高的顺序遍历置位的位下标
fn set_bits(mut mask: u32) -> impl Iterator<Item = u32> {
    std::iter::from_fn(move || {
        if mask == 0 {
            return None;
        }
        let index = mask.trailing_zeros();
        mask &= !(1 << index);
        Some(index)
    })
}
