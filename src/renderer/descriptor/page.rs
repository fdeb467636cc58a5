//! 描述符分配页
//!
//! 一个固定容量的 CPU 描述符堆，内部维护空闲块列表。
//!
//! # 空闲列表
//!
//! - `free_by_offset`：偏移 → 大小，用于查找相邻块做合并
//! - `free_by_size`：(大小, 偏移) 有序集合，用于最佳适配
//!
//! 两个索引始终描述同一组空闲块。释放的描述符先进入按帧号排序的
//! 过期队列，等对应帧在 GPU 上完成后才回到空闲列表。

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use crate::core::error::Result;
use crate::renderer::backend::{Backend, DescriptorHeap, Device};
use crate::renderer::sync::FrameCounter;

use super::allocation::DescriptorAllocation;
use super::{CpuDescriptorHandle, DescriptorHeapType};

/// 等待回收的描述符区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StaleDescriptor {
    offset: u32,
    size: u32,
    /// 释放时的帧号，该帧完成后才可复用
    frame: u64,
}

#[derive(Debug, Default)]
struct PageState {
    free_by_offset: BTreeMap<u32, u32>,
    free_by_size: BTreeSet<(u32, u32)>,
    stale: VecDeque<StaleDescriptor>,
    num_free_handles: u32,
}

impl PageState {
    fn add_free_block(&mut self, offset: u32, size: u32) {
        self.free_by_offset.insert(offset, size);
        self.free_by_size.insert((size, offset));
    }

    fn remove_free_block(&mut self, offset: u32, size: u32) {
        self.free_by_offset.remove(&offset);
        self.free_by_size.remove(&(size, offset));
    }

    /// 归还一个块，并与左右相邻的空闲块合并
    fn free_block(&mut self, offset: u32, size: u32) {
        self.num_free_handles += size;

        let mut start = offset;
        let mut length = size;

        let previous = self
            .free_by_offset
            .range(..offset)
            .next_back()
            .map(|(&o, &s)| (o, s));
        if let Some((prev_offset, prev_size)) = previous {
            if prev_offset + prev_size == offset {
                self.remove_free_block(prev_offset, prev_size);
                start = prev_offset;
                length += prev_size;
            }
        }

        let next = self
            .free_by_offset
            .range(offset..)
            .next()
            .map(|(&o, &s)| (o, s));
        if let Some((next_offset, next_size)) = next {
            if offset + size == next_offset {
                self.remove_free_block(next_offset, next_size);
                length += next_size;
            }
        }

        self.add_free_block(start, length);
    }
}

/// 描述符分配页
pub struct DescriptorAllocatorPage<B: Backend> {
    heap: B::DescriptorHeap,
    heap_type: DescriptorHeapType,
    base_descriptor: CpuDescriptorHandle,
    increment_size: u32,
    num_descriptors: u32,
    frames: FrameCounter,
    state: Mutex<PageState>,
}

impl<B: Backend> DescriptorAllocatorPage<B> {
    /// 创建一个容纳 `num_descriptors` 个描述符的页
    ///
    /// # 参数
    ///
    /// * `device` - 设备
    /// * `heap_type` - 堆类型
    /// * `num_descriptors` - 页容量
    /// * `frames` - 全局帧计数器，分配析构时用它标记释放帧
    pub fn new(
        device: &B::Device,
        heap_type: DescriptorHeapType,
        num_descriptors: u32,
        frames: FrameCounter,
    ) -> Result<Self> {
        let heap = device.create_descriptor_heap(heap_type, num_descriptors, false)?;
        let base_descriptor = heap.cpu_start();
        let increment_size = device.descriptor_increment_size(heap_type);

        let mut state = PageState::default();
        state.free_block(0, num_descriptors);

        info!(
            heap_type = heap_type.name(),
            num_descriptors,
            "Descriptor allocator page created"
        );

        Ok(Self {
            heap,
            heap_type,
            base_descriptor,
            increment_size,
            num_descriptors,
            frames,
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        // 锁中毒时继续使用内部状态
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn heap_type(&self) -> DescriptorHeapType {
        self.heap_type
    }

    pub fn heap(&self) -> &B::DescriptorHeap {
        &self.heap
    }

    /// 页容量
    pub fn num_descriptors(&self) -> u32 {
        self.num_descriptors
    }

    /// 空闲描述符数量（不含尚未回收的过期描述符）
    pub fn num_free_handles(&self) -> u32 {
        self.lock().num_free_handles
    }

    /// 是否存在至少 `num_descriptors` 个连续空闲描述符
    pub fn has_space(&self, num_descriptors: u32) -> bool {
        self.lock()
            .free_by_size
            .range((num_descriptors, 0)..)
            .next()
            .is_some()
    }

    /// 空闲块数量
    pub fn num_free_blocks(&self) -> usize {
        self.lock().free_by_offset.len()
    }

    pub(crate) fn frames(&self) -> &FrameCounter {
        &self.frames
    }

    /// 分配 `num_descriptors` 个连续描述符
    ///
    /// 空间不足时返回空分配。
    pub fn allocate(self: &Arc<Self>, num_descriptors: u32) -> DescriptorAllocation<B> {
        if num_descriptors == 0 {
            return DescriptorAllocation::null();
        }

        let mut state = self.lock();
        if num_descriptors > state.num_free_handles {
            return DescriptorAllocation::null();
        }

        // 最小的足够大的块，大小相同时取偏移最小的
        let Some(&(block_size, offset)) = state.free_by_size.range((num_descriptors, 0)..).next() else {
            return DescriptorAllocation::null();
        };

        state.remove_free_block(offset, block_size);
        if block_size > num_descriptors {
            state.add_free_block(offset + num_descriptors, block_size - num_descriptors);
        }
        state.num_free_handles -= num_descriptors;

        DescriptorAllocation::new(
            self.base_descriptor.offset(offset, self.increment_size),
            num_descriptors,
            self.increment_size,
            Arc::clone(self),
        )
    }

    /// 在 `frame` 帧完成后回收分配
    pub fn free(&self, mut allocation: DescriptorAllocation<B>, frame: u64) {
        if let Some((page, handle, num_handles)) = allocation.take() {
            debug_assert!(std::ptr::eq(Arc::as_ptr(&page), self), "allocation belongs to another page");
            self.free_range(handle, num_handles, frame);
        }
    }

    /// 把一个已分配区间放入过期队列
    pub(crate) fn free_range(&self, handle: CpuDescriptorHandle, num_handles: u32, frame: u64) {
        let offset = self.compute_offset(handle);
        self.lock().stale.push_back(StaleDescriptor {
            offset,
            size: num_handles,
            frame,
        });
    }

    /// 回收帧号不大于 `frame` 的过期描述符
    pub fn release_stale_descriptors(&self, frame: u64) {
        let mut state = self.lock();
        while let Some(&stale) = state.stale.front() {
            if stale.frame > frame {
                break;
            }
            state.free_block(stale.offset, stale.size);
            state.stale.pop_front();
        }
    }

    fn compute_offset(&self, handle: CpuDescriptorHandle) -> u32 {
        ((handle.ptr - self.base_descriptor.ptr) / self.increment_size as usize) as u32
    }
}
