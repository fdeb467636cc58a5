//! 描述符分配器
//!
//! 管理一种堆类型的所有分配页。请求按顺序尝试可用页，全部失败时
//! 创建一个新页。加锁顺序固定为先分配器后页，页不会回调分配器。

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::Result;
use crate::renderer::backend::Backend;
use crate::renderer::sync::FrameCounter;

use super::allocation::DescriptorAllocation;
use super::page::DescriptorAllocatorPage;
use super::DescriptorHeapType;

/// 每页默认的描述符数量
pub const DEFAULT_DESCRIPTORS_PER_PAGE: u32 = 256;

struct Pool<B: Backend> {
    pages: Vec<Arc<DescriptorAllocatorPage<B>>>,
    /// 仍有空闲描述符的页下标
    available: BTreeSet<usize>,
}

/// 描述符分配器统计信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorAllocatorStats {
    /// 堆类型
    pub heap_type: DescriptorHeapType,
    /// 页数量
    pub num_pages: usize,
    /// 总容量
    pub capacity: u32,
    /// 已使用数量（含等待回收的描述符）
    pub used: u32,
    /// 使用率 (0.0 - 1.0)
    pub usage_ratio: f32,
}

impl DescriptorAllocatorStats {
    fn new(heap_type: DescriptorHeapType, num_pages: usize, capacity: u32, free: u32) -> Self {
        let used = capacity.saturating_sub(free);
        let usage_ratio = if capacity > 0 {
            used as f32 / capacity as f32
        } else {
            0.0
        };

        Self {
            heap_type,
            num_pages,
            capacity,
            used,
            usage_ratio,
        }
    }
}

/// 描述符分配器
pub struct DescriptorAllocator<B: Backend> {
    device: Arc<B::Device>,
    heap_type: DescriptorHeapType,
    descriptors_per_page: u32,
    frames: FrameCounter,
    pool: Mutex<Pool<B>>,
}

impl<B: Backend> DescriptorAllocator<B> {
    /// 创建分配器，第一页在第一次分配时创建
    ///
    /// # 参数
    ///
    /// * `device` - 设备
    /// * `heap_type` - 堆类型
    /// * `descriptors_per_page` - 每页描述符数量
    /// * `frames` - 全局帧计数器
    pub fn new(
        device: Arc<B::Device>,
        heap_type: DescriptorHeapType,
        descriptors_per_page: u32,
        frames: FrameCounter,
    ) -> Self {
        Self {
            device,
            heap_type,
            descriptors_per_page,
            frames,
            pool: Mutex::new(Pool {
                pages: Vec::new(),
                available: BTreeSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pool<B>> {
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn heap_type(&self) -> DescriptorHeapType {
        self.heap_type
    }

    /// 分配 `num_descriptors` 个连续描述符
    ///
    /// 现有页都放不下时创建一个容量为 `max(descriptors_per_page, num_descriptors)` 的新页。
    /// 请求 0 个描述符时返回空分配。
    pub fn allocate(&self, num_descriptors: u32) -> Result<DescriptorAllocation<B>> {
        if num_descriptors == 0 {
            return Ok(DescriptorAllocation::null());
        }
        let mut pool = self.lock();

        let candidates: Vec<usize> = pool.available.iter().copied().collect();
        for index in candidates {
            let page = Arc::clone(&pool.pages[index]);
            let allocation = page.allocate(num_descriptors);

            if page.num_free_handles() == 0 {
                pool.available.remove(&index);
            }

            if !allocation.is_null() {
                return Ok(allocation);
            }
        }

        let page_size = self.descriptors_per_page.max(num_descriptors);
        let page = Arc::new(DescriptorAllocatorPage::<B>::new(
            &self.device,
            self.heap_type,
            page_size,
            self.frames.clone(),
        )?);

        let allocation = page.allocate(num_descriptors);
        let index = pool.pages.len();
        pool.pages.push(Arc::clone(&page));
        if page.num_free_handles() > 0 {
            pool.available.insert(index);
        }

        #[cfg(debug_assertions)]
        tracing::debug!(
            heap_type = self.heap_type.name(),
            pages = pool.pages.len(),
            "Descriptor allocator grew"
        );

        Ok(allocation)
    }

    /// 回收所有页中帧号不大于 `frame` 的过期描述符
    pub fn release_stale_descriptors(&self, frame: u64) {
        let mut pool = self.lock();

        for index in 0..pool.pages.len() {
            let page = Arc::clone(&pool.pages[index]);
            page.release_stale_descriptors(frame);

            if page.num_free_handles() > 0 {
                pool.available.insert(index);
            }
        }
    }

    /// 页数量
    pub fn num_pages(&self) -> usize {
        self.lock().pages.len()
    }

    /// 当前统计信息
    pub fn stats(&self) -> DescriptorAllocatorStats {
        let pool = self.lock();
        let capacity = pool.pages.iter().map(|p| p.num_descriptors()).sum();
        let free = pool.pages.iter().map(|p| p.num_free_handles()).sum();
        DescriptorAllocatorStats::new(self.heap_type, pool.pages.len(), capacity, free)
    }
}
