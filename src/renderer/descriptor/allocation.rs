//! 描述符分配
//!
//! 一段连续的 CPU 描述符，持有所在页的共享引用。只能移动，不能复制；
//! 析构时按当前帧号交还给页，页在该帧完成后才会复用这段描述符。

use std::fmt;
use std::sync::Arc;

use crate::renderer::backend::Backend;

use super::page::DescriptorAllocatorPage;
use super::CpuDescriptorHandle;

/// 描述符分配
pub struct DescriptorAllocation<B: Backend> {
    descriptor: CpuDescriptorHandle,
    num_handles: u32,
    increment_size: u32,
    page: Option<Arc<DescriptorAllocatorPage<B>>>,
}

impl<B: Backend> DescriptorAllocation<B> {
    /// 空分配
    pub fn null() -> Self {
        Self {
            descriptor: CpuDescriptorHandle::default(),
            num_handles: 0,
            increment_size: 0,
            page: None,
        }
    }

    pub(crate) fn new(
        descriptor: CpuDescriptorHandle,
        num_handles: u32,
        increment_size: u32,
        page: Arc<DescriptorAllocatorPage<B>>,
    ) -> Self {
        Self {
            descriptor,
            num_handles,
            increment_size,
            page: Some(page),
        }
    }

    pub fn is_null(&self) -> bool {
        self.descriptor.is_null()
    }

    /// 第 `offset` 个描述符的句柄
    pub fn descriptor_handle(&self, offset: u32) -> CpuDescriptorHandle {
        assert!(offset < self.num_handles, "descriptor offset out of range");
        self.descriptor.offset(offset, self.increment_size)
    }

    pub fn num_handles(&self) -> u32 {
        self.num_handles
    }

    pub fn increment_size(&self) -> u32 {
        self.increment_size
    }

    /// 所在页
    pub fn page(&self) -> Option<&Arc<DescriptorAllocatorPage<B>>> {
        self.page.as_ref()
    }

    /// 在 `frame` 帧完成后回收
    pub fn free(mut self, frame: u64) {
        if let Some((page, handle, num_handles)) = self.take() {
            page.free_range(handle, num_handles, frame);
        }
    }

    /// 取出内容，留下空分配
    pub(crate) fn take(&mut self) -> Option<(Arc<DescriptorAllocatorPage<B>>, CpuDescriptorHandle, u32)> {
        let page = self.page.take()?;
        let handle = std::mem::take(&mut self.descriptor);
        let num_handles = std::mem::take(&mut self.num_handles);
        if handle.is_null() {
            return None;
        }
        Some((page, handle, num_handles))
    }
}

impl<B: Backend> Drop for DescriptorAllocation<B> {
    fn drop(&mut self) {
        if let Some((page, handle, num_handles)) = self.take() {
            let frame = page.frames().current();
            page.free_range(handle, num_handles, frame);
        }
    }
}

impl<B: Backend> Default for DescriptorAllocation<B> {
    fn default() -> Self {
        Self::null()
    }
}

impl<B: Backend> fmt::Debug for DescriptorAllocation<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorAllocation")
            .field("descriptor", &self.descriptor)
            .field("num_handles", &self.num_handles)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::descriptor::DescriptorHeapType;
    use crate::renderer::sync::FrameCounter;
    use crate::renderer::testing::{MockBackend, MockDevice};

    #[test]
    fn test_null_allocation() {
        let allocation = DescriptorAllocation::<MockBackend>::null();
        assert!(allocation.is_null());
        assert_eq!(allocation.num_handles(), 0);
        assert!(allocation.page().is_none());
        // 空分配的析构和释放什么都不做
        allocation.free(0);
    }

    #[test]
    fn test_descriptor_handle_offset() {
        let device = MockDevice::new();
        let page = Arc::new(
            DescriptorAllocatorPage::<MockBackend>::new(&device, DescriptorHeapType::Rtv, 8, FrameCounter::new())
                .unwrap(),
        );
        let allocation = page.allocate(3);
        let first = allocation.descriptor_handle(0);
        let third = allocation.descriptor_handle(2);
        assert_eq!(third.ptr - first.ptr, 2 * allocation.increment_size() as usize);

        allocation.free(7);
        page.release_stale_descriptors(7);
        assert_eq!(page.num_free_handles(), 8);
    }

    #[test]
    #[should_panic]
    fn test_descriptor_handle_out_of_range() {
        let device = MockDevice::new();
        let page = Arc::new(
            DescriptorAllocatorPage::<MockBackend>::new(&device, DescriptorHeapType::Dsv, 4, FrameCounter::new())
                .unwrap(),
        );
        let allocation = page.allocate(2);
        allocation.descriptor_handle(2);
    }
}
