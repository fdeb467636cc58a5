//! 上传缓冲区
//!
//! 线性分页的临时上传内存分配器，用于动态顶点/索引/常量数据。
//! 每页是一个持久映射的上传堆缓冲区，分配只移动页内游标，
//! 命令列表执行完毕后整体 `reset`。

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

use bytemuck::Pod;
use tracing::info;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::backend::{Backend, Device, GpuResource};
use crate::renderer::resource::{align_up, HeapKind, ResourceDesc, ResourceFlags, ResourceStates};

/// 默认页大小（4 MiB）
pub const DEFAULT_UPLOAD_PAGE_SIZE: usize = 4 * 1024 * 1024;

/// 一次上传分配
///
/// 借用所属的上传缓冲区，因此不能跨越下一次分配或 `reset` 使用。
/// GPU 地址在命令列表执行完毕前保持有效。
#[derive(Debug)]
pub struct UploadAllocation<'a> {
    cpu: NonNull<u8>,
    gpu: u64,
    size: usize,
    _page: PhantomData<&'a mut [u8]>,
}

impl UploadAllocation<'_> {
    /// CPU 写入地址
    pub fn cpu_ptr(&self) -> NonNull<u8> {
        self.cpu
    }

    /// GPU 虚拟地址
    pub fn gpu_address(&self) -> u64 {
        self.gpu
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 写入字节
    pub fn write(&mut self, data: &[u8]) {
        assert!(data.len() <= self.size, "upload write exceeds allocation");
        // SAFETY: cpu 指向映射内存中至少 size 字节的区间，借用期间页不会重置或再分配
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.cpu.as_ptr(), data.len());
        }
    }

    /// 写入 POD 切片
    pub fn write_slice<T: Pod>(&mut self, data: &[T]) {
        self.write(bytemuck::cast_slice(data));
    }
}

/// 一页上传内存
struct Page<B: Backend> {
    /// 持有资源以保持映射有效
    _resource: B::Resource,
    cpu_base: NonNull<u8>,
    gpu_base: u64,
    page_size: usize,
    offset: usize,
}

// SAFETY: cpu_base 指向资源的持久映射内存，生命周期与资源相同，
// 同一时间只有拥有该页的命令列表会写入
unsafe impl<B: Backend> Send for Page<B> {}

impl<B: Backend> Page<B> {
    fn new(device: &B::Device, page_size: usize) -> Result<Self> {
        let resource = device.create_committed_resource(
            &ResourceDesc::buffer(page_size as u64, ResourceFlags::NONE),
            HeapKind::Upload,
            ResourceStates::GENERIC_READ,
            None,
        )?;
        resource.set_name("Upload Buffer Page");

        let cpu_base = device.map(&resource)?;
        let gpu_base = resource.gpu_virtual_address();

        Ok(Self {
            _resource: resource,
            cpu_base,
            gpu_base,
            page_size,
            offset: 0,
        })
    }

    fn has_space(&self, size: usize, alignment: usize) -> bool {
        align_up(self.offset, alignment) + size <= self.page_size
    }

    fn allocate(&mut self, size: usize, alignment: usize) -> UploadAllocation<'_> {
        let aligned_offset = align_up(self.offset, alignment);
        self.offset = aligned_offset + size;

        UploadAllocation {
            // SAFETY: aligned_offset + size <= page_size，仍在映射范围内
            cpu: unsafe { NonNull::new_unchecked(self.cpu_base.as_ptr().add(aligned_offset)) },
            gpu: self.gpu_base + aligned_offset as u64,
            size,
            _page: PhantomData,
        }
    }

    fn reset(&mut self) {
        self.offset = 0;
    }
}

/// 上传缓冲区
pub struct UploadBuffer<B: Backend> {
    device: Arc<B::Device>,
    page_size: usize,
    page_pool: Vec<Page<B>>,
    available_pages: VecDeque<usize>,
    current_page: Option<usize>,
}

impl<B: Backend> UploadBuffer<B> {
    /// 创建上传缓冲区，页在第一次分配时创建
    pub fn new(device: Arc<B::Device>, page_size: usize) -> Self {
        Self {
            device,
            page_size,
            page_pool: Vec::new(),
            available_pages: VecDeque::new(),
            current_page: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// 分配 `size` 字节，起始地址按 `alignment` 对齐
    ///
    /// # 参数
    ///
    /// * `size` - 字节数，不能超过页大小
    /// * `alignment` - 对齐（2 的幂）
    pub fn allocate(&mut self, size: usize, alignment: usize) -> Result<UploadAllocation<'_>> {
        if size > self.page_size {
            return Err(GraphicsError::OutOfUploadMemory {
                requested: size,
                page_size: self.page_size,
            }
            .into());
        }

        let index = match self.current_page {
            Some(index) if self.page_pool[index].has_space(size, alignment) => index,
            _ => {
                let index = self.request_page()?;
                self.current_page = Some(index);
                index
            }
        };

        Ok(self.page_pool[index].allocate(size, alignment))
    }

    fn request_page(&mut self) -> Result<usize> {
        if let Some(index) = self.available_pages.pop_front() {
            return Ok(index);
        }

        let page = Page::<B>::new(&self.device, self.page_size)?;
        self.page_pool.push(page);

        info!(
            page_size = self.page_size,
            pages = self.page_pool.len(),
            "Upload buffer page created"
        );

        Ok(self.page_pool.len() - 1)
    }

    /// 所有页回到可用队列
    ///
    /// 只能在使用这些内存的命令列表执行完毕后调用。
    pub fn reset(&mut self) {
        self.current_page = None;
        self.available_pages = (0..self.page_pool.len()).collect();
        self.page_pool.iter_mut().for_each(Page::reset);
    }

    /// 已创建的页数量
    pub fn num_pages(&self) -> usize {
        self.page_pool.len()
    }
}
