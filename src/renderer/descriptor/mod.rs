//! 描述符管理模块
//!
//! 提供描述符堆类型、描述符句柄，以及基于页的描述符分配器。
//!
//! # 设计原则
//!
//! - **分页分配**：每种堆类型维护一组固定容量的页，页耗尽时自动创建新页
//! - **最佳适配**：页内空闲块同时按偏移和按大小索引，分配取不小于请求的最小块
//! - **延迟回收**：释放的描述符按帧号排队，只有 GPU 完成该帧后才重新可用
//! - **相邻合并**：回收时与左右相邻空闲块合并，恢复连续空间
//!
//! # DirectX 12 描述符堆类型
//!
//! - **CBV/SRV/UAV**：常量缓冲、着色资源、无序访问视图
//! - **Sampler**：采样器
//! - **RTV**：渲染目标视图
//! - **DSV**：深度模板视图

mod allocation;
mod allocator;
mod page;

pub use allocation::DescriptorAllocation;
pub use allocator::{DescriptorAllocator, DescriptorAllocatorStats};
pub use page::DescriptorAllocatorPage;

/// 描述符堆类型
///
/// 判别值与 `D3D12_DESCRIPTOR_HEAP_TYPE` 相同，可直接作为数组下标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorHeapType {
    /// 常量缓冲/着色资源/无序访问视图
    CbvSrvUav = 0,
    /// 采样器
    Sampler = 1,
    /// 渲染目标视图 (RTV)
    Rtv = 2,
    /// 深度模板视图 (DSV)
    Dsv = 3,
}

/// 描述符堆类型数量
pub const NUM_DESCRIPTOR_HEAP_TYPES: usize = 4;

impl DescriptorHeapType {
    /// 全部堆类型，按判别值排列
    pub const ALL: [DescriptorHeapType; NUM_DESCRIPTOR_HEAP_TYPES] = [
        DescriptorHeapType::CbvSrvUav,
        DescriptorHeapType::Sampler,
        DescriptorHeapType::Rtv,
        DescriptorHeapType::Dsv,
    ];

    /// 数组下标
    pub fn index(self) -> usize {
        self as usize
    }

    /// 该类型的堆能否对着色器可见
    pub fn is_shader_visible(&self) -> bool {
        matches!(self, DescriptorHeapType::CbvSrvUav | DescriptorHeapType::Sampler)
    }

    /// 获取堆类型名称
    pub fn name(&self) -> &'static str {
        match self {
            DescriptorHeapType::CbvSrvUav => "CBV_SRV_UAV",
            DescriptorHeapType::Sampler => "Sampler",
            DescriptorHeapType::Rtv => "RTV",
            DescriptorHeapType::Dsv => "DSV",
        }
    }
}

/// 描述符句柄（CPU 可见）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CpuDescriptorHandle {
    /// 句柄指针值
    pub ptr: usize,
}

impl CpuDescriptorHandle {
    /// 创建新的 CPU 描述符句柄
    pub fn new(ptr: usize) -> Self {
        Self { ptr }
    }

    /// 偏移句柄
    pub fn offset(&self, count: u32, increment_size: u32) -> Self {
        Self {
            ptr: self.ptr + count as usize * increment_size as usize,
        }
    }

    /// 是否为空句柄
    pub fn is_null(&self) -> bool {
        self.ptr == 0
    }
}

/// 描述符句柄（GPU 可见）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuDescriptorHandle {
    /// 句柄指针值
    pub ptr: u64,
}

impl GpuDescriptorHandle {
    /// 创建新的 GPU 描述符句柄
    pub fn new(ptr: u64) -> Self {
        Self { ptr }
    }

    /// 偏移句柄
    pub fn offset(&self, count: u32, increment_size: u32) -> Self {
        Self {
            ptr: self.ptr + count as u64 * increment_size as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_type_index() {
        for (i, heap_type) in DescriptorHeapType::ALL.iter().enumerate() {
            assert_eq!(heap_type.index(), i);
        }
        assert!(DescriptorHeapType::Sampler.is_shader_visible());
        assert!(!DescriptorHeapType::Rtv.is_shader_visible());
    }

    #[test]
    fn test_handle_offset() {
        let cpu = CpuDescriptorHandle::new(1000);
        assert_eq!(cpu.offset(3, 32).ptr, 1096);

        let gpu = GpuDescriptorHandle::new(1 << 40);
        assert_eq!(gpu.offset(2, 64).ptr, (1 << 40) + 128);

        assert!(CpuDescriptorHandle::default().is_null());
    }
}
