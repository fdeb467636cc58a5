//! 资源描述模块
//!
//! 提供与图形 API 无关的资源描述类型：资源状态、格式、资源描述、缓冲视图等。
//! 所有数值（资源状态位、格式编号、拓扑类型）与 D3D12/DXGI 的定义逐位一致，
//! 后端只需做一次直接转换即可提交给驱动。
//!
//! # 设计原则
//!
//! - **逐位一致**：状态位和格式编号与原生 API 相同
//! - **值类型**：所有描述都是 `Copy` 的纯数据
//! - **自动对齐**：提供常量缓冲区的 256 字节对齐辅助函数

use bitflags::bitflags;

/// 代表资源全部子资源的特殊索引
pub const ALL_SUBRESOURCES: u32 = 0xFFFF_FFFF;

/// 常量缓冲区的放置对齐（字节）
pub const CONSTANT_BUFFER_ALIGNMENT: usize = 256;

/// 向上对齐到 `alignment` 的整数倍（`alignment` 必须是 2 的幂）
pub fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// 资源的稳定标识
///
/// 由原生对象地址得到，只用作全局状态表的键，不持有资源。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub usize);

bitflags! {
    /// 资源状态位集合
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceStates: u32 {
        const COMMON = 0;
        const PRESENT = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const STREAM_OUT = 0x100;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
        const RESOLVE_DEST = 0x1000;
        const RESOLVE_SOURCE = 0x2000;
        const GENERIC_READ = 0xAC3;
    }
}

bitflags! {
    /// 资源创建标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u32 {
        const NONE = 0;
        const ALLOW_RENDER_TARGET = 0x1;
        const ALLOW_DEPTH_STENCIL = 0x2;
        const ALLOW_UNORDERED_ACCESS = 0x4;
        const DENY_SHADER_RESOURCE = 0x8;
    }
}

/// 纹理/缓冲格式
///
/// 判别值与 `DXGI_FORMAT` 相同。
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Unknown = 0,
    R32G32B32A32Float = 2,
    R32G32B32A32Uint = 3,
    R32G32B32A32Sint = 4,
    R32G32B32Float = 6,
    R16G16B16A16Float = 10,
    R16G16B16A16Uint = 12,
    R16G16B16A16Sint = 14,
    R32G32Float = 16,
    D32FloatS8X24Uint = 20,
    R8G8B8A8Unorm = 28,
    R8G8B8A8UnormSrgb = 29,
    R8G8B8A8Uint = 30,
    R8G8B8A8Sint = 32,
    D32Float = 40,
    R32Float = 41,
    R32Uint = 42,
    R32Sint = 43,
    D24UnormS8Uint = 45,
    R16Float = 54,
    D16Unorm = 55,
    R16Uint = 57,
    R16Sint = 59,
    R8Unorm = 61,
    R8Uint = 62,
    R8Sint = 64,
    Bc1Unorm = 71,
    Bc1UnormSrgb = 72,
    Bc2Unorm = 74,
    Bc2UnormSrgb = 75,
    Bc3Unorm = 77,
    Bc3UnormSrgb = 78,
    B8G8R8A8Unorm = 87,
    B8G8R8X8Unorm = 88,
    B8G8R8A8Typeless = 90,
    B8G8R8A8UnormSrgb = 91,
    B8G8R8X8Typeless = 92,
    B8G8R8X8UnormSrgb = 93,
    Bc7Unorm = 98,
    Bc7UnormSrgb = 99,
}

impl Format {
    /// 原生格式编号
    pub fn raw(self) -> u32 {
        self as u32
    }

    /// 从原生格式编号还原，未列出的格式返回 `Unknown`
    pub fn from_raw(raw: u32) -> Self {
        const KNOWN: [Format; 40] = [
            Format::Unknown,
            Format::R32G32B32A32Float,
            Format::R32G32B32A32Uint,
            Format::R32G32B32A32Sint,
            Format::R32G32B32Float,
            Format::R16G16B16A16Float,
            Format::R16G16B16A16Uint,
            Format::R16G16B16A16Sint,
            Format::R32G32Float,
            Format::D32FloatS8X24Uint,
            Format::R8G8B8A8Unorm,
            Format::R8G8B8A8UnormSrgb,
            Format::R8G8B8A8Uint,
            Format::R8G8B8A8Sint,
            Format::D32Float,
            Format::R32Float,
            Format::R32Uint,
            Format::R32Sint,
            Format::D24UnormS8Uint,
            Format::R16Float,
            Format::D16Unorm,
            Format::R16Uint,
            Format::R16Sint,
            Format::R8Unorm,
            Format::R8Uint,
            Format::R8Sint,
            Format::Bc1Unorm,
            Format::Bc1UnormSrgb,
            Format::Bc2Unorm,
            Format::Bc2UnormSrgb,
            Format::Bc3Unorm,
            Format::Bc3UnormSrgb,
            Format::B8G8R8A8Unorm,
            Format::B8G8R8X8Unorm,
            Format::B8G8R8A8Typeless,
            Format::B8G8R8A8UnormSrgb,
            Format::B8G8R8X8Typeless,
            Format::B8G8R8X8UnormSrgb,
            Format::Bc7Unorm,
            Format::Bc7UnormSrgb,
        ];
        KNOWN
            .iter()
            .copied()
            .find(|format| format.raw() == raw)
            .unwrap_or(Format::Unknown)
    }

    /// 能否直接作为类型化 UAV 使用
    pub fn is_uav_compatible(self) -> bool {
        matches!(
            self,
            Format::R32G32B32A32Float
                | Format::R32G32B32A32Uint
                | Format::R32G32B32A32Sint
                | Format::R16G16B16A16Float
                | Format::R16G16B16A16Uint
                | Format::R16G16B16A16Sint
                | Format::R8G8B8A8Unorm
                | Format::R8G8B8A8Uint
                | Format::R8G8B8A8Sint
                | Format::R32Float
                | Format::R32Uint
                | Format::R32Sint
                | Format::R16Float
                | Format::R16Uint
                | Format::R16Sint
                | Format::R8Unorm
                | Format::R8Uint
                | Format::R8Sint
        )
    }

    /// 是否为 sRGB 格式
    pub fn is_srgb(self) -> bool {
        matches!(
            self,
            Format::R8G8B8A8UnormSrgb
                | Format::Bc1UnormSrgb
                | Format::Bc2UnormSrgb
                | Format::Bc3UnormSrgb
                | Format::B8G8R8A8UnormSrgb
                | Format::B8G8R8X8UnormSrgb
                | Format::Bc7UnormSrgb
        )
    }

    /// 是否为 BGR 通道顺序
    pub fn is_bgr(self) -> bool {
        matches!(
            self,
            Format::B8G8R8A8Unorm
                | Format::B8G8R8X8Unorm
                | Format::B8G8R8A8Typeless
                | Format::B8G8R8A8UnormSrgb
                | Format::B8G8R8X8Typeless
                | Format::B8G8R8X8UnormSrgb
        )
    }

    /// 是否为深度格式
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Format::D32FloatS8X24Uint | Format::D32Float | Format::D24UnormS8Uint | Format::D16Unorm
        )
    }

    /// 对应的 sRGB 格式，没有 sRGB 变体时原样返回
    pub fn to_srgb(self) -> Self {
        match self {
            Format::R8G8B8A8Unorm => Format::R8G8B8A8UnormSrgb,
            Format::Bc1Unorm => Format::Bc1UnormSrgb,
            Format::Bc2Unorm => Format::Bc2UnormSrgb,
            Format::Bc3Unorm => Format::Bc3UnormSrgb,
            Format::B8G8R8A8Unorm => Format::B8G8R8A8UnormSrgb,
            Format::B8G8R8X8Unorm => Format::B8G8R8X8UnormSrgb,
            Format::Bc7Unorm => Format::Bc7UnormSrgb,
            other => other,
        }
    }

    /// 对应的线性格式，非 sRGB 格式原样返回
    pub fn to_linear(self) -> Self {
        match self {
            Format::R8G8B8A8UnormSrgb => Format::R8G8B8A8Unorm,
            Format::Bc1UnormSrgb => Format::Bc1Unorm,
            Format::Bc2UnormSrgb => Format::Bc2Unorm,
            Format::Bc3UnormSrgb => Format::Bc3Unorm,
            Format::B8G8R8A8UnormSrgb => Format::B8G8R8A8Unorm,
            Format::B8G8R8X8UnormSrgb => Format::B8G8R8X8Unorm,
            Format::Bc7UnormSrgb => Format::Bc7Unorm,
            other => other,
        }
    }
}

/// 资源维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDimension {
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
}

/// 资源所在堆的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapKind {
    /// GPU 本地内存
    Default,
    /// CPU 写、GPU 读
    Upload,
    /// GPU 写、CPU 读
    Readback,
}

/// 资源描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDesc {
    pub dimension: ResourceDimension,
    pub width: u64,
    pub height: u32,
    pub depth_or_array_size: u16,
    pub mip_levels: u16,
    pub format: Format,
    pub sample_count: u32,
    pub sample_quality: u32,
    pub flags: ResourceFlags,
}

impl ResourceDesc {
    /// 缓冲区描述
    pub fn buffer(size: u64, flags: ResourceFlags) -> Self {
        Self {
            dimension: ResourceDimension::Buffer,
            width: size,
            height: 1,
            depth_or_array_size: 1,
            mip_levels: 1,
            format: Format::Unknown,
            sample_count: 1,
            sample_quality: 0,
            flags,
        }
    }

    /// 2D 纹理描述，`mip_levels` 为 0 时生成完整的 mip 链
    pub fn texture_2d(format: Format, width: u64, height: u32, array_size: u16, mip_levels: u16) -> Self {
        let mip_levels = if mip_levels == 0 {
            full_mip_chain(width, height)
        } else {
            mip_levels
        };
        Self {
            dimension: ResourceDimension::Texture2D,
            width,
            height,
            depth_or_array_size: array_size,
            mip_levels,
            format,
            sample_count: 1,
            sample_quality: 0,
            flags: ResourceFlags::NONE,
        }
    }

    pub fn with_flags(mut self, flags: ResourceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// 子资源总数
    pub fn subresource_count(&self) -> u32 {
        let array = match self.dimension {
            ResourceDimension::Texture3D => 1,
            _ => self.depth_or_array_size as u32,
        };
        self.mip_levels as u32 * array
    }
}

/// 完整 mip 链的层数
pub fn full_mip_chain(width: u64, height: u32) -> u16 {
    let largest = width.max(height as u64).max(1);
    (64 - largest.leading_zeros()) as u16
}

/// 优化清除值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color { format: Format, color: [f32; 4] },
    DepthStencil { format: Format, depth: f32, stencil: u8 },
}

/// 一个子资源的 CPU 侧数据
#[derive(Debug, Clone, Copy)]
pub struct SubresourceData<'a> {
    pub data: &'a [u8],
    pub row_pitch: usize,
    pub slice_pitch: usize,
}

/// 顶点缓冲视图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexBufferView {
    pub buffer_location: u64,
    pub size_in_bytes: u32,
    pub stride_in_bytes: u32,
}

/// 索引缓冲视图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexBufferView {
    pub buffer_location: u64,
    pub size_in_bytes: u32,
    pub format: Format,
}

/// 视口
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// 覆盖整个渲染目标的视口
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            top_left_x: 0.0,
            top_left_y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 裁剪矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScissorRect {
    /// 不裁剪任何像素的矩形
    pub fn unbounded() -> Self {
        Self {
            left: 0,
            top: 0,
            right: i32::MAX,
            bottom: i32::MAX,
        }
    }
}

/// 图元拓扑（判别值与 `D3D_PRIMITIVE_TOPOLOGY` 相同）
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList = 1,
    LineList = 2,
    LineStrip = 3,
    TriangleList = 4,
    TriangleStrip = 5,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(300, 4), 300);
        assert_eq!(align_up(301, 4), 304);
    }

    #[test]
    fn test_resource_states_bits() {
        let read = ResourceStates::PIXEL_SHADER_RESOURCE | ResourceStates::NON_PIXEL_SHADER_RESOURCE;
        assert_eq!(read.bits(), 0xC0);
        assert!(ResourceStates::GENERIC_READ.contains(ResourceStates::COPY_SOURCE));
        assert_eq!(ResourceStates::PRESENT, ResourceStates::COMMON);
        assert_eq!(ResourceStates::default(), ResourceStates::COMMON);
    }

    #[test]
    fn test_flags_keep_native_bits() {
        // 原生描述中的未知位被丢弃，已知位保持不变
        let flags = ResourceFlags::from_bits_truncate(0x4 | 0x1 | 0x40);
        assert_eq!(flags, ResourceFlags::ALLOW_UNORDERED_ACCESS | ResourceFlags::ALLOW_RENDER_TARGET);
        assert_eq!(flags.bits(), 0x5);
        assert!(!flags.contains(ResourceFlags::DENY_SHADER_RESOURCE));
        assert_eq!(ResourceStates::GENERIC_READ.bits(), 0xAC3);
        assert_eq!(ResourceStates::from_bits(0x10000), None);
    }

    #[test]
    fn test_format_classes() {
        assert!(Format::R8G8B8A8Unorm.is_uav_compatible());
        assert!(!Format::R8G8B8A8UnormSrgb.is_uav_compatible());
        assert!(Format::B8G8R8A8UnormSrgb.is_bgr());
        assert!(Format::B8G8R8A8UnormSrgb.is_srgb());
        assert!(Format::D24UnormS8Uint.is_depth());
        assert_eq!(Format::R8G8B8A8Unorm.to_srgb(), Format::R8G8B8A8UnormSrgb);
        assert_eq!(Format::R32Float.to_srgb(), Format::R32Float);
        assert_eq!(Format::B8G8R8A8Unorm.raw(), 87);
        assert_eq!(Format::from_raw(29), Format::R8G8B8A8UnormSrgb);
        assert_eq!(Format::from_raw(1), Format::Unknown);
    }

    #[test]
    fn test_full_mip_chain() {
        assert_eq!(full_mip_chain(1, 1), 1);
        assert_eq!(full_mip_chain(256, 256), 9);
        assert_eq!(full_mip_chain(300, 20), 9);

        let desc = ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 64, 32, 1, 0);
        assert_eq!(desc.mip_levels, 7);
        assert_eq!(desc.subresource_count(), 7);
    }
}
