//! 根签名
//!
//! 与后端无关的根签名描述，以及创建后缓存的描述符表信息：
//! 每个根参数是否为描述符表、表属于哪种堆、表中共有多少个描述符。
//! 动态描述符堆依赖这些信息布局自己的 CPU 缓存。

use bitflags::bitflags;

use crate::core::error::Result;
use crate::renderer::backend::{Backend, Device};
use crate::renderer::descriptor::DescriptorHeapType;

/// 根签名最多支持的描述符表数量
pub const MAX_ROOT_PARAMETERS: usize = 32;

/// 在描述符表中紧接上一个区间
pub const DESCRIPTOR_RANGE_OFFSET_APPEND: u32 = 0xFFFF_FFFF;

/// 描述符区间类型（判别值与 `D3D12_DESCRIPTOR_RANGE_TYPE` 相同）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorRangeType {
    Srv = 0,
    Uav = 1,
    Cbv = 2,
    Sampler = 3,
}

impl DescriptorRangeType {
    /// 该区间的描述符所在的堆类型
    pub fn heap_type(&self) -> DescriptorHeapType {
        match self {
            DescriptorRangeType::Sampler => DescriptorHeapType::Sampler,
            _ => DescriptorHeapType::CbvSrvUav,
        }
    }
}

/// 描述符表中的一个区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRange {
    pub range_type: DescriptorRangeType,
    pub num_descriptors: u32,
    pub base_shader_register: u32,
    pub register_space: u32,
    pub offset_in_descriptors_from_table_start: u32,
}

impl DescriptorRange {
    /// 紧接上一个区间的描述符区间
    pub fn new(range_type: DescriptorRangeType, num_descriptors: u32, base_shader_register: u32) -> Self {
        Self {
            range_type,
            num_descriptors,
            base_shader_register,
            register_space: 0,
            offset_in_descriptors_from_table_start: DESCRIPTOR_RANGE_OFFSET_APPEND,
        }
    }
}

/// 着色器可见性（判别值与 `D3D12_SHADER_VISIBILITY` 相同）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderVisibility {
    #[default]
    All = 0,
    Vertex = 1,
    Hull = 2,
    Domain = 3,
    Geometry = 4,
    Pixel = 5,
}

/// 根参数
#[derive(Debug, Clone, PartialEq)]
pub enum RootParameter {
    DescriptorTable {
        ranges: Vec<DescriptorRange>,
        visibility: ShaderVisibility,
    },
    Constants {
        num_32bit_values: u32,
        shader_register: u32,
        register_space: u32,
        visibility: ShaderVisibility,
    },
    ConstantBufferView {
        shader_register: u32,
        register_space: u32,
        visibility: ShaderVisibility,
    },
    ShaderResourceView {
        shader_register: u32,
        register_space: u32,
        visibility: ShaderVisibility,
    },
    UnorderedAccessView {
        shader_register: u32,
        register_space: u32,
        visibility: ShaderVisibility,
    },
}

/// 静态采样器的过滤方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerFilter {
    Point,
    Linear,
}

/// 静态采样器的寻址方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerAddressMode {
    Wrap,
    Clamp,
}

/// 静态采样器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSampler {
    pub shader_register: u32,
    pub filter: SamplerFilter,
    pub address_mode: SamplerAddressMode,
    pub visibility: ShaderVisibility,
}

bitflags! {
    /// 根签名标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RootSignatureFlags: u32 {
        const NONE = 0;
        const ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT = 0x1;
        const DENY_VERTEX_SHADER_ROOT_ACCESS = 0x2;
        const DENY_HULL_SHADER_ROOT_ACCESS = 0x4;
        const DENY_DOMAIN_SHADER_ROOT_ACCESS = 0x8;
        const DENY_GEOMETRY_SHADER_ROOT_ACCESS = 0x10;
        const DENY_PIXEL_SHADER_ROOT_ACCESS = 0x20;
    }
}

/// 根签名描述
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RootSignatureDesc {
    pub parameters: Vec<RootParameter>,
    pub static_samplers: Vec<StaticSampler>,
    pub flags: RootSignatureFlags,
}

/// 从描述中统计出的描述符表布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorTableLayout {
    /// CBV/SRV/UAV 描述符表的根索引位掩码
    pub descriptor_table_bit_mask: u32,
    /// 采样器描述符表的根索引位掩码
    pub sampler_table_bit_mask: u32,
    /// 每个根索引处描述符表的描述符总数
    pub num_descriptors_per_table: [u32; MAX_ROOT_PARAMETERS],
}

impl DescriptorTableLayout {
    /// 统计描述符表
    ///
    /// 表的堆类型由第一个区间决定，描述符数量是所有区间之和。
    pub fn from_desc(desc: &RootSignatureDesc) -> Self {
        let mut layout = Self {
            descriptor_table_bit_mask: 0,
            sampler_table_bit_mask: 0,
            num_descriptors_per_table: [0; MAX_ROOT_PARAMETERS],
        };

        for (index, parameter) in desc.parameters.iter().enumerate().take(MAX_ROOT_PARAMETERS) {
            if let RootParameter::DescriptorTable { ranges, .. } = parameter {
                if let Some(first) = ranges.first() {
                    match first.range_type.heap_type() {
                        DescriptorHeapType::Sampler => layout.sampler_table_bit_mask |= 1 << index,
                        _ => layout.descriptor_table_bit_mask |= 1 << index,
                    }
                }
                layout.num_descriptors_per_table[index] = ranges.iter().map(|r| r.num_descriptors).sum();
            }
        }

        layout
    }
}

/// 根签名
///
/// 原生根签名加上缓存的描述符表布局。
pub struct RootSignature<B: Backend> {
    native: B::RootSignature,
    desc: RootSignatureDesc,
    layout: DescriptorTableLayout,
}

impl<B: Backend> RootSignature<B> {
    /// 序列化描述并创建原生根签名
    pub fn new(device: &B::Device, desc: RootSignatureDesc) -> Result<Self> {
        let native = device.create_root_signature(&desc)?;
        let layout = DescriptorTableLayout::from_desc(&desc);

        #[cfg(debug_assertions)]
        tracing::debug!(
            parameters = desc.parameters.len(),
            descriptor_tables = layout.descriptor_table_bit_mask,
            sampler_tables = layout.sampler_table_bit_mask,
            "Root signature created"
        );

        Ok(Self { native, desc, layout })
    }

    pub fn native(&self) -> &B::RootSignature {
        &self.native
    }

    pub fn desc(&self) -> &RootSignatureDesc {
        &self.desc
    }

    /// 指定堆类型的描述符表位掩码，RTV/DSV 恒为 0
    pub fn descriptor_table_bit_mask(&self, heap_type: DescriptorHeapType) -> u32 {
        match heap_type {
            DescriptorHeapType::CbvSrvUav => self.layout.descriptor_table_bit_mask,
            DescriptorHeapType::Sampler => self.layout.sampler_table_bit_mask,
            _ => 0,
        }
    }

    /// 根索引处描述符表的描述符数量
    pub fn num_descriptors(&self, root_index: u32) -> u32 {
        debug_assert!((root_index as usize) < MAX_ROOT_PARAMETERS);
        self.layout
            .num_descriptors_per_table
            .get(root_index as usize)
            .copied()
            .unwrap_or(0)
    }
}
