//! Mip 生成
//!
//! 计算着色器每一轮从一个源 mip 生成最多 4 级 mip，线程组大小 8×8。
//! 本模块提供根签名布局、常量缓冲区、每轮的划分以及管线对象，
//! 命令的录制在 `CommandList::generate_mips` 中完成。

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use tracing::info;

use crate::core::error::Result;
use crate::renderer::backend::{Backend, Device, TextureViewDesc};
use crate::renderer::context::GpuContext;
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorAllocation, DescriptorHeapType};
use crate::renderer::resource::Format;
use crate::renderer::root_signature::{
    DescriptorRange, DescriptorRangeType, RootParameter, RootSignature, RootSignatureDesc, SamplerAddressMode,
    SamplerFilter, ShaderVisibility, StaticSampler,
};

/// 根参数下标
pub mod root_index {
    /// 6 个 32 位常量
    pub const GENERATE_MIPS_CB: u32 = 0;
    /// 源 mip 的 SRV 表
    pub const SRC_MIP: u32 = 1;
    /// 4 个目标 mip 的 UAV 表
    pub const OUT_MIP: u32 = 2;
}

/// 每轮最多生成的 mip 数量
pub const MAX_MIPS_PER_PASS: u32 = 4;

/// 线程组边长
pub const THREAD_GROUP_SIZE: u32 = 8;

/// 着色器常量缓冲区，布局与 HLSL 中的 `GenerateMipsCB` 一致
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GenerateMipsConstants {
    pub src_mip_level: u32,
    pub num_mip_levels: u32,
    /// 源尺寸奇偶：bit0 宽为奇数，bit1 高为奇数
    pub src_dimension: u32,
    pub is_srgb: u32,
    pub texel_size: [f32; 2],
}

/// 一轮 mip 生成
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipPass {
    pub src_mip: u32,
    pub num_mips: u32,
    pub src_dimension: u32,
    /// 第一个目标 mip 的宽度（至少为 1）
    pub dst_width: u32,
    pub dst_height: u32,
}

impl MipPass {
    /// 调度的线程组数量
    pub fn thread_groups(&self) -> (u32, u32) {
        (
            self.dst_width.div_ceil(THREAD_GROUP_SIZE),
            self.dst_height.div_ceil(THREAD_GROUP_SIZE),
        )
    }

    pub fn constants(&self, is_srgb: bool) -> GenerateMipsConstants {
        GenerateMipsConstants {
            src_mip_level: self.src_mip,
            num_mip_levels: self.num_mips,
            src_dimension: self.src_dimension,
            is_srgb: is_srgb as u32,
            texel_size: [1.0 / self.dst_width as f32, 1.0 / self.dst_height as f32],
        }
    }
}

/// 把 mip 1..mip_levels 的生成划分成若干轮
///
/// 一轮能生成的级数取决于第一个目标尺寸能被 2 整除的次数，
/// 保证每个线程在后续级别上仍然对应整数个源纹素。
pub fn plan_mip_passes(width: u64, height: u32, mip_levels: u32) -> Vec<MipPass> {
    let mut passes = Vec::new();
    let mut src_mip = 0;

    while src_mip + 1 < mip_levels {
        let src_width = (width >> src_mip) as u32;
        let src_height = height >> src_mip;
        let dst_width = src_width >> 1;
        let dst_height = src_height >> 1;

        let src_dimension = ((src_height & 1) << 1) | (src_width & 1);

        // 某一维已经是 1 时只看另一维
        let bits = (if dst_width == 1 { dst_height } else { dst_width })
            | (if dst_height == 1 { dst_width } else { dst_height });
        let num_mips = (bits.trailing_zeros() + 1)
            .min(MAX_MIPS_PER_PASS)
            .min(mip_levels - src_mip - 1);

        passes.push(MipPass {
            src_mip,
            num_mips,
            src_dimension,
            dst_width: dst_width.max(1),
            dst_height: dst_height.max(1),
        });

        src_mip += num_mips;
    }

    passes
}

/// 根签名：常量、SRV 表、UAV 表，以及 s0 上的线性 clamp 采样器
pub fn root_signature_desc() -> RootSignatureDesc {
    RootSignatureDesc {
        parameters: vec![
            RootParameter::Constants {
                num_32bit_values: (std::mem::size_of::<GenerateMipsConstants>() / 4) as u32,
                shader_register: 0,
                register_space: 0,
                visibility: ShaderVisibility::All,
            },
            RootParameter::DescriptorTable {
                ranges: vec![DescriptorRange::new(DescriptorRangeType::Srv, 1, 0)],
                visibility: ShaderVisibility::All,
            },
            RootParameter::DescriptorTable {
                ranges: vec![DescriptorRange::new(DescriptorRangeType::Uav, MAX_MIPS_PER_PASS, 0)],
                visibility: ShaderVisibility::All,
            },
        ],
        static_samplers: vec![StaticSampler {
            shader_register: 0,
            filter: SamplerFilter::Linear,
            address_mode: SamplerAddressMode::Clamp,
            visibility: ShaderVisibility::All,
        }],
        ..Default::default()
    }
}

/// mip 生成管线
///
/// 除根签名和管线外还持有 4 个空 UAV，一轮不足 4 级时用来填满 UAV 表。
pub struct GenerateMipsPipeline<B: Backend> {
    root_signature: Arc<RootSignature<B>>,
    pipeline_state: B::PipelineState,
    default_uav: DescriptorAllocation<B>,
}

impl<B: Backend> GenerateMipsPipeline<B> {
    pub fn new(context: &GpuContext<B>) -> Result<Self> {
        let device = context.device();
        let root_signature = Arc::new(RootSignature::new(device, root_signature_desc())?);
        let pipeline_state = device.create_generate_mips_pipeline(root_signature.native())?;

        let default_uav = context.allocate_descriptors(DescriptorHeapType::CbvSrvUav, MAX_MIPS_PER_PASS)?;
        for mip in 0..MAX_MIPS_PER_PASS {
            let desc = TextureViewDesc {
                format: Format::R8G8B8A8Unorm,
                most_detailed_mip: mip,
                mip_levels: 1,
            };
            device.create_unordered_access_view(None, Some(&desc), default_uav.descriptor_handle(mip));
        }

        info!("Generate mips pipeline created");

        Ok(Self {
            root_signature,
            pipeline_state,
            default_uav,
        })
    }

    pub fn root_signature(&self) -> &Arc<RootSignature<B>> {
        &self.root_signature
    }

    pub fn pipeline_state(&self) -> &B::PipelineState {
        &self.pipeline_state
    }

    /// 第 `offset` 个空 UAV
    pub fn default_uav(&self, offset: u32) -> CpuDescriptorHandle {
        self.default_uav.descriptor_handle(offset)
    }
}
