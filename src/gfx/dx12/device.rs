//! D3D12 设备
//!
//! 初始化流程：
//!
//! 1. 启用调试层（仅 Debug 模式）
//! 2. 创建 DXGI 工厂
//! 3. 在默认适配器或 WARP 适配器上创建 D3D12 设备

use std::ffi::c_void;
use std::ptr::NonNull;

use tracing::info;
use windows::core::s;
use windows::Win32::Graphics::Direct3D::Fxc::{D3DCompile, D3DCOMPILE_DEBUG, D3DCOMPILE_SKIP_OPTIMIZATION};
use windows::Win32::Graphics::Direct3D::{ID3DBlob, D3D_FEATURE_LEVEL_11_0, D3D_ROOT_SIGNATURE_VERSION_1};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::core::error::{DaybreakError, GraphicsError, Result};
use crate::renderer::backend::{Device, TextureViewDesc};
use crate::renderer::command::CommandListType;
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorHeapType};
use crate::renderer::resource::{ClearValue, Format, HeapKind, ResourceDesc, ResourceStates};
use crate::renderer::root_signature::{
    RootParameter, RootSignatureDesc, SamplerAddressMode, SamplerFilter, ShaderVisibility, StaticSampler,
};

use super::command::{Dx12CommandList, Dx12Fence, Dx12Queue};
use super::resource::{Dx12DescriptorHeap, Dx12PipelineState, Dx12Resource, Dx12RootSignature};
use super::{convert, resource_error, Dx12Backend};

const GENERATE_MIPS_HLSL: &str = include_str!("shaders/generate_mips.hlsl");

fn device_error(what: &'static str) -> impl FnOnce(windows::core::Error) -> DaybreakError {
    move |e| DaybreakError::Graphics(GraphicsError::DeviceCreation(format!("{}: {:?}", what, e)))
}

/// 读取 blob 中的文本（编译或序列化的错误信息）
fn blob_text(blob: &ID3DBlob) -> String {
    // SAFETY: blob 的缓冲区在 blob 存活期间有效
    unsafe {
        let bytes = std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize());
        String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()
    }
}

/// D3D12 设备和 DXGI 工厂
pub struct Dx12Device {
    device: ID3D12Device,
    factory: IDXGIFactory4,
}

// SAFETY: ID3D12Device 和 IDXGIFactory 都是自由线程对象
unsafe impl Send for Dx12Device {}
unsafe impl Sync for Dx12Device {}

impl Dx12Device {
    /// 创建设备
    ///
    /// # 参数
    ///
    /// * `use_warp` - 使用 WARP 软件适配器
    pub fn new(use_warp: bool) -> Result<Self> {
        // SAFETY: 以下调用只传递本函数内有效的局部变量
        unsafe {
            #[cfg(debug_assertions)]
            {
                let mut debug: Option<ID3D12Debug> = None;
                match D3D12GetDebugInterface(&mut debug) {
                    Ok(()) => {
                        if let Some(debug) = debug {
                            debug.EnableDebugLayer();
                            tracing::debug!("DX12 debug layer enabled");
                        }
                    }
                    Err(e) => tracing::warn!(error = ?e, "Failed to enable DX12 debug layer"),
                }
            }

            let flags = if cfg!(debug_assertions) {
                DXGI_CREATE_FACTORY_DEBUG
            } else {
                DXGI_CREATE_FACTORY_FLAGS(0)
            };
            let factory: IDXGIFactory4 = CreateDXGIFactory2(flags).map_err(device_error("Failed to create DXGI factory"))?;

            let mut device: Option<ID3D12Device> = None;
            if use_warp {
                let adapter: IDXGIAdapter = factory
                    .EnumWarpAdapter()
                    .map_err(device_error("Failed to enumerate WARP adapter"))?;
                D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device)
            } else {
                D3D12CreateDevice(None, D3D_FEATURE_LEVEL_11_0, &mut device)
            }
            .map_err(device_error("Failed to create D3D12 device"))?;

            let device = device.ok_or_else(|| {
                DaybreakError::Graphics(GraphicsError::DeviceCreation("D3D12CreateDevice returned no device".to_string()))
            })?;

            info!(warp = use_warp, "D3D12 device created");

            Ok(Self { device, factory })
        }
    }

    pub fn raw(&self) -> &ID3D12Device {
        &self.device
    }

    pub(crate) fn factory(&self) -> &IDXGIFactory4 {
        &self.factory
    }
}

fn visibility(visibility: ShaderVisibility) -> D3D12_SHADER_VISIBILITY {
    D3D12_SHADER_VISIBILITY(visibility as i32)
}

fn static_sampler(sampler: &StaticSampler) -> D3D12_STATIC_SAMPLER_DESC {
    let filter = match sampler.filter {
        SamplerFilter::Point => D3D12_FILTER_MIN_MAG_MIP_POINT,
        SamplerFilter::Linear => D3D12_FILTER_MIN_MAG_MIP_LINEAR,
    };
    let address = match sampler.address_mode {
        SamplerAddressMode::Wrap => D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        SamplerAddressMode::Clamp => D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
    };
    D3D12_STATIC_SAMPLER_DESC {
        Filter: filter,
        AddressU: address,
        AddressV: address,
        AddressW: address,
        MipLODBias: 0.0,
        MaxAnisotropy: 1,
        ComparisonFunc: D3D12_COMPARISON_FUNC_NEVER,
        BorderColor: D3D12_STATIC_BORDER_COLOR_OPAQUE_BLACK,
        MinLOD: 0.0,
        MaxLOD: D3D12_FLOAT32_MAX,
        ShaderRegister: sampler.shader_register,
        RegisterSpace: 0,
        ShaderVisibility: visibility(sampler.visibility),
    }
}

fn root_descriptor(
    parameter_type: D3D12_ROOT_PARAMETER_TYPE,
    shader_register: u32,
    register_space: u32,
    shader_visibility: ShaderVisibility,
) -> D3D12_ROOT_PARAMETER {
    D3D12_ROOT_PARAMETER {
        ParameterType: parameter_type,
        Anonymous: D3D12_ROOT_PARAMETER_0 {
            Descriptor: D3D12_ROOT_DESCRIPTOR {
                ShaderRegister: shader_register,
                RegisterSpace: register_space,
            },
        },
        ShaderVisibility: visibility(shader_visibility),
    }
}

impl Device<Dx12Backend> for Dx12Device {
    fn create_descriptor_heap(
        &self,
        heap_type: DescriptorHeapType,
        num_descriptors: u32,
        shader_visible: bool,
    ) -> Result<Dx12DescriptorHeap> {
        let desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: convert::heap_type(heap_type),
            NumDescriptors: num_descriptors,
            Flags: if shader_visible {
                D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
            } else {
                D3D12_DESCRIPTOR_HEAP_FLAG_NONE
            },
            NodeMask: 0,
        };
        // SAFETY: desc 是有效的堆描述
        let heap: ID3D12DescriptorHeap = unsafe { self.device.CreateDescriptorHeap(&desc) }
            .map_err(resource_error("Failed to create descriptor heap"))?;
        Ok(Dx12DescriptorHeap::new(heap, heap_type, num_descriptors, shader_visible))
    }

    fn descriptor_increment_size(&self, heap_type: DescriptorHeapType) -> u32 {
        // SAFETY: 纯查询
        unsafe { self.device.GetDescriptorHandleIncrementSize(convert::heap_type(heap_type)) }
    }

    fn copy_descriptors(&self, dst: CpuDescriptorHandle, src: &[CpuDescriptorHandle], heap_type: DescriptorHeapType) {
        if src.is_empty() {
            return;
        }
        let dst_start = convert::cpu_handle(dst);
        let dst_size = src.len() as u32;
        let src_starts: Vec<D3D12_CPU_DESCRIPTOR_HANDLE> = src.iter().map(|h| convert::cpu_handle(*h)).collect();

        // SAFETY: 一个长度为 n 的目标区间，n 个长度为 1 的源区间
        unsafe {
            self.device.CopyDescriptors(
                1,
                &dst_start,
                Some(&dst_size as *const u32),
                dst_size,
                src_starts.as_ptr(),
                None,
                convert::heap_type(heap_type),
            );
        }
    }

    fn create_committed_resource(
        &self,
        desc: &ResourceDesc,
        heap: HeapKind,
        initial_state: ResourceStates,
        clear_value: Option<&ClearValue>,
    ) -> Result<Dx12Resource> {
        let heap_properties = convert::heap_properties(heap);
        let resource_desc = convert::resource_desc(desc);
        let clear_value = clear_value.map(convert::clear_value);

        let mut resource: Option<ID3D12Resource> = None;
        // SAFETY: 所有描述在调用期间有效
        unsafe {
            self.device.CreateCommittedResource(
                &heap_properties,
                D3D12_HEAP_FLAG_NONE,
                &resource_desc,
                convert::states(initial_state),
                clear_value.as_ref().map(|value| value as *const _),
                &mut resource,
            )
        }
        .map_err(resource_error("Failed to create committed resource"))?;

        resource.map(Dx12Resource::new).ok_or_else(|| {
            DaybreakError::Graphics(GraphicsError::ResourceCreation(
                "CreateCommittedResource returned no resource".to_string(),
            ))
        })
    }

    fn map(&self, resource: &Dx12Resource) -> Result<NonNull<u8>> {
        let mut data: *mut c_void = std::ptr::null_mut();
        // SAFETY: 上传堆资源可以持久映射，映射在资源释放时失效
        unsafe { resource.raw().Map(0, None, Some(&mut data)) }.map_err(resource_error("Failed to map resource"))?;
        NonNull::new(data as *mut u8).ok_or_else(|| {
            DaybreakError::Graphics(GraphicsError::ResourceCreation("Map returned a null pointer".to_string()))
        })
    }

    fn required_intermediate_size(&self, resource: &Dx12Resource, first_subresource: u32, num_subresources: u32) -> u64 {
        let mut total_bytes = 0u64;
        // SAFETY: 只查询布局，不访问资源内容
        unsafe {
            let desc = resource.raw().GetDesc();
            self.device.GetCopyableFootprints(
                &desc,
                first_subresource,
                num_subresources,
                0,
                None,
                None,
                None,
                Some(&mut total_bytes),
            );
        }
        total_bytes
    }

    fn create_root_signature(&self, desc: &RootSignatureDesc) -> Result<Dx12RootSignature> {
        // 区间数组必须在序列化之前一直存活
        let ranges: Vec<Vec<D3D12_DESCRIPTOR_RANGE>> = desc
            .parameters
            .iter()
            .map(|parameter| match parameter {
                RootParameter::DescriptorTable { ranges, .. } => ranges
                    .iter()
                    .map(|range| D3D12_DESCRIPTOR_RANGE {
                        RangeType: D3D12_DESCRIPTOR_RANGE_TYPE(range.range_type as i32),
                        NumDescriptors: range.num_descriptors,
                        BaseShaderRegister: range.base_shader_register,
                        RegisterSpace: range.register_space,
                        OffsetInDescriptorsFromTableStart: range.offset_in_descriptors_from_table_start,
                    })
                    .collect(),
                _ => Vec::new(),
            })
            .collect();

        let parameters: Vec<D3D12_ROOT_PARAMETER> = desc
            .parameters
            .iter()
            .zip(&ranges)
            .map(|(parameter, ranges)| match *parameter {
                RootParameter::DescriptorTable { visibility: v, .. } => D3D12_ROOT_PARAMETER {
                    ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
                    Anonymous: D3D12_ROOT_PARAMETER_0 {
                        DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                            NumDescriptorRanges: ranges.len() as u32,
                            pDescriptorRanges: ranges.as_ptr(),
                        },
                    },
                    ShaderVisibility: visibility(v),
                },
                RootParameter::Constants {
                    num_32bit_values,
                    shader_register,
                    register_space,
                    visibility: v,
                } => D3D12_ROOT_PARAMETER {
                    ParameterType: D3D12_ROOT_PARAMETER_TYPE_32BIT_CONSTANTS,
                    Anonymous: D3D12_ROOT_PARAMETER_0 {
                        Constants: D3D12_ROOT_CONSTANTS {
                            ShaderRegister: shader_register,
                            RegisterSpace: register_space,
                            Num32BitValues: num_32bit_values,
                        },
                    },
                    ShaderVisibility: visibility(v),
                },
                RootParameter::ConstantBufferView {
                    shader_register,
                    register_space,
                    visibility: v,
                } => root_descriptor(D3D12_ROOT_PARAMETER_TYPE_CBV, shader_register, register_space, v),
                RootParameter::ShaderResourceView {
                    shader_register,
                    register_space,
                    visibility: v,
                } => root_descriptor(D3D12_ROOT_PARAMETER_TYPE_SRV, shader_register, register_space, v),
                RootParameter::UnorderedAccessView {
                    shader_register,
                    register_space,
                    visibility: v,
                } => root_descriptor(D3D12_ROOT_PARAMETER_TYPE_UAV, shader_register, register_space, v),
            })
            .collect();

        let samplers: Vec<D3D12_STATIC_SAMPLER_DESC> = desc.static_samplers.iter().map(static_sampler).collect();

        let root_desc = D3D12_ROOT_SIGNATURE_DESC {
            NumParameters: parameters.len() as u32,
            pParameters: parameters.as_ptr(),
            NumStaticSamplers: samplers.len() as u32,
            pStaticSamplers: samplers.as_ptr(),
            Flags: D3D12_ROOT_SIGNATURE_FLAGS(desc.flags.bits() as i32),
        };

        // SAFETY: root_desc 引用的数组都在本函数内存活
        unsafe {
            let mut signature: Option<ID3DBlob> = None;
            let mut error: Option<ID3DBlob> = None;
            if let Err(e) =
                D3D12SerializeRootSignature(&root_desc, D3D_ROOT_SIGNATURE_VERSION_1, &mut signature, Some(&mut error))
            {
                let message = error.as_ref().map(blob_text).unwrap_or_default();
                return Err(DaybreakError::Graphics(GraphicsError::ResourceCreation(format!(
                    "Failed to serialize root signature: {:?} {}",
                    e, message
                ))));
            }
            let signature = signature.ok_or_else(|| {
                DaybreakError::Graphics(GraphicsError::ResourceCreation(
                    "Root signature serialization returned no blob".to_string(),
                ))
            })?;

            let root_signature: ID3D12RootSignature = self
                .device
                .CreateRootSignature(
                    0,
                    std::slice::from_raw_parts(signature.GetBufferPointer() as *const u8, signature.GetBufferSize()),
                )
                .map_err(resource_error("Failed to create root signature"))?;

            Ok(Dx12RootSignature(root_signature))
        }
    }

    fn create_generate_mips_pipeline(&self, root_signature: &Dx12RootSignature) -> Result<Dx12PipelineState> {
        let flags = if cfg!(debug_assertions) {
            D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
        } else {
            0
        };

        // SAFETY: 着色器源码是静态字符串，blob 在创建管线期间存活
        unsafe {
            let mut shader: Option<ID3DBlob> = None;
            let mut error: Option<ID3DBlob> = None;
            if let Err(e) = D3DCompile(
                GENERATE_MIPS_HLSL.as_ptr() as *const c_void,
                GENERATE_MIPS_HLSL.len(),
                s!("generate_mips.hlsl"),
                None,
                None,
                s!("main"),
                s!("cs_5_0"),
                flags,
                0,
                &mut shader,
                Some(&mut error),
            ) {
                let message = error.as_ref().map(blob_text).unwrap_or_default();
                return Err(DaybreakError::Graphics(GraphicsError::ShaderCompilation(format!(
                    "generate_mips.hlsl: {:?} {}",
                    e, message
                ))));
            }
            let shader = shader.ok_or_else(|| {
                DaybreakError::Graphics(GraphicsError::ShaderCompilation(
                    "generate_mips.hlsl: compiler returned no bytecode".to_string(),
                ))
            })?;

            let desc = D3D12_COMPUTE_PIPELINE_STATE_DESC {
                pRootSignature: std::mem::transmute_copy(&root_signature.0),
                CS: D3D12_SHADER_BYTECODE {
                    pShaderBytecode: shader.GetBufferPointer(),
                    BytecodeLength: shader.GetBufferSize(),
                },
                ..Default::default()
            };
            let pipeline_state: ID3D12PipelineState = self
                .device
                .CreateComputePipelineState(&desc)
                .map_err(resource_error("Failed to create generate mips pipeline"))?;

            Ok(Dx12PipelineState(pipeline_state))
        }
    }

    fn create_command_list(&self, list_type: CommandListType) -> Result<Dx12CommandList> {
        Dx12CommandList::new(&self.device, list_type)
    }

    fn create_command_queue(&self, list_type: CommandListType) -> Result<Dx12Queue> {
        Dx12Queue::new(&self.device, list_type)
    }

    fn create_fence(&self, initial_value: u64) -> Result<Dx12Fence> {
        Dx12Fence::new(&self.device, initial_value)
    }

    fn create_shader_resource_view(
        &self,
        resource: Option<&Dx12Resource>,
        desc: Option<&TextureViewDesc>,
        dst: CpuDescriptorHandle,
    ) {
        let view = desc.map(|desc| D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: convert::format(desc.format),
            ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_SRV {
                    MostDetailedMip: desc.most_detailed_mip,
                    MipLevels: desc.mip_levels,
                    PlaneSlice: 0,
                    ResourceMinLODClamp: 0.0,
                },
            },
        });
        // SAFETY: dst 指向一个已分配的 CPU 描述符
        unsafe {
            self.device.CreateShaderResourceView(
                resource.map(|resource| resource.raw()),
                view.as_ref().map(|view| view as *const _),
                convert::cpu_handle(dst),
            );
        }
    }

    fn create_unordered_access_view(
        &self,
        resource: Option<&Dx12Resource>,
        desc: Option<&TextureViewDesc>,
        dst: CpuDescriptorHandle,
    ) {
        let view = desc.map(|desc| D3D12_UNORDERED_ACCESS_VIEW_DESC {
            Format: convert::format(desc.format),
            ViewDimension: D3D12_UAV_DIMENSION_TEXTURE2D,
            Anonymous: D3D12_UNORDERED_ACCESS_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_UAV {
                    MipSlice: desc.most_detailed_mip,
                    PlaneSlice: 0,
                },
            },
        });
        // SAFETY: dst 指向一个已分配的 CPU 描述符
        unsafe {
            self.device.CreateUnorderedAccessView(
                resource.map(|resource| resource.raw()),
                None::<&ID3D12Resource>,
                view.as_ref().map(|view| view as *const _),
                convert::cpu_handle(dst),
            );
        }
    }

    fn create_render_target_view(&self, resource: &Dx12Resource, dst: CpuDescriptorHandle) {
        // SAFETY: dst 指向一个已分配的 RTV 描述符
        unsafe {
            self.device
                .CreateRenderTargetView(resource.raw(), None, convert::cpu_handle(dst));
        }
    }

    fn create_depth_stencil_view(&self, resource: &Dx12Resource, dst: CpuDescriptorHandle) {
        // SAFETY: dst 指向一个已分配的 DSV 描述符
        unsafe {
            self.device
                .CreateDepthStencilView(resource.raw(), None, convert::cpu_handle(dst));
        }
    }

    fn multisample_quality_levels(&self, format: Format, max_samples: u32) -> (u32, u32) {
        let mut result = (1, 0);
        let mut sample_count = 1;

        while sample_count <= max_samples {
            let mut levels = D3D12_FEATURE_DATA_MULTISAMPLE_QUALITY_LEVELS {
                Format: convert::format(format),
                SampleCount: sample_count,
                Flags: D3D12_MULTISAMPLE_QUALITY_LEVELS_FLAG_NONE,
                NumQualityLevels: 0,
            };
            // SAFETY: levels 的大小与特性类型匹配
            let supported = unsafe {
                self.device.CheckFeatureSupport(
                    D3D12_FEATURE_MULTISAMPLE_QUALITY_LEVELS,
                    &mut levels as *mut _ as *mut c_void,
                    std::mem::size_of_val(&levels) as u32,
                )
            }
            .is_ok();

            if !supported || levels.NumQualityLevels == 0 {
                break;
            }
            result = (sample_count, levels.NumQualityLevels - 1);
            sample_count *= 2;
        }

        result
    }
}
