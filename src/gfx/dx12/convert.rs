//! 核心类型与 D3D12 结构之间的转换
//!
//! 格式、资源状态、堆类型等枚举的判别值与 D3D12 相同，直接按数值转换。

use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D::D3D_PRIMITIVE_TOPOLOGY;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::renderer::command::CommandListType;
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorHeapType, GpuDescriptorHandle};
use crate::renderer::resource::{
    ClearValue, Format, HeapKind, IndexBufferView, PrimitiveTopology, ResourceDesc, ResourceDimension,
    ResourceFlags, ResourceStates, ScissorRect, VertexBufferView, Viewport,
};

pub fn format(format: Format) -> DXGI_FORMAT {
    DXGI_FORMAT(format.raw() as i32)
}

pub fn states(states: ResourceStates) -> D3D12_RESOURCE_STATES {
    D3D12_RESOURCE_STATES(states.bits() as i32)
}

pub fn heap_type(heap_type: DescriptorHeapType) -> D3D12_DESCRIPTOR_HEAP_TYPE {
    D3D12_DESCRIPTOR_HEAP_TYPE(heap_type as i32)
}

pub fn list_type(list_type: CommandListType) -> D3D12_COMMAND_LIST_TYPE {
    D3D12_COMMAND_LIST_TYPE(list_type as i32)
}

pub fn heap_properties(heap: HeapKind) -> D3D12_HEAP_PROPERTIES {
    let heap_type = match heap {
        HeapKind::Default => D3D12_HEAP_TYPE_DEFAULT,
        HeapKind::Upload => D3D12_HEAP_TYPE_UPLOAD,
        HeapKind::Readback => D3D12_HEAP_TYPE_READBACK,
    };
    D3D12_HEAP_PROPERTIES {
        Type: heap_type,
        CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
        MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
        CreationNodeMask: 1,
        VisibleNodeMask: 1,
    }
}

pub fn resource_desc(desc: &ResourceDesc) -> D3D12_RESOURCE_DESC {
    let (dimension, layout) = match desc.dimension {
        ResourceDimension::Buffer => (D3D12_RESOURCE_DIMENSION_BUFFER, D3D12_TEXTURE_LAYOUT_ROW_MAJOR),
        ResourceDimension::Texture1D => (D3D12_RESOURCE_DIMENSION_TEXTURE1D, D3D12_TEXTURE_LAYOUT_UNKNOWN),
        ResourceDimension::Texture2D => (D3D12_RESOURCE_DIMENSION_TEXTURE2D, D3D12_TEXTURE_LAYOUT_UNKNOWN),
        ResourceDimension::Texture3D => (D3D12_RESOURCE_DIMENSION_TEXTURE3D, D3D12_TEXTURE_LAYOUT_UNKNOWN),
    };
    D3D12_RESOURCE_DESC {
        Dimension: dimension,
        Alignment: 0,
        Width: desc.width,
        Height: desc.height,
        DepthOrArraySize: desc.depth_or_array_size,
        MipLevels: desc.mip_levels,
        Format: format(desc.format),
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: desc.sample_count,
            Quality: desc.sample_quality,
        },
        Layout: layout,
        Flags: D3D12_RESOURCE_FLAGS(desc.flags.bits() as i32),
    }
}

pub fn from_resource_desc(desc: &D3D12_RESOURCE_DESC) -> ResourceDesc {
    let dimension = match desc.Dimension {
        D3D12_RESOURCE_DIMENSION_TEXTURE1D => ResourceDimension::Texture1D,
        D3D12_RESOURCE_DIMENSION_TEXTURE2D => ResourceDimension::Texture2D,
        D3D12_RESOURCE_DIMENSION_TEXTURE3D => ResourceDimension::Texture3D,
        _ => ResourceDimension::Buffer,
    };
    let flags = ResourceFlags::from_bits_truncate(desc.Flags.0 as u32);
    ResourceDesc {
        dimension,
        width: desc.Width,
        height: desc.Height,
        depth_or_array_size: desc.DepthOrArraySize,
        mip_levels: desc.MipLevels,
        format: Format::from_raw(desc.Format.0 as u32),
        sample_count: desc.SampleDesc.Count,
        sample_quality: desc.SampleDesc.Quality,
        flags,
    }
}

pub fn clear_value(value: &ClearValue) -> D3D12_CLEAR_VALUE {
    match *value {
        ClearValue::Color { format: f, color } => D3D12_CLEAR_VALUE {
            Format: format(f),
            Anonymous: D3D12_CLEAR_VALUE_0 { Color: color },
        },
        ClearValue::DepthStencil {
            format: f,
            depth,
            stencil,
        } => D3D12_CLEAR_VALUE {
            Format: format(f),
            Anonymous: D3D12_CLEAR_VALUE_0 {
                DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                    Depth: depth,
                    Stencil: stencil,
                },
            },
        },
    }
}

pub fn cpu_handle(handle: CpuDescriptorHandle) -> D3D12_CPU_DESCRIPTOR_HANDLE {
    D3D12_CPU_DESCRIPTOR_HANDLE { ptr: handle.ptr }
}

pub fn gpu_handle(handle: GpuDescriptorHandle) -> D3D12_GPU_DESCRIPTOR_HANDLE {
    D3D12_GPU_DESCRIPTOR_HANDLE { ptr: handle.ptr }
}

pub fn viewport(viewport: &Viewport) -> D3D12_VIEWPORT {
    D3D12_VIEWPORT {
        TopLeftX: viewport.top_left_x,
        TopLeftY: viewport.top_left_y,
        Width: viewport.width,
        Height: viewport.height,
        MinDepth: viewport.min_depth,
        MaxDepth: viewport.max_depth,
    }
}

pub fn rect(rect: &ScissorRect) -> RECT {
    RECT {
        left: rect.left,
        top: rect.top,
        right: rect.right,
        bottom: rect.bottom,
    }
}

pub fn topology(topology: PrimitiveTopology) -> D3D_PRIMITIVE_TOPOLOGY {
    D3D_PRIMITIVE_TOPOLOGY(topology as i32)
}

pub fn vertex_buffer_view(view: &VertexBufferView) -> D3D12_VERTEX_BUFFER_VIEW {
    D3D12_VERTEX_BUFFER_VIEW {
        BufferLocation: view.buffer_location,
        SizeInBytes: view.size_in_bytes,
        StrideInBytes: view.stride_in_bytes,
    }
}

pub fn index_buffer_view(view: &IndexBufferView) -> D3D12_INDEX_BUFFER_VIEW {
    D3D12_INDEX_BUFFER_VIEW {
        BufferLocation: view.buffer_location,
        SizeInBytes: view.size_in_bytes,
        Format: format(view.format),
    }
}
