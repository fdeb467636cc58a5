//! 顶点/索引缓冲区
//!
//! 数据上传由 `CommandList::copy_vertex_buffer` / `copy_index_buffer` 完成，
//! 这里只保存资源和对应的视图。

use bytemuck::Pod;

use crate::renderer::backend::{Backend, GpuResource};
use crate::renderer::resource::{Format, IndexBufferView, VertexBufferView};
use crate::renderer::state_tracker::GlobalStateRegistration;

/// 能被命令列表跟踪和转换状态的对象
pub trait AsResource<B: Backend> {
    /// 底层资源，尚未创建时为 `None`
    fn as_resource(&self) -> Option<&B::Resource>;
}

/// 索引元素类型
pub trait IndexElement: Pod {
    const FORMAT: Format;
}

impl IndexElement for u16 {
    const FORMAT: Format = Format::R16Uint;
}

impl IndexElement for u32 {
    const FORMAT: Format = Format::R32Uint;
}

/// 顶点缓冲区
pub struct VertexBuffer<B: Backend> {
    resource: Option<B::Resource>,
    registration: Option<GlobalStateRegistration>,
    view: VertexBufferView,
    num_vertices: u32,
    stride: u32,
    name: String,
}

impl<B: Backend> VertexBuffer<B> {
    pub fn new(name: &str) -> Self {
        Self {
            resource: None,
            registration: None,
            view: VertexBufferView::default(),
            num_vertices: 0,
            stride: 0,
            name: name.to_string(),
        }
    }

    /// 替换资源并重建视图，旧资源的全局状态记录随之移除
    pub fn set_resource(&mut self, resource: Option<B::Resource>, num_vertices: u32, stride: u32) {
        self.registration = None;
        self.num_vertices = num_vertices;
        self.stride = stride;
        self.view = match &resource {
            Some(resource) => {
                resource.set_name(&self.name);
                VertexBufferView {
                    buffer_location: resource.gpu_virtual_address(),
                    size_in_bytes: num_vertices * stride,
                    stride_in_bytes: stride,
                }
            }
            None => VertexBufferView::default(),
        };
        self.resource = resource;
    }

    pub fn view(&self) -> &VertexBufferView {
        &self.view
    }

    pub fn num_vertices(&self) -> u32 {
        self.num_vertices
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// 接管当前资源在全局状态表中的记录
    pub(crate) fn adopt_registration(&mut self, registration: GlobalStateRegistration) {
        self.registration = Some(registration);
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<B: Backend> AsResource<B> for VertexBuffer<B> {
    fn as_resource(&self) -> Option<&B::Resource> {
        self.resource.as_ref()
    }
}

/// 索引缓冲区
pub struct IndexBuffer<B: Backend> {
    resource: Option<B::Resource>,
    registration: Option<GlobalStateRegistration>,
    view: IndexBufferView,
    num_indices: u32,
    name: String,
}

impl<B: Backend> IndexBuffer<B> {
    pub fn new(name: &str) -> Self {
        Self {
            resource: None,
            registration: None,
            view: IndexBufferView::default(),
            num_indices: 0,
            name: name.to_string(),
        }
    }

    /// 替换资源并重建视图，旧资源的全局状态记录随之移除
    pub fn set_resource(&mut self, resource: Option<B::Resource>, num_indices: u32, format: Format) {
        self.registration = None;
        self.num_indices = num_indices;
        self.view = match &resource {
            Some(resource) => {
                resource.set_name(&self.name);
                let element_size = if format == Format::R16Uint { 2 } else { 4 };
                IndexBufferView {
                    buffer_location: resource.gpu_virtual_address(),
                    size_in_bytes: num_indices * element_size,
                    format,
                }
            }
            None => IndexBufferView::default(),
        };
        self.resource = resource;
    }

    pub fn view(&self) -> &IndexBufferView {
        &self.view
    }

    pub fn num_indices(&self) -> u32 {
        self.num_indices
    }

    pub fn format(&self) -> Format {
        self.view.format
    }

    /// 接管当前资源在全局状态表中的记录
    pub(crate) fn adopt_registration(&mut self, registration: GlobalStateRegistration) {
        self.registration = Some(registration);
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<B: Backend> AsResource<B> for IndexBuffer<B> {
    fn as_resource(&self) -> Option<&B::Resource> {
        self.resource.as_ref()
    }
}
