//! 纹理
//!
//! 包装一个 GPU 纹理资源及其视图。RTV/DSV 在资源变化时按资源标志创建，
//! SRV/UAV 按视图描述缓存，第一次请求时才分配描述符。
//!
//! # 设计原则
//!
//! - **资源与视图分离**：资源可以替换（加载、`resize`），视图随之重建
//! - **按需创建**：SRV/UAV 只在第一次使用时创建，之后从缓存返回
//! - **延迟释放**：旧视图的描述符在当前帧完成后才会被复用

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::Result;
use crate::renderer::backend::{Backend, Device, GpuResource, TextureViewDesc};
use crate::renderer::buffer::AsResource;
use crate::renderer::context::GpuContext;
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorAllocation, DescriptorHeapType};
use crate::renderer::resource::{ClearValue, HeapKind, ResourceDesc, ResourceFlags, ResourceStates};
use crate::renderer::state_tracker::GlobalStateRegistration;

/// 纹理用途
///
/// 决定加载时使用的格式，`Albedo` 使用 sRGB 格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureUsage {
    #[default]
    Albedo,
    HeightMap,
    NormalMap,
    RenderTarget,
}

impl TextureUsage {
    pub const DIFFUSE: Self = Self::Albedo;
    pub const DEPTH: Self = Self::HeightMap;
}

type ViewCache<B> = Mutex<HashMap<Option<TextureViewDesc>, DescriptorAllocation<B>>>;

fn lock_views<B: Backend>(
    views: &ViewCache<B>,
) -> MutexGuard<'_, HashMap<Option<TextureViewDesc>, DescriptorAllocation<B>>> {
    views.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 纹理
pub struct Texture<B: Backend> {
    context: Arc<GpuContext<B>>,
    resource: Option<B::Resource>,
    /// 由本纹理创建的资源在全局状态表中的记录
    registration: Option<GlobalStateRegistration>,
    clear_value: Option<ClearValue>,
    usage: TextureUsage,
    name: String,

    render_target_view: DescriptorAllocation<B>,
    depth_stencil_view: DescriptorAllocation<B>,
    shader_resource_views: ViewCache<B>,
    unordered_access_views: ViewCache<B>,
}

impl<B: Backend> Texture<B> {
    /// 没有资源的空纹理
    pub fn empty(context: &Arc<GpuContext<B>>, usage: TextureUsage, name: &str) -> Self {
        Self {
            context: Arc::clone(context),
            resource: None,
            registration: None,
            clear_value: None,
            usage,
            name: name.to_string(),
            render_target_view: DescriptorAllocation::null(),
            depth_stencil_view: DescriptorAllocation::null(),
            shader_resource_views: Mutex::new(HashMap::new()),
            unordered_access_views: Mutex::new(HashMap::new()),
        }
    }

    /// 在默认堆上创建纹理，初始状态 COMMON 并登记到全局状态表
    ///
    /// 纹理丢弃、`reset` 或替换资源时记录随之移除。
    ///
    /// # 参数
    ///
    /// * `context` - GPU 上下文
    /// * `desc` - 资源描述
    /// * `clear_value` - 优化清除值（渲染目标和深度模板）
    /// * `usage` - 纹理用途
    /// * `name` - 调试名称
    pub fn new(
        context: &Arc<GpuContext<B>>,
        desc: ResourceDesc,
        clear_value: Option<ClearValue>,
        usage: TextureUsage,
        name: &str,
    ) -> Result<Self> {
        let resource = context.device().create_committed_resource(
            &desc,
            HeapKind::Default,
            ResourceStates::COMMON,
            clear_value.as_ref(),
        )?;
        let registration = context.register_resource_state(&resource, ResourceStates::COMMON);

        let mut texture = Self::empty(context, usage, name);
        texture.set_resource(resource, clear_value)?;
        texture.registration = Some(registration);
        Ok(texture)
    }

    /// 包装已有资源，不登记全局状态
    pub fn from_resource(
        context: &Arc<GpuContext<B>>,
        resource: B::Resource,
        usage: TextureUsage,
        name: &str,
    ) -> Result<Self> {
        let mut texture = Self::empty(context, usage, name);
        texture.set_resource(resource, None)?;
        Ok(texture)
    }

    /// 替换资源并重建视图，旧资源的全局状态记录随之移除
    pub fn set_resource(&mut self, resource: B::Resource, clear_value: Option<ClearValue>) -> Result<()> {
        self.registration = None;
        resource.set_name(&self.name);
        self.resource = Some(resource);
        self.clear_value = clear_value;
        self.create_views()
    }

    /// 按资源标志重建 RTV/DSV，清空 SRV/UAV 缓存
    pub fn create_views(&mut self) -> Result<()> {
        self.shader_resource_views
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.unordered_access_views
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.render_target_view = DescriptorAllocation::null();
        self.depth_stencil_view = DescriptorAllocation::null();

        let Some(resource) = self.resource.as_ref() else {
            return Ok(());
        };
        let flags = resource.desc().flags;

        if flags.contains(ResourceFlags::ALLOW_RENDER_TARGET) {
            let rtv = self.context.allocate_descriptors(DescriptorHeapType::Rtv, 1)?;
            self.context
                .device()
                .create_render_target_view(resource, rtv.descriptor_handle(0));
            self.render_target_view = rtv;
        }

        if flags.contains(ResourceFlags::ALLOW_DEPTH_STENCIL) {
            let dsv = self.context.allocate_descriptors(DescriptorHeapType::Dsv, 1)?;
            self.context
                .device()
                .create_depth_stencil_view(resource, dsv.descriptor_handle(0));
            self.depth_stencil_view = dsv;
        }

        Ok(())
    }

    /// 按新尺寸重建资源
    ///
    /// 旧资源的记录被移除，新资源以 COMMON 登记。没有资源时什么都不做。
    pub fn resize(&mut self, width: u32, height: u32, depth_or_array_size: u16) -> Result<()> {
        let Some(old) = self.resource.take() else {
            return Ok(());
        };
        self.registration = None;

        let mut desc = old.desc();
        desc.width = width.max(1) as u64;
        desc.height = height.max(1);
        desc.depth_or_array_size = depth_or_array_size.max(1);

        let resource = self.context.device().create_committed_resource(
            &desc,
            HeapKind::Default,
            ResourceStates::COMMON,
            self.clear_value.as_ref(),
        )?;
        let registration = self.context.register_resource_state(&resource, ResourceStates::COMMON);

        let clear_value = self.clear_value;
        self.set_resource(resource, clear_value)?;
        self.registration = Some(registration);
        Ok(())
    }

    /// 释放资源和所有视图
    pub fn reset(&mut self) -> Result<()> {
        self.registration = None;
        self.resource = None;
        self.clear_value = None;
        self.create_views()
    }

    /// SRV，`desc` 为 `None` 时使用资源的默认视图
    pub fn shader_resource_view(&self, desc: Option<&TextureViewDesc>) -> Result<CpuDescriptorHandle> {
        let mut views = lock_views(&self.shader_resource_views);
        if let Some(view) = views.get(&desc.copied()) {
            return Ok(view.descriptor_handle(0));
        }

        let allocation = self.context.allocate_descriptors(DescriptorHeapType::CbvSrvUav, 1)?;
        let handle = allocation.descriptor_handle(0);
        self.context
            .device()
            .create_shader_resource_view(self.resource.as_ref(), desc, handle);
        views.insert(desc.copied(), allocation);

        Ok(handle)
    }

    /// UAV，`desc` 为 `None` 时使用资源的默认视图
    pub fn unordered_access_view(&self, desc: Option<&TextureViewDesc>) -> Result<CpuDescriptorHandle> {
        let mut views = lock_views(&self.unordered_access_views);
        if let Some(view) = views.get(&desc.copied()) {
            return Ok(view.descriptor_handle(0));
        }

        let allocation = self.context.allocate_descriptors(DescriptorHeapType::CbvSrvUav, 1)?;
        let handle = allocation.descriptor_handle(0);
        self.context
            .device()
            .create_unordered_access_view(self.resource.as_ref(), desc, handle);
        views.insert(desc.copied(), allocation);

        Ok(handle)
    }

    /// RTV，资源不允许作为渲染目标时返回空句柄
    pub fn render_target_view(&self) -> CpuDescriptorHandle {
        if self.render_target_view.is_null() {
            return CpuDescriptorHandle::default();
        }
        self.render_target_view.descriptor_handle(0)
    }

    /// DSV，资源不允许作为深度模板时返回空句柄
    pub fn depth_stencil_view(&self) -> CpuDescriptorHandle {
        if self.depth_stencil_view.is_null() {
            return CpuDescriptorHandle::default();
        }
        self.depth_stencil_view.descriptor_handle(0)
    }

    pub fn resource(&self) -> Option<&B::Resource> {
        self.resource.as_ref()
    }

    /// 接管当前资源在全局状态表中的记录
    pub(crate) fn adopt_registration(&mut self, registration: GlobalStateRegistration) {
        self.registration = Some(registration);
    }

    pub fn desc(&self) -> Option<ResourceDesc> {
        self.resource.as_ref().map(GpuResource::desc)
    }

    pub fn is_valid(&self) -> bool {
        self.resource.is_some()
    }

    pub fn clear_value(&self) -> Option<&ClearValue> {
        self.clear_value.as_ref()
    }

    pub fn usage(&self) -> TextureUsage {
        self.usage
    }

    pub fn set_usage(&mut self, usage: TextureUsage) {
        self.usage = usage;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        if let Some(resource) = &self.resource {
            resource.set_name(name);
        }
    }

    pub fn context(&self) -> &Arc<GpuContext<B>> {
        &self.context
    }
}

impl<B: Backend> AsResource<B> for Texture<B> {
    fn as_resource(&self) -> Option<&B::Resource> {
        self.resource.as_ref()
    }
}

/// 纹理缓存
///
/// 以文件路径为键缓存已加载的 GPU 资源，同一文件只解码、上传一次。
/// 缓存持有这些资源的全局状态记录。
pub struct TextureCache<B: Backend> {
    entries: Mutex<HashMap<PathBuf, (B::Resource, GlobalStateRegistration)>>,
}

impl<B: Backend> TextureCache<B> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, (B::Resource, GlobalStateRegistration)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, path: &Path) -> Option<B::Resource> {
        self.lock().get(path).map(|(resource, _)| resource.clone())
    }

    pub fn insert(&self, path: PathBuf, resource: B::Resource, registration: GlobalStateRegistration) {
        let replaced = self.lock().insert(path, (resource, registration));
        drop(replaced);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 清空缓存，缓存资源的全局状态记录一并移除
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.lock());
        drop(entries);
    }
}

impl<B: Backend> Default for TextureCache<B> {
    fn default() -> Self {
        Self::new()
    }
}
