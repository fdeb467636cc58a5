//! GPU 上下文
//!
//! 持有所有命令列表、纹理和队列共享的状态：设备、每种堆类型的描述符
//! 分配器、全局资源状态表、纹理缓存、帧计数器，以及第一次使用时才创建的
//! mip 生成管线。以 `Arc<GpuContext>` 的形式在线程间共享。

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::core::config::RendererConfig;
use crate::core::error::Result;
use crate::renderer::backend::{Backend, GpuResource};
use crate::renderer::descriptor::{
    DescriptorAllocation, DescriptorAllocator, DescriptorAllocatorStats, DescriptorHeapType,
    NUM_DESCRIPTOR_HEAP_TYPES,
};
use crate::renderer::mips::GenerateMipsPipeline;
use crate::renderer::resource::ResourceStates;
use crate::renderer::state_tracker::{GlobalResourceStates, GlobalStateRegistration};
use crate::renderer::sync::FrameCounter;
use crate::renderer::texture::TextureCache;

/// GPU 上下文
pub struct GpuContext<B: Backend> {
    device: Arc<B::Device>,
    config: RendererConfig,
    frames: FrameCounter,
    allocators: [DescriptorAllocator<B>; NUM_DESCRIPTOR_HEAP_TYPES],
    global_states: Arc<GlobalResourceStates>,
    texture_cache: TextureCache<B>,
    generate_mips: Mutex<Option<Arc<GenerateMipsPipeline<B>>>>,
}

impl<B: Backend> GpuContext<B> {
    /// 创建上下文
    ///
    /// # 参数
    ///
    /// * `device` - 原生设备
    /// * `config` - 描述符页、动态堆与上传页的容量配置
    pub fn new(device: B::Device, config: RendererConfig) -> Arc<Self> {
        let device = Arc::new(device);
        let frames = FrameCounter::new();
        let allocators = DescriptorHeapType::ALL.map(|heap_type| {
            DescriptorAllocator::new(
                Arc::clone(&device),
                heap_type,
                config.descriptors_per_page,
                frames.clone(),
            )
        });

        info!(
            descriptors_per_page = config.descriptors_per_page,
            dynamic_descriptors_per_heap = config.dynamic_descriptors_per_heap,
            upload_page_size = config.upload_page_size,
            "GPU context created"
        );

        Arc::new(Self {
            device,
            config,
            frames,
            allocators,
            global_states: Arc::new(GlobalResourceStates::new()),
            texture_cache: TextureCache::new(),
            generate_mips: Mutex::new(None),
        })
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// 设备的共享引用
    pub fn device_arc(&self) -> &Arc<B::Device> {
        &self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// 全局帧计数器
    pub fn frames(&self) -> &FrameCounter {
        &self.frames
    }

    pub fn global_states(&self) -> &GlobalResourceStates {
        &self.global_states
    }

    /// 以 `state` 登记资源，返回的所有权丢弃时移除记录
    pub fn register_resource_state(&self, resource: &B::Resource, state: ResourceStates) -> GlobalStateRegistration {
        self.global_states.register(resource.id(), state)
    }

    pub fn texture_cache(&self) -> &TextureCache<B> {
        &self.texture_cache
    }

    pub fn allocator(&self, heap_type: DescriptorHeapType) -> &DescriptorAllocator<B> {
        &self.allocators[heap_type.index()]
    }

    /// 从 CPU 可见堆分配 `num_descriptors` 个连续描述符
    pub fn allocate_descriptors(
        &self,
        heap_type: DescriptorHeapType,
        num_descriptors: u32,
    ) -> Result<DescriptorAllocation<B>> {
        self.allocator(heap_type).allocate(num_descriptors)
    }

    /// 回收帧号不大于 `frame` 的过期描述符
    pub fn release_stale_descriptors(&self, frame: u64) {
        for allocator in &self.allocators {
            allocator.release_stale_descriptors(frame);
        }
    }

    /// 各堆类型的分配统计
    pub fn descriptor_stats(&self) -> Vec<DescriptorAllocatorStats> {
        self.allocators.iter().map(DescriptorAllocator::stats).collect()
    }

    /// mip 生成管线，第一次调用时创建
    pub fn generate_mips_pipeline(&self) -> Result<Arc<GenerateMipsPipeline<B>>> {
        let mut slot = self
            .generate_mips
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pipeline) = slot.as_ref() {
            return Ok(Arc::clone(pipeline));
        }

        let pipeline = Arc::new(GenerateMipsPipeline::new(self)?);
        *slot = Some(Arc::clone(&pipeline));
        Ok(pipeline)
    }
}
