//! 应用程序
//!
//! 把 GPU 上下文、三种命令队列和交换链组合在一起，负责呈现、调整大小和
//! 帧间的描述符回收。
//!
//! # 设计原则
//!
//! - **显式所有权**：应用持有上下文和队列，不再作为进程级单例存在
//! - **帧节奏**：每个后台缓冲记录最近一次使用它的 fence 值和帧号，复用前先等待
//!   fence，再回收该帧释放的描述符
//! - **后端无关**：交换链由调用方提供的闭包在直接队列上创建

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::config::GraphicsConfig;
use crate::core::error::Result;
use crate::renderer::backend::{Backend, Device, SwapChain};
use crate::renderer::command::CommandListType;
use crate::renderer::command_queue::CommandQueue;
use crate::renderer::context::GpuContext;
use crate::renderer::descriptor::{DescriptorAllocation, DescriptorHeapType};
use crate::renderer::resource::{Format, ResourceStates, ALL_SUBRESOURCES};
use crate::renderer::texture::{Texture, TextureUsage};

/// 当前存活的应用实例数量
static INSTANCES: AtomicUsize = AtomicUsize::new(0);

/// 应用程序
pub struct Application<B: Backend> {
    context: Arc<GpuContext<B>>,
    direct_queue: CommandQueue<B>,
    compute_queue: CommandQueue<B>,
    copy_queue: CommandQueue<B>,

    swap_chain: B::SwapChain,
    back_buffers: Vec<Texture<B>>,
    current_back_buffer: u32,

    /// 每个后台缓冲最近一次呈现时 signal 的 fence 值
    fence_values: Vec<u64>,
    /// 每个后台缓冲最近一次呈现所在的帧，尚未呈现过时为 `None`
    frame_values: Vec<Option<u64>>,

    vsync: bool,
    allow_tearing: bool,
}

impl<B: Backend> Application<B> {
    /// 创建应用
    ///
    /// # 参数
    ///
    /// * `context` - GPU 上下文，后台缓冲数量取自其配置
    /// * `graphics` - 垂直同步与撕裂设置
    /// * `create_swap_chain` - 在直接队列上创建指定缓冲数量的交换链
    pub fn new<F>(context: Arc<GpuContext<B>>, graphics: &GraphicsConfig, create_swap_chain: F) -> Result<Self>
    where
        F: FnOnce(&B::Queue, u32) -> Result<B::SwapChain>,
    {
        let frame_count = context.config().frame_count;

        let direct_queue = CommandQueue::new(Arc::clone(&context), CommandListType::Direct)?;
        let compute_queue = CommandQueue::new(Arc::clone(&context), CommandListType::Compute)?;
        let copy_queue = CommandQueue::new(Arc::clone(&context), CommandListType::Copy)?;

        info!(frame_count, "Creating swap chain");
        let swap_chain = create_swap_chain(direct_queue.native(), frame_count)?;
        let allow_tearing = graphics.allow_tearing && swap_chain.tearing_supported();

        let back_buffers = (0..frame_count)
            .map(|i| Texture::empty(&context, TextureUsage::RenderTarget, &format!("Backbuffer[{}]", i)))
            .collect();

        let mut application = Self {
            current_back_buffer: swap_chain.current_back_buffer_index(),
            context,
            direct_queue,
            compute_queue,
            copy_queue,
            swap_chain,
            back_buffers,
            fence_values: vec![0; frame_count as usize],
            frame_values: vec![None; frame_count as usize],
            vsync: graphics.vsync,
            allow_tearing,
        };
        application.update_render_target_views()?;

        if INSTANCES.fetch_add(1, Ordering::AcqRel) > 0 {
            crate::engine_warn!("An application instance already exists");
        }

        info!(
            frame_count,
            vsync = application.vsync,
            allow_tearing,
            "Application created"
        );

        Ok(application)
    }

    pub fn context(&self) -> &Arc<GpuContext<B>> {
        &self.context
    }

    /// 指定类型的命令队列
    pub fn command_queue(&self, list_type: CommandListType) -> &CommandQueue<B> {
        match list_type {
            CommandListType::Direct => &self.direct_queue,
            CommandListType::Compute => &self.compute_queue,
            CommandListType::Copy => &self.copy_queue,
        }
    }

    pub fn swap_chain(&self) -> &B::SwapChain {
        &self.swap_chain
    }

    pub fn current_back_buffer_index(&self) -> u32 {
        self.current_back_buffer
    }

    /// 当前后台缓冲
    pub fn back_buffer(&self) -> &Texture<B> {
        &self.back_buffers[self.current_back_buffer as usize]
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        self.vsync = vsync;
    }

    /// 呈现一帧，返回新的后台缓冲下标
    ///
    /// `texture` 有效时先拷贝（多重采样时解析）到当前后台缓冲。
    /// 返回前会等待新后台缓冲上一次使用的 fence，并回收那一帧释放的描述符。
    pub fn present(&mut self, texture: &Texture<B>) -> Result<u32> {
        let queue = &self.direct_queue;
        let mut list = queue.command_list()?;

        let back_buffer = &self.back_buffers[self.current_back_buffer as usize];
        if let Some(desc) = texture.desc() {
            if desc.sample_count > 1 {
                list.resolve_subresource(back_buffer, texture, 0, 0);
            } else {
                list.copy_resource(back_buffer, texture);
            }
        }

        list.transition_barrier(back_buffer, ResourceStates::PRESENT, ALL_SUBRESOURCES, false);
        queue.execute_command_list(list)?;

        let sync_interval = if self.vsync { 1 } else { 0 };
        let allow_tearing = self.allow_tearing && !self.vsync;
        self.swap_chain.present(sync_interval, allow_tearing)?;

        let presented = self.current_back_buffer as usize;
        self.fence_values[presented] = queue.signal()?;
        self.frame_values[presented] = Some(self.context.frames().current());
        self.context.frames().advance();

        self.current_back_buffer = self.swap_chain.current_back_buffer_index();
        let next = self.current_back_buffer as usize;
        queue.wait_for_fence_value(self.fence_values[next])?;

        if let Some(finished) = self.frame_values[next] {
            self.release_stale_descriptors(finished);
        }

        #[cfg(debug_assertions)]
        tracing::trace!(
            frame = self.context.frames().current(),
            back_buffer = self.current_back_buffer,
            "Frame presented"
        );

        Ok(self.current_back_buffer)
    }

    /// 调整交换链大小
    ///
    /// 先等待所有队列空闲，再释放后台缓冲引用并重建。
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let width = width.max(1);
        let height = height.max(1);

        self.flush()?;

        for texture in self.back_buffers.iter_mut() {
            texture.reset()?;
        }

        self.swap_chain
            .resize_buffers(self.back_buffers.len() as u32, width, height)?;
        self.current_back_buffer = self.swap_chain.current_back_buffer_index();
        self.update_render_target_views()?;

        info!(width, height, "Swap chain resized");
        Ok(())
    }

    /// 等待三个队列上的全部工作完成
    pub fn flush(&self) -> Result<()> {
        self.direct_queue.flush()?;
        self.compute_queue.flush()?;
        self.copy_queue.flush()
    }

    /// 在 `format` 下不超过 `num_samples` 的最高可用多重采样，返回 (采样数, 质量)
    pub fn multisample_quality_levels(&self, format: Format, num_samples: u32) -> (u32, u32) {
        self.context
            .device()
            .multisample_quality_levels(format, num_samples)
    }

    pub fn allocate_descriptors(&self, heap_type: DescriptorHeapType, num_descriptors: u32) -> Result<DescriptorAllocation<B>> {
        self.context.allocate_descriptors(heap_type, num_descriptors)
    }

    /// 回收 `finished_frame` 及之前释放的描述符
    pub fn release_stale_descriptors(&self, finished_frame: u64) {
        self.context.release_stale_descriptors(finished_frame);
    }

    fn update_render_target_views(&mut self) -> Result<()> {
        for (i, texture) in self.back_buffers.iter_mut().enumerate() {
            let buffer = self.swap_chain.back_buffer(i as u32)?;
            let registration = self.context.register_resource_state(&buffer, ResourceStates::COMMON);
            texture.set_resource(buffer, None)?;
            texture.adopt_registration(registration);
        }
        Ok(())
    }
}

impl<B: Backend> Drop for Application<B> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "Failed to flush command queues on shutdown");
        }
        INSTANCES.fetch_sub(1, Ordering::AcqRel);
        info!("Application destroyed");
    }
}
