//! Daybreak - DirectX 12 引擎示例程序
//!
//! 打开一个窗口，每帧清除一张离屏渲染目标并呈现到交换链。
//! 配置来自 config.toml，可用命令行参数覆盖。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件
//! cargo run
//!
//! # 使用 WARP 软件适配器并关闭垂直同步
//! cargo run -- --warp --no-vsync
//! ```

use daybreak_render::core::{log, Config};
use daybreak_render::{engine_error, engine_info};
use tracing::error;

/// 应用程序入口点
///
/// # 初始化流程
///
/// 1. 加载引擎配置文件（config.toml）
/// 2. 应用命令行参数覆盖
/// 3. 初始化日志系统
/// 4. 创建窗口、设备和应用
/// 5. 启动主循环
fn main() -> anyhow::Result<()> {
    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(std::env::args());

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let log_file = if config.logging.file_output {
        Some(config.logging.log_file.as_str())
    } else {
        None
    };
    log::init_logger(config.logging.level, config.logging.file_output, log_file);
    engine_info!(version = env!("CARGO_PKG_VERSION"), "Daybreak starting...");

    if let Err(e) = run(config) {
        engine_error!("Fatal error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

#[cfg(target_os = "windows")]
fn run(config: Config) -> anyhow::Result<()> {
    use std::sync::Arc;

    use daybreak_render::gfx::{Dx12Backend, Dx12Device, Dx12SwapChain};
    use daybreak_render::renderer::resource::{ClearValue, ResourceFlags};
    use daybreak_render::renderer::{
        Application, Format, GpuContext, ResourceDesc, Texture, TextureUsage,
    };
    use tracing::{debug, info};
    use winit::dpi::LogicalSize;
    use winit::event::{Event, WindowEvent};
    use winit::event_loop::EventLoop;
    use winit::window::WindowBuilder;

    const RENDER_TARGET_FORMAT: Format = Format::R8G8B8A8Unorm;

    info!(
        width = config.window.width,
        height = config.window.height,
        msaa = config.graphics.msaa_samples,
        warp = config.renderer.use_warp,
        "Graphics configuration"
    );

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window.title.as_str())
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
            .with_resizable(config.window.resizable)
            .build(&event_loop)?,
    );

    let device = Dx12Device::new(config.renderer.use_warp)?;
    let context = GpuContext::<Dx12Backend>::new(device, config.renderer.clone());

    let mut application = {
        let swap_chain_context = Arc::clone(&context);
        let swap_chain_window = Arc::clone(&window);
        Application::new(Arc::clone(&context), &config.graphics, move |queue, buffer_count| {
            Dx12SwapChain::new(swap_chain_context.device(), queue, &swap_chain_window, buffer_count)
        })?
    };

    let (sample_count, sample_quality) =
        application.multisample_quality_levels(RENDER_TARGET_FORMAT, config.graphics.msaa_samples);
    let size = window.inner_size();
    let mut desc = ResourceDesc::texture_2d(RENDER_TARGET_FORMAT, size.width.max(1) as u64, size.height.max(1), 1, 1)
        .with_flags(ResourceFlags::ALLOW_RENDER_TARGET);
    desc.sample_count = sample_count;
    desc.sample_quality = sample_quality;

    let clear_color = [0.4, 0.6, 0.9, 1.0];
    let mut render_target = Texture::new(
        &context,
        desc,
        Some(ClearValue::Color {
            format: RENDER_TARGET_FORMAT,
            color: clear_color,
        }),
        TextureUsage::RenderTarget,
        "Color Target",
    )?;

    info!(sample_count, sample_quality, "Entering main loop...");

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => {
            info!("Close requested, shutting down...");
            elwt.exit();
        }
        Event::WindowEvent {
            event: WindowEvent::Resized(new_size),
            ..
        } => {
            debug!(width = new_size.width, height = new_size.height, "Window resized");
            let result = application
                .resize(new_size.width, new_size.height)
                .and_then(|()| render_target.resize(new_size.width, new_size.height, 1));
            if let Err(e) = result {
                error!("Resize failed: {}", e);
                elwt.exit();
            }
        }
        Event::WindowEvent {
            event: WindowEvent::RedrawRequested,
            ..
        } => {
            if let Err(e) = render_frame(&mut application, &render_target, clear_color) {
                error!("Draw failed: {}", e);
                elwt.exit();
            }
        }
        Event::AboutToWait => window.request_redraw(),
        Event::LoopExiting => {
            for stats in context.descriptor_stats() {
                info!(?stats, "Descriptor allocator");
            }
        }
        _ => (),
    })?;

    engine_info!("Daybreak shut down");
    Ok(())
}

/// 清除离屏渲染目标并呈现
#[cfg(target_os = "windows")]
fn render_frame(
    application: &mut daybreak_render::renderer::Application<daybreak_render::gfx::Dx12Backend>,
    render_target: &daybreak_render::renderer::Texture<daybreak_render::gfx::Dx12Backend>,
    clear_color: [f32; 4],
) -> daybreak_render::core::Result<()> {
    use daybreak_render::renderer::CommandListType;

    let queue = application.command_queue(CommandListType::Direct);
    let mut list = queue.command_list()?;
    list.clear_texture(render_target, clear_color);
    queue.execute_command_list(list)?;

    application.present(render_target)?;
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn run(_config: Config) -> anyhow::Result<()> {
    error!("The DirectX 12 backend is only available on Windows");
    anyhow::bail!("unsupported platform")
}
