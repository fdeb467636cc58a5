//! 交换链
//!
//! 翻转模型交换链，支持时会启用无撕裂限制呈现。

use std::ffi::c_void;

use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use tracing::info;
use windows::core::Interface;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D12::ID3D12Resource;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use winit::window::Window;

use crate::core::error::{DaybreakError, GraphicsError, Result};
use crate::renderer::backend::SwapChain;
use crate::renderer::resource::Format;

use super::command::Dx12Queue;
use super::device::Dx12Device;
use super::{convert, Dx12Backend, Dx12Resource};

const SWAP_CHAIN_FORMAT: Format = Format::R8G8B8A8Unorm;

fn swapchain_error(what: &'static str) -> impl FnOnce(windows::core::Error) -> DaybreakError {
    move |e| DaybreakError::Graphics(GraphicsError::SwapchainError(format!("{}: {:?}", what, e)))
}

/// 查询显示器是否支持可变刷新率
fn check_tearing_support(factory: &IDXGIFactory4) -> bool {
    let Ok(factory) = factory.cast::<IDXGIFactory5>() else {
        return false;
    };
    let mut allow_tearing: i32 = 0;
    // SAFETY: 该特性的数据是一个 BOOL
    let supported = unsafe {
        factory.CheckFeatureSupport(
            DXGI_FEATURE_PRESENT_ALLOW_TEARING,
            &mut allow_tearing as *mut i32 as *mut c_void,
            std::mem::size_of::<i32>() as u32,
        )
    };
    supported.is_ok() && allow_tearing != 0
}

/// DXGI 交换链
pub struct Dx12SwapChain {
    swap_chain: IDXGISwapChain3,
    tearing_supported: bool,
    flags: DXGI_SWAP_CHAIN_FLAG,
}

// SAFETY: 交换链只在主线程上呈现和调整大小
unsafe impl Send for Dx12SwapChain {}

impl Dx12SwapChain {
    /// 为窗口创建交换链
    ///
    /// # 参数
    ///
    /// * `device` - 提供 DXGI 工厂
    /// * `queue` - 直接命令队列
    /// * `window` - 目标窗口（必须是 Win32 窗口）
    /// * `buffer_count` - 后台缓冲数量
    pub fn new(device: &Dx12Device, queue: &Dx12Queue, window: &Window, buffer_count: u32) -> Result<Self> {
        let window_handle = window.window_handle().map_err(|e| {
            DaybreakError::Graphics(GraphicsError::SwapchainError(format!("Failed to get window handle: {}", e)))
        })?;
        let hwnd = match window_handle.as_raw() {
            RawWindowHandle::Win32(win32_handle) => HWND(win32_handle.hwnd.get() as *mut c_void),
            _ => {
                return Err(DaybreakError::Graphics(GraphicsError::SwapchainError(
                    "Expected a Win32 window handle".to_string(),
                )))
            }
        };

        let size = window.inner_size();
        let tearing_supported = check_tearing_support(device.factory());
        let flags = if tearing_supported {
            DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING
        } else {
            DXGI_SWAP_CHAIN_FLAG(0)
        };

        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: size.width.max(1),
            Height: size.height.max(1),
            Format: convert::format(SWAP_CHAIN_FORMAT),
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: buffer_count,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            Flags: flags.0 as u32,
            ..Default::default()
        };

        // SAFETY: hwnd 在窗口存活期间有效，交换链不会比窗口活得更久
        let swap_chain: IDXGISwapChain3 = unsafe {
            device
                .factory()
                .CreateSwapChainForHwnd(queue.raw(), hwnd, &desc, None, None)
                .map_err(swapchain_error("Failed to create swap chain"))?
                .cast()
                .map_err(swapchain_error("Failed to cast swap chain to IDXGISwapChain3"))?
        };

        info!(
            width = desc.Width,
            height = desc.Height,
            buffers = buffer_count,
            tearing = tearing_supported,
            "Swap chain created"
        );

        Ok(Self {
            swap_chain,
            tearing_supported,
            flags,
        })
    }
}

impl SwapChain<Dx12Backend> for Dx12SwapChain {
    fn current_back_buffer_index(&self) -> u32 {
        // SAFETY: 纯查询
        unsafe { self.swap_chain.GetCurrentBackBufferIndex() }
    }

    fn back_buffer(&self, index: u32) -> Result<Dx12Resource> {
        // SAFETY: index 小于缓冲数量由调用方保证
        let buffer: ID3D12Resource =
            unsafe { self.swap_chain.GetBuffer(index) }.map_err(swapchain_error("Failed to get back buffer"))?;
        Ok(Dx12Resource::new(buffer))
    }

    fn present(&self, sync_interval: u32, allow_tearing: bool) -> Result<()> {
        let flags = if allow_tearing && sync_interval == 0 && self.tearing_supported {
            DXGI_PRESENT_ALLOW_TEARING
        } else {
            DXGI_PRESENT(0)
        };
        // SAFETY: 后台缓冲已转换到 PRESENT 状态
        unsafe { self.swap_chain.Present(sync_interval, flags) }
            .ok()
            .map_err(swapchain_error("Failed to present"))
    }

    fn resize_buffers(&self, buffer_count: u32, width: u32, height: u32) -> Result<()> {
        // SAFETY: 调用方已释放所有后台缓冲引用
        unsafe {
            self.swap_chain
                .ResizeBuffers(buffer_count, width, height, DXGI_FORMAT_UNKNOWN, self.flags)
        }
        .map_err(swapchain_error("Failed to resize swap chain buffers"))
    }

    fn tearing_supported(&self) -> bool {
        self.tearing_supported
    }

    fn format(&self) -> Format {
        SWAP_CHAIN_FORMAT
    }
}
