//! 配置管理模块
//!
//! 提供引擎配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//! title = "Daybreak"
//! resizable = true
//!
//! [graphics]
//! vsync = true
//! allow_tearing = false
//! msaa_samples = 1
//!
//! [renderer]
//! frame_count = 3
//! descriptors_per_page = 256
//! dynamic_descriptors_per_heap = 1024
//! upload_page_size = 4194304
//! use_warp = false
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};

/// 引擎配置
///
/// 包含了引擎运行所需的所有配置项。
/// 可以从配置文件加载，也可以通过代码构建。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// GPU 资源子系统配置
    #[serde(default)]
    pub renderer: RendererConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,

    /// 是否可调整大小
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 关闭垂直同步时是否允许撕裂（需要硬件支持）
    #[serde(default = "default_allow_tearing")]
    pub allow_tearing: bool,

    /// MSAA 采样数
    #[serde(default = "default_msaa")]
    pub msaa_samples: u32,
}

/// GPU 资源子系统配置
///
/// 控制描述符分配器、动态描述符堆与上传缓冲的容量。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// 交换链缓冲数量（同时在途的帧数）
    #[serde(default = "default_frame_count")]
    pub frame_count: u32,

    /// 描述符分配器每页的描述符数量
    #[serde(default = "default_descriptors_per_page")]
    pub descriptors_per_page: u32,

    /// 动态描述符堆每个 GPU 可见堆的描述符数量
    #[serde(default = "default_dynamic_descriptors_per_heap")]
    pub dynamic_descriptors_per_heap: u32,

    /// 上传缓冲每页大小（字节）
    #[serde(default = "default_upload_page_size")]
    pub upload_page_size: usize,

    /// 使用 WARP 软件适配器
    #[serde(default = "default_use_warp")]
    pub use_warp: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// 上传页大小下限
const MIN_UPLOAD_PAGE_SIZE: usize = 64 * 1024;

// 默认值函数
fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_title() -> String { "Daybreak".to_string() }
fn default_resizable() -> bool { true }
fn default_vsync() -> bool { true }
fn default_allow_tearing() -> bool { false }
fn default_msaa() -> u32 { 1 }
fn default_frame_count() -> u32 { 3 }
fn default_descriptors_per_page() -> u32 { 256 }
fn default_dynamic_descriptors_per_heap() -> u32 { 1024 }
fn default_upload_page_size() -> usize { 4 * 1024 * 1024 }
fn default_use_warp() -> bool { false }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "daybreak.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            vsync: default_vsync(),
            allow_tearing: default_allow_tearing(),
            msaa_samples: default_msaa(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frame_count: default_frame_count(),
            descriptors_per_page: default_descriptors_per_page(),
            dynamic_descriptors_per_heap: default_dynamic_descriptors_per_heap(),
            upload_page_size: default_upload_page_size(),
            use_warp: default_use_warp(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 成功返回 `Config` 实例，失败返回错误
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use daybreak_render::core::Config;
    ///
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在则使用默认配置
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 返回 `Config` 实例
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 成功返回 `Ok(())`，失败返回错误
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// # 参数
    ///
    /// * `args` - 命令行参数迭代器
    ///
    /// # 说明
    ///
    /// 支持的参数：
    /// - `--width <value>`: 设置窗口宽度
    /// - `--height <value>`: 设置窗口高度
    /// - `--no-vsync`: 关闭垂直同步
    /// - `--warp`: 使用 WARP 软件适配器
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--no-vsync") {
            self.graphics.vsync = false;
        }

        if args.iter().any(|a| a == "--warp") {
            self.renderer.use_warp = true;
        }

        // 检查窗口尺寸
        if let Some(idx) = args.iter().position(|a| a == "--width") {
            if let Some(width_str) = args.get(idx + 1) {
                if let Ok(width) = width_str.parse() {
                    self.window.width = width;
                }
            }
        }

        if let Some(idx) = args.iter().position(|a| a == "--height") {
            if let Some(height_str) = args.get(idx + 1) {
                if let Ok(height) = height_str.parse() {
                    self.window.height = height;
                }
            }
        }
    }

    /// 验证配置的有效性
    ///
    /// # 返回值
    ///
    /// 配置有效返回 `Ok(())`，否则返回错误
    pub fn validate(&self) -> Result<()> {
        // 验证窗口尺寸
        if self.window.width == 0 || self.window.height == 0 {
            return Err(invalid("window.width/height", "Window dimensions must be greater than 0"));
        }

        // 验证 MSAA 采样数
        if !matches!(self.graphics.msaa_samples, 1 | 2 | 4 | 8 | 16) {
            return Err(invalid("graphics.msaa_samples", "MSAA samples must be 1, 2, 4, 8, or 16"));
        }

        if !(2..=16).contains(&self.renderer.frame_count) {
            return Err(invalid("renderer.frame_count", "Frame count must be between 2 and 16"));
        }

        if self.renderer.descriptors_per_page == 0 {
            return Err(invalid("renderer.descriptors_per_page", "Descriptor pages must hold at least one descriptor"));
        }

        if self.renderer.dynamic_descriptors_per_heap == 0 {
            return Err(invalid(
                "renderer.dynamic_descriptors_per_heap",
                "Dynamic descriptor heaps must hold at least one descriptor",
            ));
        }

        if self.renderer.upload_page_size < MIN_UPLOAD_PAGE_SIZE {
            return Err(invalid("renderer.upload_page_size", "Upload pages must be at least 64 KiB"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> super::error::DaybreakError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
