//! 错误处理模块
//!
//! 定义了引擎中使用的统一错误类型。
//!
//! # 设计原则
//!
//! - 手写 `Display` / `Error` / `From` 实现，不引入额外的宏依赖
//! - 为每种错误类型提供清晰的上下文信息
//! - 区分三类错误：设备/API 致命错误、调用约定违例、以及仅记录日志的软错误
//! - 易于模式匹配和错误处理

use std::fmt;
use std::path::PathBuf;

/// 引擎统一的 Result 类型
///
/// 所有可能返回错误的函数都应该使用这个类型。
pub type Result<T> = std::result::Result<T, DaybreakError>;

/// Daybreak 引擎的错误类型
///
/// 包含了引擎运行过程中可能遇到的各种错误情况。
#[derive(Debug)]
pub enum DaybreakError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// 纹理加载错误
    Texture(TextureError),

    /// IO 错误
    Io(std::io::Error),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置项缺失
    MissingField(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
///
/// 前五个变体对应设备或 API 调用失败，这类错误不会重试；
/// 其余变体对应调用方违反了接口约定（例如描述符数量越界）。
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备创建失败
    DeviceCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 着色器编译失败
    ShaderCompilation(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 渲染命令执行失败
    CommandExecution(String),

    /// 描述符数量超出堆容量或根参数索引越界
    OutOfDescriptors { requested: u32, capacity: u32 },

    /// 描述符数量超出根签名中描述符表的大小
    DescriptorRange {
        root_index: u32,
        offset: u32,
        count: u32,
        table_size: u32,
    },

    /// 单次上传分配超过上传页大小
    OutOfUploadMemory { requested: usize, page_size: usize },

    /// 资源维度或描述不符合操作要求
    InvalidResource(String),

    /// 不支持的纹理格式
    UnsupportedFormat(String),
}

/// 纹理加载相关的错误
#[derive(Debug)]
pub enum TextureError {
    /// 文件不存在
    FileNotFound(PathBuf),

    /// 图像解码失败
    Decode(image::ImageError),
}

impl fmt::Display for DaybreakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaybreakError::Config(e) => write!(f, "Configuration error: {}", e),
            DaybreakError::Graphics(e) => write!(f, "Graphics error: {}", e),
            DaybreakError::Texture(e) => write!(f, "Texture error: {}", e),
            DaybreakError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {}", field),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::OutOfDescriptors { requested, capacity } => write!(
                f,
                "Cannot stage {} descriptors (capacity {})",
                requested, capacity
            ),
            GraphicsError::DescriptorRange {
                root_index,
                offset,
                count,
                table_size,
            } => write!(
                f,
                "Descriptors [{}..{}) exceed descriptor table {} of size {}",
                offset,
                offset + count,
                root_index,
                table_size
            ),
            GraphicsError::OutOfUploadMemory { requested, page_size } => write!(
                f,
                "Upload allocation of {} bytes exceeds page size {}",
                requested, page_size
            ),
            GraphicsError::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            GraphicsError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
        }
    }
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::FileNotFound(path) => write!(f, "Texture file not found: {}", path.display()),
            TextureError::Decode(e) => write!(f, "Failed to decode texture: {}", e),
        }
    }
}

impl std::error::Error for DaybreakError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DaybreakError::Io(e) => Some(e),
            DaybreakError::Texture(TextureError::Decode(e)) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for TextureError {}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for DaybreakError {
    fn from(err: std::io::Error) -> Self {
        DaybreakError::Io(err)
    }
}

impl From<ConfigError> for DaybreakError {
    fn from(err: ConfigError) -> Self {
        DaybreakError::Config(err)
    }
}

impl From<GraphicsError> for DaybreakError {
    fn from(err: GraphicsError) -> Self {
        DaybreakError::Graphics(err)
    }
}

impl From<TextureError> for DaybreakError {
    fn from(err: TextureError) -> Self {
        DaybreakError::Texture(err)
    }
}

impl From<image::ImageError> for DaybreakError {
    fn from(err: image::ImageError) -> Self {
        DaybreakError::Texture(TextureError::Decode(err))
    }
}
