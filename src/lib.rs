//! Daybreak - DirectX 12 引擎 GPU 核心
//!
//! 提供显式 GPU API 之上的簿记层：描述符分配、资源状态跟踪、
//! 命令列表录制与回收、动态描述符堆、上传缓冲区和 mip 生成。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理）
//! - `renderer`: 与后端无关的 GPU 核心
//! - `gfx`: 图形后端实现（DirectX 12，仅 Windows）
//!
//! # 使用示例
//!
//! ```no_run
//! use daybreak_render::core::Config;
//!
//! let mut config = Config::from_file_or_default("config.toml");
//! config.apply_args(std::env::args());
//! config.validate().expect("invalid configuration");
//! ```

pub mod core;
pub mod gfx;
pub mod renderer;
