//! 命令相关的公共类型
//!
//! 命令列表/队列类型、清除标志以及渲染目标附件描述。

use std::sync::Arc;

use bitflags::bitflags;

use crate::renderer::backend::Backend;
use crate::renderer::texture::Texture;

/// 命令列表（以及对应队列）的类型
///
/// 判别值与 `D3D12_COMMAND_LIST_TYPE` 相同。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListType {
    /// 图形 + 计算 + 拷贝
    Direct = 0,
    /// 计算 + 拷贝
    Compute = 2,
    /// 仅拷贝
    Copy = 3,
}

impl CommandListType {
    /// 队列的调试名称
    pub fn queue_name(&self) -> &'static str {
        match self {
            CommandListType::Direct => "Direct Command Queue",
            CommandListType::Compute => "Compute Command Queue",
            CommandListType::Copy => "Copy Command Queue",
        }
    }

    /// 能否录制 Draw/Dispatch
    pub fn supports_dispatch(&self) -> bool {
        !matches!(self, CommandListType::Copy)
    }
}

bitflags! {
    /// 深度模板清除标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        const DEPTH = 0x1;
        const STENCIL = 0x2;
        const DEPTH_STENCIL = Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

/// 颜色附件的最大数量
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// 渲染目标
///
/// 最多 8 个颜色附件加一个深度模板附件，附件以共享引用持有。
pub struct RenderTarget<B: Backend> {
    color: [Option<Arc<Texture<B>>>; MAX_COLOR_ATTACHMENTS],
    depth_stencil: Option<Arc<Texture<B>>>,
}

impl<B: Backend> RenderTarget<B> {
    pub fn new() -> Self {
        Self {
            color: std::array::from_fn(|_| None),
            depth_stencil: None,
        }
    }

    /// 绑定颜色附件
    pub fn attach_color(&mut self, slot: usize, texture: Arc<Texture<B>>) {
        assert!(slot < MAX_COLOR_ATTACHMENTS, "color attachment slot out of range");
        self.color[slot] = Some(texture);
    }

    /// 绑定深度模板附件
    pub fn attach_depth_stencil(&mut self, texture: Arc<Texture<B>>) {
        self.depth_stencil = Some(texture);
    }

    pub fn color_attachments(&self) -> impl Iterator<Item = &Arc<Texture<B>>> {
        self.color.iter().flatten()
    }

    pub fn depth_stencil(&self) -> Option<&Arc<Texture<B>>> {
        self.depth_stencil.as_ref()
    }

    /// 释放所有附件引用
    pub fn clear(&mut self) {
        self.color.iter_mut().for_each(|slot| *slot = None);
        self.depth_stencil = None;
    }
}

impl<B: Backend> Default for RenderTarget<B> {
    fn default() -> Self {
        Self::new()
    }
}
