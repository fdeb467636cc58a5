//! 帧同步
//!
//! Fence 值由 `CommandQueue` 维护，这里只提供全局帧计数器。
//! 描述符的延迟回收以帧号为单位，帧号由一个共享的计数器推进。
//!
//! # 使用场景
//!
//! 1. **帧同步**：确保 GPU 完成某个后台缓冲的上一帧才开始复用它
//! 2. **延迟释放**：描述符在其所在帧完成后才回到空闲列表

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 全局帧计数器
///
/// 克隆得到的计数器共享同一个值。描述符分配在析构时读取当前帧号，
/// 应用在每次 Present 之后推进它。
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    frame: Arc<AtomicU64>,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前帧号
    pub fn current(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    /// 推进到下一帧，返回新的帧号
    pub fn advance(&self) -> u64 {
        self.frame.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_counter_shared() {
        let counter = FrameCounter::new();
        let shared = counter.clone();
        assert_eq!(counter.current(), 0);

        assert_eq!(shared.advance(), 1);
        assert_eq!(shared.advance(), 2);
        // 克隆体与原计数器看到同一个值
        assert_eq!(counter.current(), 2);
    }
}
