//! 命令队列
//!
//! 封装原生队列和它的 fence，并维护一个可复用的命令列表池。
//!
//! # 设计原则
//!
//! - **列表复用**：提交后的命令列表连同 fence 值进入在途队列，后台线程等到
//!   fence 完成后重置它并放回可用池
//! - **挂起屏障**：提交时持有全局状态锁，把每个列表的首次使用屏障解析到一个
//!   单独的挂起列表里，挂起列表有内容时先于原列表提交
//! - **单调 fence**：每次 signal 的值严格递增
//!
//! 列表状态：可用 → 在途 → 等待 fence → 可用

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tracing::{error, info};

use crate::core::error::Result;
use crate::renderer::backend::{Backend, Device, NativeFence, NativeQueue};
use crate::renderer::command::CommandListType;
use crate::renderer::command_list::CommandList;
use crate::renderer::context::GpuContext;
use crate::renderer::state_tracker::GlobalStatesGuard;

struct QueueState<B: Backend> {
    in_flight: VecDeque<(u64, CommandList<B>)>,
    available: VecDeque<CommandList<B>>,
    running: bool,
}

struct Shared<B: Backend> {
    state: Mutex<QueueState<B>>,
    cond: Condvar,
}

impl<B: Backend> Shared<B> {
    fn lock(&self) -> MutexGuard<'_, QueueState<B>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 命令队列
pub struct CommandQueue<B: Backend> {
    context: Arc<GpuContext<B>>,
    list_type: CommandListType,
    native: B::Queue,
    fence: Arc<B::Fence>,
    fence_value: Mutex<u64>,
    shared: Arc<Shared<B>>,
    worker: Option<JoinHandle<()>>,
}

impl<B: Backend> CommandQueue<B> {
    /// 创建队列、fence 和回收线程
    pub fn new(context: Arc<GpuContext<B>>, list_type: CommandListType) -> Result<Self> {
        let device = context.device();
        let native = device.create_command_queue(list_type)?;
        let fence = Arc::new(device.create_fence(0)?);

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                in_flight: VecDeque::new(),
                available: VecDeque::new(),
                running: true,
            }),
            cond: Condvar::new(),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            let fence = Arc::clone(&fence);
            std::thread::Builder::new()
                .name(format!("{} Worker", list_type.queue_name()))
                .spawn(move || process_in_flight_command_lists(shared, fence))?
        };

        info!(queue = list_type.queue_name(), "Command queue created");

        Ok(Self {
            context,
            list_type,
            native,
            fence,
            fence_value: Mutex::new(0),
            shared,
            worker: Some(worker),
        })
    }

    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    /// 原生队列
    pub fn native(&self) -> &B::Queue {
        &self.native
    }

    /// 最近一次 signal 的值
    pub fn fence_value(&self) -> u64 {
        *self.fence_value.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 取一个可用的命令列表，池为空时新建
    pub fn command_list(&self) -> Result<CommandList<B>> {
        if let Some(list) = self.shared.lock().available.pop_front() {
            return Ok(list);
        }
        CommandList::new(Arc::clone(&self.context), self.list_type)
    }

    /// 提交一个命令列表，返回这次提交的 fence 值
    pub fn execute_command_list(&self, list: CommandList<B>) -> Result<u64> {
        self.execute_command_lists(vec![list])
    }

    /// 提交一组命令列表，返回这次提交的 fence 值
    ///
    /// 每个列表之前可能附带一个挂起列表，用来把资源从全局已知状态转换到
    /// 列表录制时假定的初始状态。任一列表关闭失败或原生提交失败时，全局
    /// 状态回滚到提交前，所有列表都不会执行。
    pub fn execute_command_lists(&self, mut lists: Vec<CommandList<B>>) -> Result<u64> {
        let mut pendings = Vec::with_capacity(lists.len());
        for _ in 0..lists.len() {
            pendings.push(self.command_list()?);
        }

        let has_pending = {
            let mut guard = self.context.global_states().lock();
            match self.close_and_execute(&mut lists, &mut pendings, &mut guard) {
                Ok(has_pending) => has_pending,
                Err(e) => {
                    guard.rollback();
                    drop(guard);
                    return Err(e);
                }
            }
        };
        let fence_value = self.signal()?;

        let mut submitted = Vec::with_capacity(lists.len() * 2);
        let mut idle = Vec::new();
        for ((list, pending), has_pending) in lists.into_iter().zip(pendings).zip(has_pending) {
            if has_pending {
                submitted.push(pending);
            } else {
                idle.push(pending);
            }
            submitted.push(list);
        }

        #[cfg(debug_assertions)]
        tracing::debug!(
            queue = self.list_type.queue_name(),
            lists = submitted.len(),
            fence_value,
            "Command lists executed"
        );

        let mut state = self.shared.lock();
        state
            .in_flight
            .extend(submitted.into_iter().chain(idle).map(|list| (fence_value, list)));
        drop(state);
        self.shared.cond.notify_all();

        Ok(fence_value)
    }

    /// 在全局状态锁内关闭并提交列表，返回每个列表是否带挂起列表
    ///
    /// 这里不丢弃任何列表，列表持有的资源包装只能在锁外释放。
    fn close_and_execute(
        &self,
        lists: &mut [CommandList<B>],
        pendings: &mut [CommandList<B>],
        guard: &mut GlobalStatesGuard<'_>,
    ) -> Result<Vec<bool>> {
        let mut has_pending = Vec::with_capacity(lists.len());
        for (list, pending) in lists.iter_mut().zip(pendings.iter_mut()) {
            has_pending.push(list.close_with_pending(pending, guard)?);
            pending.close()?;
        }

        let mut natives: Vec<&B::CommandList> = Vec::with_capacity(lists.len() * 2);
        for ((list, pending), &with_pending) in lists.iter().zip(pendings.iter()).zip(&has_pending) {
            if with_pending {
                natives.push(pending.native());
            }
            natives.push(list.native());
        }
        self.native.execute_command_lists(&natives)?;
        Ok(has_pending)
    }

    /// 在队列上 signal 下一个 fence 值
    pub fn signal(&self) -> Result<u64> {
        let mut value = self.fence_value.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *value += 1;
        self.native.signal(&self.fence, *value)?;
        Ok(*value)
    }

    pub fn is_fence_complete(&self, fence_value: u64) -> bool {
        self.fence.completed_value() >= fence_value
    }

    /// 阻塞直到 GPU 完成 `fence_value`
    pub fn wait_for_fence_value(&self, fence_value: u64) -> Result<()> {
        if self.is_fence_complete(fence_value) {
            return Ok(());
        }
        self.fence.wait_for_value(fence_value)
    }

    /// 等待所有在途列表回收，再等待 GPU 完成已提交的全部工作
    pub fn flush(&self) -> Result<()> {
        let mut state = self.shared.lock();
        while !state.in_flight.is_empty() {
            state = self
                .shared
                .cond
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        drop(state);

        let fence_value = self.signal()?;
        self.wait_for_fence_value(fence_value)
    }

    /// 让本队列在 GPU 侧等待 `other` 最近一次 signal 的值
    pub fn wait(&self, other: &CommandQueue<B>) -> Result<()> {
        self.native.wait(&other.fence, other.fence_value())
    }

    /// 可用池中的命令列表数量
    pub fn num_available_lists(&self) -> usize {
        self.shared.lock().available.len()
    }
}

impl<B: Backend> Drop for CommandQueue<B> {
    fn drop(&mut self) {
        self.shared.lock().running = false;
        self.shared.cond.notify_all();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!(queue = self.list_type.queue_name(), "Command queue worker panicked");
            }
        }

        info!(queue = self.list_type.queue_name(), "Command queue shut down");
    }
}

/// 回收线程：等待在途列表的 fence，重置后放回可用池
///
/// 停止后仍会处理完剩余的在途列表。
fn process_in_flight_command_lists<B: Backend>(shared: Arc<Shared<B>>, fence: Arc<B::Fence>) {
    loop {
        let (fence_value, mut list) = {
            let mut state = shared.lock();
            loop {
                if let Some(entry) = state.in_flight.pop_front() {
                    break entry;
                }
                if !state.running {
                    return;
                }
                state = shared.cond.wait(state).unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        };

        if let Err(e) = fence.wait_for_value(fence_value) {
            error!(fence_value, error = %e, "Failed to wait for command list fence");
        } else if let Err(e) = list.reset() {
            error!(error = %e, "Failed to reset command list");
        } else {
            shared.lock().available.push_back(list);
        }

        shared.cond.notify_all();
    }
}
