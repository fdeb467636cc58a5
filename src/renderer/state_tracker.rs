//! 资源状态跟踪器
//!
//! 每个命令列表持有一个跟踪器，记录该列表中资源的最终状态和需要的屏障。
//! 全局状态表只保存已提交（命令列表执行后）的状态。
//!
//! # 设计原则
//!
//! - **延迟解析**：本列表中状态未知的子资源第一次被转换时，
//!   屏障以 `Pending` 形式记录，提交时在全局锁内对照全局状态表解析
//! - **局部解析**：已知前置状态的屏障以 `Resolved` 形式记录，刷新时直接写入命令列表
//! - **合并**：尚未刷新的 `Pending` 转换再次转换同一子资源时只更新目标状态，
//!   "先 A 后 B" 最终只产生一条 `已提交状态 → B` 的屏障
//! - **逐子资源提交**：提交时只覆盖本列表中触及的子资源，其余子资源保持已提交状态
//!
//! # 加锁
//!
//! `flush_pending_resource_barriers` 和 `commit_final_resource_states`
//! 要求调用方持有全局状态表的锁守卫，保证多个命令列表同时提交时状态一致。
//! 守卫记录了加锁期间被覆盖的状态，提交失败时可以 `rollback`。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::renderer::backend::{Backend, GpuResource, NativeCommandList, ResourceBarrier};
use crate::renderer::resource::{ResourceId, ResourceStates, ALL_SUBRESOURCES};

/// 一个资源的已提交状态
///
/// 整体状态加上与整体状态不同的子资源状态。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceState {
    state: ResourceStates,
    subresource_states: BTreeMap<u32, ResourceStates>,
}

impl ResourceState {
    pub fn new(state: ResourceStates) -> Self {
        Self {
            state,
            subresource_states: BTreeMap::new(),
        }
    }

    /// 设置子资源状态，`ALL_SUBRESOURCES` 会清空逐子资源记录
    pub fn set_subresource_state(&mut self, subresource: u32, state: ResourceStates) {
        if subresource == ALL_SUBRESOURCES {
            self.state = state;
            self.subresource_states.clear();
        } else if state == self.state {
            self.subresource_states.remove(&subresource);
        } else {
            self.subresource_states.insert(subresource, state);
        }
    }

    /// 子资源状态，没有单独记录时返回整体状态
    pub fn subresource_state(&self, subresource: u32) -> ResourceStates {
        self.subresource_states
            .get(&subresource)
            .copied()
            .unwrap_or(self.state)
    }

    /// 整体状态
    pub fn state(&self) -> ResourceStates {
        self.state
    }

    pub fn has_subresource_states(&self) -> bool {
        !self.subresource_states.is_empty()
    }

    pub fn subresource_states(&self) -> impl Iterator<Item = (u32, ResourceStates)> + '_ {
        self.subresource_states.iter().map(|(&sub, &state)| (sub, state))
    }
}

/// 命令列表内已知的资源状态
///
/// 没有整体状态、也没有单独记录的子资源在本列表中状态未知。
#[derive(Debug, Clone, Default)]
struct LocalState {
    state: Option<ResourceStates>,
    subresource_states: BTreeMap<u32, ResourceStates>,
}

impl LocalState {
    fn known(&self, subresource: u32) -> Option<ResourceStates> {
        self.subresource_states.get(&subresource).copied().or(self.state)
    }

    fn set(&mut self, subresource: u32, state: ResourceStates) {
        if subresource == ALL_SUBRESOURCES {
            self.state = Some(state);
            self.subresource_states.clear();
        } else {
            self.subresource_states.insert(subresource, state);
        }
    }
}

/// 全局资源状态表
///
/// 以 `ResourceId` 为键，只是资源的反向引用，不持有资源。
#[derive(Debug, Default)]
pub struct GlobalResourceStates {
    states: Mutex<HashMap<ResourceId, ResourceState>>,
}

/// 全局资源状态表的锁守卫
pub struct GlobalStatesGuard<'a> {
    states: MutexGuard<'a, HashMap<ResourceId, ResourceState>>,
    /// 本次加锁期间第一次被覆盖前的状态
    previous: HashMap<ResourceId, ResourceState>,
}

impl GlobalResourceStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// 锁定全局状态表
    pub fn lock(&self) -> GlobalStatesGuard<'_> {
        GlobalStatesGuard {
            states: self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
            previous: HashMap::new(),
        }
    }

    /// 登记资源的初始状态
    pub fn add_global_resource_state(&self, resource: ResourceId, state: ResourceStates) {
        self.lock()
            .states
            .entry(resource)
            .or_default()
            .set_subresource_state(ALL_SUBRESOURCES, state);
    }

    /// 移除资源的记录
    pub fn remove_global_resource_state(&self, resource: ResourceId) {
        self.lock().states.remove(&resource);
    }

    /// 登记资源并返回记录的所有权，所有权丢弃时移除记录
    pub fn register(self: &Arc<Self>, resource: ResourceId, state: ResourceStates) -> GlobalStateRegistration {
        self.add_global_resource_state(resource, state);
        GlobalStateRegistration {
            states: Arc::clone(self),
            resource,
        }
    }

    /// 资源已提交状态的快照
    pub fn global_state(&self, resource: ResourceId) -> Option<ResourceState> {
        self.lock().states.get(&resource).cloned()
    }

    /// 已登记的资源数量
    pub fn len(&self) -> usize {
        self.lock().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GlobalStatesGuard<'_> {
    pub fn get(&self, resource: ResourceId) -> Option<&ResourceState> {
        self.states.get(&resource)
    }

    /// 把本地最终状态逐子资源合并进已登记的记录，未登记的资源被跳过
    fn merge(&mut self, resource: ResourceId, local: LocalState) {
        let Some(global) = self.states.get_mut(&resource) else {
            return;
        };
        self.previous.entry(resource).or_insert_with(|| global.clone());

        if let Some(state) = local.state {
            global.set_subresource_state(ALL_SUBRESOURCES, state);
        }
        for (subresource, state) in local.subresource_states {
            global.set_subresource_state(subresource, state);
        }
    }

    /// 撤销本次加锁期间提交的全部状态
    pub fn rollback(&mut self) {
        for (resource, state) in self.previous.drain() {
            if let Some(slot) = self.states.get_mut(&resource) {
                *slot = state;
            }
        }
    }
}

/// 全局状态表中一条记录的所有权
///
/// 纹理、缓冲区和纹理缓存持有它。不能在持有 `GlobalStatesGuard` 的线程上丢弃。
#[derive(Debug)]
pub struct GlobalStateRegistration {
    states: Arc<GlobalResourceStates>,
    resource: ResourceId,
}

impl GlobalStateRegistration {
    pub fn resource(&self) -> ResourceId {
        self.resource
    }
}

impl Drop for GlobalStateRegistration {
    fn drop(&mut self) {
        self.states.remove_global_resource_state(self.resource);
    }
}

/// 前置状态未知的转换
#[derive(Debug, Clone)]
struct PendingTransition<R> {
    resource: R,
    subresource: u32,
    after: ResourceStates,
    /// 已经历过一次 `flush_resource_barriers`，不再参与合并
    flushed: bool,
}

/// 屏障日志中的一项
#[derive(Debug, Clone)]
enum BarrierEntry<R> {
    Resolved(ResourceBarrier<R>),
    Pending(PendingTransition<R>),
}

impl<R: GpuResource> BarrierEntry<R> {
    fn touches(&self, id: ResourceId) -> bool {
        match self {
            BarrierEntry::Pending(pending) => pending.resource.id() == id,
            BarrierEntry::Resolved(ResourceBarrier::Transition { resource, .. }) => resource.id() == id,
            BarrierEntry::Resolved(ResourceBarrier::Uav { resource }) => {
                resource.as_ref().map_or(true, |r| r.id() == id)
            }
            BarrierEntry::Resolved(ResourceBarrier::Aliasing { before, after }) => {
                before.as_ref().map_or(true, |r| r.id() == id) || after.as_ref().map_or(true, |r| r.id() == id)
            }
        }
    }

    /// 前置状态已知时得到 `Resolved`（相同状态不产生屏障），未知时得到 `Pending`
    fn transition(resource: &R, subresource: u32, before: Option<ResourceStates>, after: ResourceStates) -> Option<Self> {
        match before {
            Some(before) if before == after => None,
            Some(before) => Some(BarrierEntry::Resolved(ResourceBarrier::Transition {
                resource: resource.clone(),
                subresource,
                before,
                after,
            })),
            None => Some(BarrierEntry::Pending(PendingTransition {
                resource: resource.clone(),
                subresource,
                after,
                flushed: false,
            })),
        }
    }
}

/// 资源状态跟踪器
pub struct ResourceStateTracker<B: Backend> {
    log: Vec<BarrierEntry<B::Resource>>,
    final_states: HashMap<ResourceId, LocalState>,
}

impl<B: Backend> ResourceStateTracker<B> {
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            final_states: HashMap::new(),
        }
    }

    /// 记录一个资源屏障
    ///
    /// 转换屏障的 `before` 被忽略，前置状态由跟踪器推导。
    pub fn resource_barrier(&mut self, barrier: ResourceBarrier<B::Resource>) {
        let ResourceBarrier::Transition {
            resource,
            subresource,
            after,
            ..
        } = barrier
        else {
            self.log.push(BarrierEntry::Resolved(barrier));
            return;
        };

        let id = resource.id();

        if let Some(pending) = self.mergeable_pending(id, subresource) {
            pending.after = after;
        } else {
            let entries: Vec<_> = match self.final_states.get(&id) {
                None => BarrierEntry::transition(&resource, subresource, None, after)
                    .into_iter()
                    .collect(),
                Some(local) if subresource != ALL_SUBRESOURCES => {
                    BarrierEntry::transition(&resource, subresource, local.known(subresource), after)
                        .into_iter()
                        .collect()
                }
                Some(local) if local.state.is_some() && local.subresource_states.is_empty() => {
                    BarrierEntry::transition(&resource, ALL_SUBRESOURCES, local.state, after)
                        .into_iter()
                        .collect()
                }
                // 子资源状态不一致或部分未知，逐个子资源转换
                Some(local) => (0..resource.desc().subresource_count())
                    .filter_map(|sub| BarrierEntry::transition(&resource, sub, local.known(sub), after))
                    .collect(),
            };
            self.log.extend(entries);
        }

        self.final_states.entry(id).or_default().set(subresource, after);
    }

    /// 最近一条涉及该资源的日志项若是同一子资源的未刷新 `Pending`，返回它
    fn mergeable_pending(&mut self, id: ResourceId, subresource: u32) -> Option<&mut PendingTransition<B::Resource>> {
        match self.log.iter_mut().rev().find(|entry| entry.touches(id)) {
            Some(BarrierEntry::Pending(pending)) if !pending.flushed && pending.subresource == subresource => {
                Some(pending)
            }
            _ => None,
        }
    }

    /// 转换资源状态
    pub fn transition_resource(&mut self, resource: &B::Resource, after: ResourceStates, subresource: u32) {
        self.resource_barrier(ResourceBarrier::Transition {
            resource: resource.clone(),
            subresource,
            before: ResourceStates::COMMON,
            after,
        });
    }

    /// UAV 屏障，`None` 表示任意 UAV 访问
    pub fn uav_barrier(&mut self, resource: Option<&B::Resource>) {
        self.resource_barrier(ResourceBarrier::Uav {
            resource: resource.cloned(),
        });
    }

    /// 别名屏障
    pub fn aliasing_barrier(&mut self, before: Option<&B::Resource>, after: Option<&B::Resource>) {
        self.resource_barrier(ResourceBarrier::Aliasing {
            before: before.cloned(),
            after: after.cloned(),
        });
    }

    /// 把已解析的屏障写入命令列表，返回写入数量
    pub fn flush_resource_barriers(&mut self, list: &mut B::CommandList) -> usize {
        let mut barriers = Vec::new();
        let mut remaining = Vec::with_capacity(self.log.len());

        for entry in self.log.drain(..) {
            match entry {
                BarrierEntry::Resolved(barrier) => barriers.push(barrier),
                BarrierEntry::Pending(mut pending) => {
                    pending.flushed = true;
                    remaining.push(BarrierEntry::Pending(pending));
                }
            }
        }
        self.log = remaining;

        if !barriers.is_empty() {
            list.resource_barriers(&barriers);
        }
        barriers.len()
    }

    /// 对照全局状态解析 `Pending` 转换并写入 `list`
    ///
    /// 全局表中没有记录的资源会被跳过。返回写入的屏障数量。
    pub fn flush_pending_resource_barriers(&mut self, guard: &mut GlobalStatesGuard<'_>, list: &mut B::CommandList) -> usize {
        let mut barriers = Vec::new();

        for entry in self.log.drain(..) {
            let BarrierEntry::Pending(pending) = entry else {
                continue;
            };
            let Some(global) = guard.get(pending.resource.id()) else {
                continue;
            };

            if pending.subresource == ALL_SUBRESOURCES && global.has_subresource_states() {
                for sub in 0..pending.resource.desc().subresource_count() {
                    let before = global.subresource_state(sub);
                    if before != pending.after {
                        barriers.push(ResourceBarrier::Transition {
                            resource: pending.resource.clone(),
                            subresource: sub,
                            before,
                            after: pending.after,
                        });
                    }
                }
            } else {
                let before = global.subresource_state(pending.subresource);
                if before != pending.after {
                    barriers.push(ResourceBarrier::Transition {
                        resource: pending.resource,
                        subresource: pending.subresource,
                        before,
                        after: pending.after,
                    });
                }
            }
        }

        if !barriers.is_empty() {
            list.resource_barriers(&barriers);
        }
        barriers.len()
    }

    /// 把本列表触及的子资源状态合并进全局状态表
    pub fn commit_final_resource_states(&mut self, guard: &mut GlobalStatesGuard<'_>) {
        for (resource, state) in self.final_states.drain() {
            guard.merge(resource, state);
        }
    }

    /// 子资源在本列表中的最终状态，本列表中未知时返回 `None`
    ///
    /// `ALL_SUBRESOURCES` 只在所有子资源处于同一已知状态时有值。
    pub fn final_state(&self, resource: ResourceId, subresource: u32) -> Option<ResourceStates> {
        let local = self.final_states.get(&resource)?;
        if subresource == ALL_SUBRESOURCES {
            return local.state.filter(|_| local.subresource_states.is_empty());
        }
        local.known(subresource)
    }

    /// 尚未解析的转换数量
    pub fn num_pending(&self) -> usize {
        self.log
            .iter()
            .filter(|entry| matches!(entry, BarrierEntry::Pending(_)))
            .count()
    }

    /// 清空日志和最终状态
    pub fn reset(&mut self) {
        self.log.clear();
        self.final_states.clear();
    }
}

impl<B: Backend> Default for ResourceStateTracker<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::command::CommandListType;
    use crate::renderer::resource::{Format, ResourceDesc, ResourceFlags};
    use crate::renderer::testing::{MockBackend, MockCommandList, MockResource};

    fn texture(mips: u16) -> MockResource {
        MockResource::new(ResourceDesc::texture_2d(Format::R8G8B8A8Unorm, 16, 16, 1, mips))
    }

    fn transition(barrier: &ResourceBarrier<MockResource>) -> (u32, ResourceStates, ResourceStates) {
        match barrier {
            ResourceBarrier::Transition {
                subresource, before, after, ..
            } => (*subresource, *before, *after),
            other => panic!("expected transition, got {:?}", other),
        }
    }

    /// 在锁内解析挂起屏障并提交，返回挂起列表
    fn submit(tracker: &mut ResourceStateTracker<MockBackend>, globals: &GlobalResourceStates) -> MockCommandList {
        let mut pending = MockCommandList::new(CommandListType::Direct);
        let mut guard = globals.lock();
        tracker.flush_pending_resource_barriers(&mut guard, &mut pending);
        tracker.commit_final_resource_states(&mut guard);
        pending
    }

    #[test]
    fn test_first_use_is_pending() {
        let globals = GlobalResourceStates::new();
        let resource = texture(1);
        globals.add_global_resource_state(resource.id(), ResourceStates::COMMON);

        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        let mut list = MockCommandList::new(CommandListType::Direct);
        let mut pending = MockCommandList::new(CommandListType::Direct);

        tracker.transition_resource(&resource, ResourceStates::RENDER_TARGET, ALL_SUBRESOURCES);
        assert_eq!(tracker.num_pending(), 1);

        // 没有可以局部解析的屏障
        assert_eq!(tracker.flush_resource_barriers(&mut list), 0);
        assert!(list.barriers().is_empty());

        let mut guard = globals.lock();
        assert_eq!(tracker.flush_pending_resource_barriers(&mut guard, &mut pending), 1);
        tracker.commit_final_resource_states(&mut guard);
        drop(guard);

        let barriers = pending.barriers();
        assert_eq!(
            transition(&barriers[0]),
            (ALL_SUBRESOURCES, ResourceStates::COMMON, ResourceStates::RENDER_TARGET)
        );
        assert_eq!(
            globals.global_state(resource.id()).unwrap().state(),
            ResourceStates::RENDER_TARGET
        );
    }

    #[test]
    fn test_pending_merge_yields_single_barrier() {
        let globals = GlobalResourceStates::new();
        let resource = texture(1);
        globals.add_global_resource_state(resource.id(), ResourceStates::COPY_DEST);

        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        let mut list = MockCommandList::new(CommandListType::Direct);

        tracker.transition_resource(&resource, ResourceStates::RENDER_TARGET, ALL_SUBRESOURCES);
        tracker.transition_resource(&resource, ResourceStates::PIXEL_SHADER_RESOURCE, ALL_SUBRESOURCES);
        assert_eq!(tracker.flush_resource_barriers(&mut list), 0);

        let pending = submit(&mut tracker, &globals);
        assert_eq!(pending.barriers().len(), 1);
        assert_eq!(
            transition(&pending.barriers()[0]),
            (ALL_SUBRESOURCES, ResourceStates::COPY_DEST, ResourceStates::PIXEL_SHADER_RESOURCE)
        );
        assert_eq!(
            globals.global_state(resource.id()).unwrap().state(),
            ResourceStates::PIXEL_SHADER_RESOURCE
        );
    }

    #[test]
    fn test_flushed_pending_is_not_merged() {
        let resource = texture(1);
        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        let mut list = MockCommandList::new(CommandListType::Direct);

        tracker.transition_resource(&resource, ResourceStates::COPY_DEST, ALL_SUBRESOURCES);
        tracker.flush_resource_barriers(&mut list);

        // 刷新之后的转换根据局部最终状态解析
        tracker.transition_resource(&resource, ResourceStates::COPY_SOURCE, ALL_SUBRESOURCES);
        assert_eq!(tracker.flush_resource_barriers(&mut list), 1);
        assert_eq!(
            transition(&list.barriers()[0]),
            (ALL_SUBRESOURCES, ResourceStates::COPY_DEST, ResourceStates::COPY_SOURCE)
        );
        assert_eq!(tracker.num_pending(), 1);
    }

    #[test]
    fn test_redundant_transition_is_dropped() {
        let resource = texture(1);
        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        let mut list = MockCommandList::new(CommandListType::Direct);

        tracker.transition_resource(&resource, ResourceStates::COPY_DEST, ALL_SUBRESOURCES);
        tracker.uav_barrier(Some(&resource));
        tracker.transition_resource(&resource, ResourceStates::COPY_DEST, ALL_SUBRESOURCES);

        // 只有 UAV 屏障被写入
        assert_eq!(tracker.flush_resource_barriers(&mut list), 1);
        assert!(matches!(list.barriers()[0], ResourceBarrier::Uav { .. }));
    }

    #[test]
    fn test_all_subresources_expands_per_subresource() {
        let resource = texture(3);
        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        let mut list = MockCommandList::new(CommandListType::Compute);

        tracker.transition_resource(&resource, ResourceStates::UNORDERED_ACCESS, ALL_SUBRESOURCES);
        tracker.transition_resource(&resource, ResourceStates::NON_PIXEL_SHADER_RESOURCE, 0);
        tracker.transition_resource(&resource, ResourceStates::NON_PIXEL_SHADER_RESOURCE, 1);
        tracker.flush_resource_barriers(&mut list);
        assert_eq!(list.barriers().len(), 2);

        tracker.transition_resource(&resource, ResourceStates::PIXEL_SHADER_RESOURCE, ALL_SUBRESOURCES);
        tracker.flush_resource_barriers(&mut list);

        // mip 2 仍处于 UAV，同样需要屏障
        let barriers = list.barriers();
        assert_eq!(barriers.len(), 5);
        assert_eq!(
            transition(&barriers[2]),
            (0, ResourceStates::NON_PIXEL_SHADER_RESOURCE, ResourceStates::PIXEL_SHADER_RESOURCE)
        );
        assert_eq!(
            transition(&barriers[3]),
            (1, ResourceStates::NON_PIXEL_SHADER_RESOURCE, ResourceStates::PIXEL_SHADER_RESOURCE)
        );
        assert_eq!(
            transition(&barriers[4]),
            (2, ResourceStates::UNORDERED_ACCESS, ResourceStates::PIXEL_SHADER_RESOURCE)
        );

        assert_eq!(
            tracker.final_state(resource.id(), ALL_SUBRESOURCES),
            Some(ResourceStates::PIXEL_SHADER_RESOURCE)
        );
    }

    #[test]
    fn test_all_after_single_subresource_covers_every_mip() {
        let resource = texture(3);
        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        let mut list = MockCommandList::new(CommandListType::Direct);

        tracker.transition_resource(&resource, ResourceStates::UNORDERED_ACCESS, ALL_SUBRESOURCES);
        tracker.transition_resource(&resource, ResourceStates::COPY_SOURCE, 0);
        tracker.transition_resource(&resource, ResourceStates::PIXEL_SHADER_RESOURCE, ALL_SUBRESOURCES);
        tracker.flush_resource_barriers(&mut list);

        let barriers: Vec<_> = list.barriers().iter().map(transition).collect();
        assert_eq!(
            barriers,
            vec![
                (0, ResourceStates::UNORDERED_ACCESS, ResourceStates::COPY_SOURCE),
                (0, ResourceStates::COPY_SOURCE, ResourceStates::PIXEL_SHADER_RESOURCE),
                (1, ResourceStates::UNORDERED_ACCESS, ResourceStates::PIXEL_SHADER_RESOURCE),
                (2, ResourceStates::UNORDERED_ACCESS, ResourceStates::PIXEL_SHADER_RESOURCE),
            ]
        );
    }

    #[test]
    fn test_sibling_subresource_first_use_is_pending() {
        let globals = GlobalResourceStates::new();
        let resource = texture(2);
        globals.add_global_resource_state(resource.id(), ResourceStates::PIXEL_SHADER_RESOURCE);

        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        let mut list = MockCommandList::new(CommandListType::Compute);

        tracker.transition_resource(&resource, ResourceStates::NON_PIXEL_SHADER_RESOURCE, 0);
        tracker.transition_resource(&resource, ResourceStates::UNORDERED_ACCESS, 1);

        // 两个子资源在本列表中都是第一次使用
        assert_eq!(tracker.flush_resource_barriers(&mut list), 0);
        assert_eq!(tracker.num_pending(), 2);
        assert_eq!(tracker.final_state(resource.id(), 1), Some(ResourceStates::UNORDERED_ACCESS));
        assert_eq!(tracker.final_state(resource.id(), ALL_SUBRESOURCES), None);

        let pending = submit(&mut tracker, &globals);
        let barriers: Vec<_> = pending.barriers().iter().map(transition).collect();
        assert_eq!(
            barriers,
            vec![
                (0, ResourceStates::PIXEL_SHADER_RESOURCE, ResourceStates::NON_PIXEL_SHADER_RESOURCE),
                (1, ResourceStates::PIXEL_SHADER_RESOURCE, ResourceStates::UNORDERED_ACCESS),
            ]
        );
    }

    #[test]
    fn test_all_with_partially_known_subresources() {
        let globals = GlobalResourceStates::new();
        let resource = texture(3);
        globals.add_global_resource_state(resource.id(), ResourceStates::COMMON);

        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        let mut list = MockCommandList::new(CommandListType::Direct);

        tracker.transition_resource(&resource, ResourceStates::UNORDERED_ACCESS, 1);
        tracker.transition_resource(&resource, ResourceStates::PIXEL_SHADER_RESOURCE, ALL_SUBRESOURCES);

        // 只有 mip 1 的前置状态已知
        assert_eq!(tracker.flush_resource_barriers(&mut list), 1);
        assert_eq!(
            transition(&list.barriers()[0]),
            (1, ResourceStates::UNORDERED_ACCESS, ResourceStates::PIXEL_SHADER_RESOURCE)
        );

        let pending = submit(&mut tracker, &globals);
        let barriers: Vec<_> = pending.barriers().iter().map(transition).collect();
        assert_eq!(
            barriers,
            vec![
                (1, ResourceStates::COMMON, ResourceStates::UNORDERED_ACCESS),
                (0, ResourceStates::COMMON, ResourceStates::PIXEL_SHADER_RESOURCE),
                (2, ResourceStates::COMMON, ResourceStates::PIXEL_SHADER_RESOURCE),
            ]
        );

        let global = globals.global_state(resource.id()).unwrap();
        assert!(!global.has_subresource_states());
        assert_eq!(global.state(), ResourceStates::PIXEL_SHADER_RESOURCE);
    }

    #[test]
    fn test_commit_keeps_untouched_subresources() {
        let globals = GlobalResourceStates::new();
        let resource = texture(2);
        globals.add_global_resource_state(resource.id(), ResourceStates::PIXEL_SHADER_RESOURCE);

        let mut first = ResourceStateTracker::<MockBackend>::new();
        first.transition_resource(&resource, ResourceStates::UNORDERED_ACCESS, 1);
        submit(&mut first, &globals);

        let mut second = ResourceStateTracker::<MockBackend>::new();
        second.transition_resource(&resource, ResourceStates::NON_PIXEL_SHADER_RESOURCE, 0);
        submit(&mut second, &globals);

        let global = globals.global_state(resource.id()).unwrap();
        assert_eq!(global.subresource_state(0), ResourceStates::NON_PIXEL_SHADER_RESOURCE);
        assert_eq!(global.subresource_state(1), ResourceStates::UNORDERED_ACCESS);
    }

    #[test]
    fn test_pending_expands_against_global_subresources() {
        let globals = GlobalResourceStates::new();
        let resource = texture(3);
        globals.add_global_resource_state(resource.id(), ResourceStates::COMMON);

        let mut setup = ResourceStateTracker::<MockBackend>::new();
        setup.transition_resource(&resource, ResourceStates::COPY_DEST, 0);
        setup.transition_resource(&resource, ResourceStates::PIXEL_SHADER_RESOURCE, 1);
        submit(&mut setup, &globals);

        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        tracker.transition_resource(&resource, ResourceStates::PIXEL_SHADER_RESOURCE, ALL_SUBRESOURCES);
        let pending = submit(&mut tracker, &globals);

        // mip 1 已是目标状态，mip 2 仍为整体状态 COMMON
        let barriers: Vec<_> = pending.barriers().iter().map(transition).collect();
        assert_eq!(
            barriers,
            vec![
                (0, ResourceStates::COPY_DEST, ResourceStates::PIXEL_SHADER_RESOURCE),
                (2, ResourceStates::COMMON, ResourceStates::PIXEL_SHADER_RESOURCE),
            ]
        );
    }

    #[test]
    fn test_unknown_resource_is_skipped() {
        let globals = GlobalResourceStates::new();
        let resource = MockResource::new(ResourceDesc::buffer(256, ResourceFlags::NONE));

        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        tracker.transition_resource(&resource, ResourceStates::COPY_DEST, ALL_SUBRESOURCES);

        let pending = submit(&mut tracker, &globals);
        assert!(pending.barriers().is_empty());
        assert_eq!(tracker.num_pending(), 0);

        // 提交不会重新登记已移除的资源
        assert!(globals.is_empty());
    }

    #[test]
    fn test_rollback_restores_committed_states() {
        let globals = GlobalResourceStates::new();
        let resource = texture(1);
        globals.add_global_resource_state(resource.id(), ResourceStates::COMMON);

        let mut tracker = ResourceStateTracker::<MockBackend>::new();
        tracker.transition_resource(&resource, ResourceStates::COPY_DEST, ALL_SUBRESOURCES);

        let mut guard = globals.lock();
        tracker.commit_final_resource_states(&mut guard);
        assert_eq!(guard.get(resource.id()).unwrap().state(), ResourceStates::COPY_DEST);
        guard.rollback();
        drop(guard);

        assert_eq!(globals.global_state(resource.id()).unwrap().state(), ResourceStates::COMMON);
    }

    #[test]
    fn test_global_table_add_remove() {
        let globals = GlobalResourceStates::new();
        let resource = texture(1);
        globals.add_global_resource_state(resource.id(), ResourceStates::PRESENT);
        assert_eq!(globals.len(), 1);

        globals.remove_global_resource_state(resource.id());
        assert!(globals.is_empty());
        assert!(globals.global_state(resource.id()).is_none());
    }

    #[test]
    fn test_registration_removes_on_drop() {
        let globals = Arc::new(GlobalResourceStates::new());
        let resource = texture(1);

        let registration = globals.register(resource.id(), ResourceStates::COPY_DEST);
        assert_eq!(registration.resource(), resource.id());
        assert_eq!(globals.len(), 1);

        drop(registration);
        assert!(globals.is_empty());
    }
}
