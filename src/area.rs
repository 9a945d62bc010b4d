//! Overlap regions: monitor bookkeeping and gravity/damping overrides.

use std::collections::{BTreeMap, BTreeSet};

use crate::collision_object::CollisionObject;
use crate::types::{
    AreaParam, AreaParams, ConstraintId, InstanceId, MonitorEvent, MonitorStatus, ObjectId,
    SpaceOverrideMode,
};

/// Host hook receiving coalesced overlap transitions.
///
/// `receiver` identifies the callback's scope: replacing a callback with one
/// of a different receiver discards every pending transition.
pub struct MonitorCallback {
    pub receiver: InstanceId,
    pub func: Box<dyn FnMut(MonitorEvent)>,
}

impl MonitorCallback {
    pub fn new(receiver: InstanceId, func: impl FnMut(MonitorEvent) + 'static) -> Self {
        Self {
            receiver,
            func: Box::new(func),
        }
    }
}

/// One (other object, other shape, own shape) overlap.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct MonitorKey {
    pub rid: ObjectId,
    pub instance_id: InstanceId,
    pub other_shape: usize,
    pub self_shape: usize,
}

pub struct Area {
    pub(crate) co: CollisionObject,
    pub(crate) params: AreaParams,
    pub(crate) override_mode: SpaceOverrideMode,
    pub(crate) monitorable: bool,
    pub(crate) monitor_callback: Option<MonitorCallback>,
    pub(crate) area_monitor_callback: Option<MonitorCallback>,
    /// Net enter(+1)/exit(-1) count per overlap since the last flush.
    pub(crate) monitored_bodies: BTreeMap<MonitorKey, i32>,
    pub(crate) monitored_areas: BTreeMap<MonitorKey, i32>,
    pub(crate) constraints: BTreeSet<ConstraintId>,
}

impl Default for Area {
    fn default() -> Self {
        Self::new()
    }
}

impl Area {
    pub fn new() -> Self {
        Self {
            // Areas never move under the solver.
            co: CollisionObject::new(true),
            params: AreaParams::default(),
            override_mode: SpaceOverrideMode::Disabled,
            monitorable: false,
            monitor_callback: None,
            area_monitor_callback: None,
            monitored_bodies: BTreeMap::new(),
            monitored_areas: BTreeMap::new(),
            constraints: BTreeSet::new(),
        }
    }

    pub fn collision_object(&self) -> &CollisionObject {
        &self.co
    }

    pub fn params(&self) -> &AreaParams {
        &self.params
    }

    pub fn set_param(&mut self, param: AreaParam) {
        self.params.apply(param);
    }

    pub fn space_override_mode(&self) -> SpaceOverrideMode {
        self.override_mode
    }

    /// Returns true when the area switched between overriding and not,
    /// which requires its shapes to be registered again.
    pub(crate) fn set_space_override_mode(&mut self, mode: SpaceOverrideMode) -> bool {
        let was = self.override_mode != SpaceOverrideMode::Disabled;
        let now = mode != SpaceOverrideMode::Disabled;
        self.override_mode = mode;
        if was != now {
            self.co.needs_reregister = true;
            return true;
        }
        false
    }

    pub fn is_monitorable(&self) -> bool {
        self.monitorable
    }

    pub(crate) fn set_monitorable(&mut self, monitorable: bool) {
        if self.monitorable == monitorable {
            return;
        }
        self.monitorable = monitorable;
        self.update_static();
        self.co.pending_update = true;
    }

    /// An area only needs to pair with static bodies when something is
    /// listening on either side.
    pub(crate) fn update_static(&mut self) {
        let is_static =
            self.monitor_callback.is_none() && self.area_monitor_callback.is_none() && !self.monitorable;
        if self.co.is_static != is_static {
            self.co.is_static = is_static;
            self.co.pending_update = true;
        }
    }

    pub fn has_monitor_callback(&self) -> bool {
        self.monitor_callback.is_some()
    }

    pub fn has_area_monitor_callback(&self) -> bool {
        self.area_monitor_callback.is_some()
    }

    /// True when installing `cb` changes the callback scope.
    pub(crate) fn monitor_scope_changes(current: &Option<MonitorCallback>, cb: &Option<MonitorCallback>) -> bool {
        current.as_ref().map(|c| c.receiver) != cb.as_ref().map(|c| c.receiver)
    }

    pub(crate) fn clear_monitored(&mut self) {
        self.monitored_bodies.clear();
        self.monitored_areas.clear();
    }

    pub(crate) fn add_body_to_query(&mut self, body: ObjectId, instance_id: InstanceId, body_shape: usize, area_shape: usize) {
        *self.monitored_bodies.entry(MonitorKey {
            rid: body,
            instance_id,
            other_shape: body_shape,
            self_shape: area_shape,
        })
        .or_insert(0) += 1;
    }

    pub(crate) fn remove_body_from_query(&mut self, body: ObjectId, instance_id: InstanceId, body_shape: usize, area_shape: usize) {
        *self.monitored_bodies.entry(MonitorKey {
            rid: body,
            instance_id,
            other_shape: body_shape,
            self_shape: area_shape,
        })
        .or_insert(0) -= 1;
    }

    pub(crate) fn add_area_to_query(&mut self, area: ObjectId, instance_id: InstanceId, other_shape: usize, self_shape: usize) {
        *self.monitored_areas.entry(MonitorKey {
            rid: area,
            instance_id,
            other_shape,
            self_shape,
        })
        .or_insert(0) += 1;
    }

    pub(crate) fn remove_area_from_query(&mut self, area: ObjectId, instance_id: InstanceId, other_shape: usize, self_shape: usize) {
        *self.monitored_areas.entry(MonitorKey {
            rid: area,
            instance_id,
            other_shape,
            self_shape,
        })
        .or_insert(0) -= 1;
    }

    #[cfg(test)]
    pub(crate) fn has_pending_queries(&self) -> bool {
        !self.monitored_bodies.is_empty() || !self.monitored_areas.is_empty()
    }

    /// Deliver one event per overlap whose net count is non-zero, then
    /// forget all counts. Net-zero overlaps are dropped without an event.
    pub(crate) fn call_queries(&mut self) {
        fn dispatch(cb: Option<&mut MonitorCallback>, monitored: &BTreeMap<MonitorKey, i32>) {
            let Some(cb) = cb else {
                return;
            };
            for (key, &state) in monitored {
                if state == 0 {
                    continue;
                }
                (cb.func)(MonitorEvent {
                    status: if state > 0 {
                        MonitorStatus::Added
                    } else {
                        MonitorStatus::Removed
                    },
                    other: key.rid,
                    other_instance: key.instance_id,
                    other_shape: key.other_shape,
                    self_shape: key.self_shape,
                });
            }
        }
        dispatch(self.monitor_callback.as_mut(), &self.monitored_bodies);
        self.monitored_bodies.clear();
        dispatch(self.area_monitor_callback.as_mut(), &self.monitored_areas);
        self.monitored_areas.clear();
    }
}
