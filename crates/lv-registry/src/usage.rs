//! Usage records: which instances use which behavior, per tier.
//!
//! The sets hold instance ids only (a weak back-reference): dropping an
//! instance never requires touching a table, and a record that outlives its
//! behavior is simply never consulted again.

use lv_core::{BehaviorId, BehaviorKind, InstanceId};
use rustc_hash::FxHashMap;

/// `BehaviorId → users`, users kept in first-use order.
#[derive(Clone, Debug, Default)]
pub struct UsageSet {
    inner: FxHashMap<BehaviorId, Vec<InstanceId>>,
}

impl UsageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `instance` as a user.  Returns `false` if it already was one.
    pub fn insert(&mut self, behavior: BehaviorId, instance: InstanceId) -> bool {
        let users = self.inner.entry(behavior).or_default();
        if users.contains(&instance) {
            return false;
        }
        users.push(instance);
        true
    }

    /// Returns `false` if `instance` was not a user.
    pub fn remove(&mut self, behavior: BehaviorId, instance: InstanceId) -> bool {
        let Some(users) = self.inner.get_mut(&behavior) else {
            return false;
        };
        let Some(pos) = users.iter().position(|&i| i == instance) else {
            return false;
        };
        users.remove(pos);
        if users.is_empty() {
            self.inner.remove(&behavior);
        }
        true
    }

    pub fn users(&self, behavior: BehaviorId) -> &[InstanceId] {
        self.inner.get(&behavior).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, behavior: BehaviorId, instance: InstanceId) -> bool {
        self.users(behavior).contains(&instance)
    }

    /// Drop the record of a behavior that no longer exists.
    pub fn forget(&mut self, behavior: BehaviorId) -> Vec<InstanceId> {
        self.inner.remove(&behavior).unwrap_or_default()
    }

    /// Number of behaviors with at least one user.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// The model-tier and view-tier usage sets of a registry.
#[derive(Clone, Debug, Default)]
pub struct UsageIndex {
    pub model: UsageSet,
    pub view:  UsageSet,
}

impl UsageIndex {
    pub fn tier(&self, kind: BehaviorKind) -> &UsageSet {
        match kind {
            BehaviorKind::Model => &self.model,
            BehaviorKind::View  => &self.view,
        }
    }

    pub fn tier_mut(&mut self, kind: BehaviorKind) -> &mut UsageSet {
        match kind {
            BehaviorKind::Model => &mut self.model,
            BehaviorKind::View  => &mut self.view,
        }
    }
}
