//! Lifecycle effects produced by registry operations.
//!
//! Effects are returned in the order they must be applied.  The world that
//! owns the instances applies them: `Immediate` ones before the triggering
//! message completes, `Deferred` ones through its deferred-task queue (and
//! therefore against whatever code backs the target when they run).

use std::sync::Arc;

use lv_capability::CapabilityTable;
use lv_core::{BehaviorRef, InstanceId};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Dispatch {
    Immediate,
    Deferred,
}

#[derive(Clone)]
pub enum Lifecycle {
    /// Run `setup` of `target` on `instance`.
    Setup { instance: InstanceId, target: BehaviorRef, dispatch: Dispatch },

    /// Run `teardown` of `target` on `instance`.
    Teardown { instance: InstanceId, target: BehaviorRef, dispatch: Dispatch },

    /// Run `teardown` of a superseded table, immediately.  The table is
    /// pinned here because the registry no longer resolves to it.
    Retire { instance: InstanceId, target: BehaviorRef, table: Arc<CapabilityTable> },

    /// The view tier should attach `target` to the instance's mirror.
    ViewAttach { instance: InstanceId, target: BehaviorRef },

    /// The view tier should detach `target` from the instance's mirror.
    ViewDetach { instance: InstanceId, target: BehaviorRef },
}

impl Lifecycle {
    pub fn instance(&self) -> InstanceId {
        match self {
            Lifecycle::Setup { instance, .. }
            | Lifecycle::Teardown { instance, .. }
            | Lifecycle::Retire { instance, .. }
            | Lifecycle::ViewAttach { instance, .. }
            | Lifecycle::ViewDetach { instance, .. } => *instance,
        }
    }

    pub fn target(&self) -> &BehaviorRef {
        match self {
            Lifecycle::Setup { target, .. }
            | Lifecycle::Teardown { target, .. }
            | Lifecycle::Retire { target, .. }
            | Lifecycle::ViewAttach { target, .. }
            | Lifecycle::ViewDetach { target, .. } => target,
        }
    }

    /// Short label for logs and test assertions, e.g. `"setup Lights$Lamp"`.
    pub fn label(&self) -> String {
        let verb = match self {
            Lifecycle::Setup { .. }      => "setup",
            Lifecycle::Teardown { .. }   => "teardown",
            Lifecycle::Retire { .. }     => "retire",
            Lifecycle::ViewAttach { .. } => "view-attach",
            Lifecycle::ViewDetach { .. } => "view-detach",
        };
        format!("{verb} {}", self.target())
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::Setup { dispatch, .. } | Lifecycle::Teardown { dispatch, .. } => {
                write!(f, "{} on {} ({dispatch:?})", self.label(), self.instance())
            }
            _ => write!(f, "{} on {}", self.label(), self.instance()),
        }
    }
}
