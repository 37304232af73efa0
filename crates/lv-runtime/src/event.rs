//! Messages into and out of a model world.

use std::collections::BTreeMap;

use lv_core::{BehaviorRef, InstanceId, Value};
use lv_distribution::DistributionMessage;
use serde::{Deserialize, Serialize};

/// Replicated input to a model world.  Every replica receives the same
/// sequence over the bus.
///
/// ```json
/// { "kind": "spawn", "modules": ["Lights"], "fields": {} }
/// { "kind": "publish", "scope": "1", "event": "bump", "data": { "Int": 5 } }
/// { "kind": "distribution", "type": "loadStart", "sessionKey": 42 }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ModelEvent {
    /// One message of a code distribution round.
    Distribution(DistributionMessage),

    /// Create an instance.  Ids are allocated in message order, from 1.
    Spawn {
        modules: Vec<String>,
        #[serde(default)]
        fields:  BTreeMap<String, Value>,
    },

    /// Replace an instance's module list.
    SetModules { instance: InstanceId, modules: Vec<String> },

    Destroy { instance: InstanceId },

    /// Invoke a member method of an instance.
    Invoke {
        instance: InstanceId,
        method:   String,
        #[serde(default)]
        args:     Vec<Value>,
    },

    /// A user event, delivered to every matching listener.
    Publish {
        scope: String,
        event: String,
        #[serde(default)]
        data:  Value,
    },

    /// Turn later code distribution rounds into no-ops.
    DisableCodeLoad,

    /// Move to the next turn.
    Advance,
}

/// An event published by capability code, waiting for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    pub scope: String,
    pub event: String,
    pub data:  Value,
}

/// Notification from a model world to the view world of the same replica.
/// Never crosses the bus: every replica derives its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewNotice {
    /// A mirror should be created.
    Spawned { instance: InstanceId, fields: BTreeMap<String, Value> },

    /// An instance's composition changed.  `detached` and `attached` are the
    /// view behaviors that left and joined, in declaration order.
    Recompose {
        instance: InstanceId,
        modules:  Vec<String>,
        detached: Vec<BehaviorRef>,
        attached: Vec<BehaviorRef>,
    },

    /// View behaviors whose code changed in one load.
    SetupAll { targets: Vec<BehaviorRef> },

    Destroyed { instance: InstanceId },

    /// Modules dropped by a `remove` directive.
    ModulesRemoved { modules: Vec<String> },
}

/// Replicated state of one instance, for comparing worlds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySnapshot {
    pub id:        InstanceId,
    pub fields:    BTreeMap<String, Value>,
    pub modules:   Vec<String>,
    /// Listener keys, in registration order.
    pub listeners: Vec<String>,
}
