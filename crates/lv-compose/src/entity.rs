//! `Entity` — the base object a composition wraps.

use std::collections::BTreeMap;

use lv_core::{InstanceId, Value};

use crate::ListenerSet;

/// Modules that left and joined an entity's composition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleDiff {
    /// In previous composition order.
    pub detached: Vec<String>,
    /// In new composition order.
    pub attached: Vec<String>,
}

impl ModuleDiff {
    pub fn is_empty(&self) -> bool {
        self.detached.is_empty() && self.attached.is_empty()
    }
}

/// A simulation object: identity, replicated fields, the ordered list of
/// attached module external names, and its event subscriptions.
///
/// Equality is identity: two `Entity` values are equal iff their ids are.
#[derive(Clone, Debug)]
pub struct Entity {
    id:            InstanceId,
    fields:        BTreeMap<String, Value>,
    modules:       Vec<String>,
    pub listeners: ListenerSet,
}

impl Entity {
    pub fn new(id: InstanceId) -> Self {
        Self {
            id,
            fields:    BTreeMap::new(),
            modules:   Vec::new(),
            listeners: ListenerSet::default(),
        }
    }

    /// Builder-style field initialisation.
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    #[inline]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field value, `Null` when absent.
    pub fn get(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Writing `Null` removes the field.
    pub fn set(&mut self, name: &str, value: Value) {
        if value.is_null() {
            self.fields.remove(name);
        } else {
            self.fields.insert(name.to_string(), value);
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Replace the composition, returning what changed.  Duplicate names are
    /// collapsed to their first occurrence.
    pub fn set_modules(&mut self, modules: &[String]) -> ModuleDiff {
        let mut next: Vec<String> = Vec::with_capacity(modules.len());
        for m in modules {
            if !next.contains(m) {
                next.push(m.clone());
            }
        }

        let diff = ModuleDiff {
            detached: self.modules.iter().filter(|m| !next.contains(m)).cloned().collect(),
            attached: next.iter().filter(|m| !self.modules.contains(m)).cloned().collect(),
        };
        self.modules = next;
        diff
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}
