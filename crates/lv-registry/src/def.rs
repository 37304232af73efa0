//! Module definitions as they travel over the wire and out of `save`.
//!
//! ```json
//! { "action": "add", "name": "Lights", "location": "user/lights.lv",
//!   "systemModule": false,
//!   "modelBehaviors": [{ "name": "Lamp", "sourceText": "capability Lamp …" }],
//!   "viewBehaviors":  [] }
//! ```
//!
//! `action` defaults to `add`.  A `remove` definition only needs `location`:
//! every module loaded from that location is dropped.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{RegistryError, RegistryResult};

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleAction {
    #[default]
    Add,
    Remove,
}

/// One behavior's name and source text.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorDef {
    pub name:        String,
    pub source_text: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDef {
    #[serde(default)]
    pub action:          ModuleAction,
    #[serde(default)]
    pub name:            String,
    #[serde(default)]
    pub location:        String,
    #[serde(default)]
    pub system_module:   bool,
    #[serde(default)]
    pub model_behaviors: Vec<BehaviorDef>,
    #[serde(default)]
    pub view_behaviors:  Vec<BehaviorDef>,
}

impl ModuleDef {
    /// An `add` definition with no behaviors yet.
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self { name: name.into(), location: location.into(), ..Self::default() }
    }

    /// A `remove` directive for everything loaded from `location`.
    pub fn remove(location: impl Into<String>) -> Self {
        Self { action: ModuleAction::Remove, location: location.into(), ..Self::default() }
    }

    pub fn with_model(mut self, name: &str, source: &str) -> Self {
        self.model_behaviors.push(BehaviorDef { name: name.into(), source_text: source.into() });
        self
    }

    pub fn with_view(mut self, name: &str, source: &str) -> Self {
        self.view_behaviors.push(BehaviorDef { name: name.into(), source_text: source.into() });
        self
    }

    pub fn system(mut self) -> Self {
        self.system_module = true;
        self
    }

    /// Structural checks that must pass before anything is mutated.
    ///
    /// - `add` needs a non-empty name; `remove` needs a non-empty location.
    /// - Behavior names are non-empty, free of `$` and `.`, and unique per
    ///   kind within the module.
    pub fn validate(&self) -> RegistryResult<()> {
        let invalid = |reason: String| RegistryError::InvalidDefinition {
            name: self.name.clone(),
            reason,
        };

        match self.action {
            ModuleAction::Remove => {
                if self.location.is_empty() {
                    return Err(invalid("remove directive without a location".into()));
                }
                return Ok(());
            }
            ModuleAction::Add => {
                if self.name.is_empty() {
                    return Err(invalid("module name is empty".into()));
                }
                if self.name.contains(['$', '.']) {
                    return Err(invalid("module name may not contain `$` or `.`".into()));
                }
            }
        }

        for (kind, list) in [("model", &self.model_behaviors), ("view", &self.view_behaviors)] {
            let mut seen = BTreeSet::new();
            for b in list {
                if b.name.is_empty() {
                    return Err(invalid(format!("{kind} behavior with an empty name")));
                }
                if b.name.contains(['$', '.']) {
                    return Err(invalid(format!("{kind} behavior name {:?} contains `$` or `.`", b.name)));
                }
                if !seen.insert(b.name.as_str()) {
                    return Err(invalid(format!("duplicate {kind} behavior {:?}", b.name)));
                }
            }
        }
        Ok(())
    }
}
