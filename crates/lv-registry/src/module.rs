//! `Module` — an ordered, named group of behaviors.

use lv_core::{BehaviorId, BehaviorKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Module {
    /// Name as written in the definition.
    pub declared_name: String,
    /// Registry-wide unique name instances attach by.
    pub external_name: String,
    /// Location as given in the definition (detached prefix included).
    pub location:      String,
    pub is_system:     bool,
    /// Model behaviors in declaration order.
    pub model:         Vec<BehaviorId>,
    /// View behaviors in declaration order.
    pub view:          Vec<BehaviorId>,
}

impl Module {
    pub fn new(declared: &str, external: &str, location: &str, is_system: bool) -> Self {
        Self {
            declared_name: declared.to_string(),
            external_name: external.to_string(),
            location:      location.to_string(),
            is_system,
            model:         Vec::new(),
            view:          Vec::new(),
        }
    }

    pub fn behaviors(&self, kind: BehaviorKind) -> &[BehaviorId] {
        match kind {
            BehaviorKind::Model => &self.model,
            BehaviorKind::View  => &self.view,
        }
    }

    /// All behavior ids, model first.
    pub fn all_behaviors(&self) -> impl Iterator<Item = BehaviorId> + '_ {
        self.model.iter().chain(self.view.iter()).copied()
    }
}
