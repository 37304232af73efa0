//! `CodeLibrary` — sender-side assembly of the module set to distribute.
//!
//! Modules are keyed by `location$name`.  Adding a key twice keeps the
//! first one's position in the round and the later one's content, with a
//! warning: two files declaring the same module at the same location is
//! almost always an authoring mistake.

use std::collections::BTreeMap;

use lv_registry::{ModuleAction, ModuleDef};
use tracing::warn;

use crate::{DistributionError, DistributionResult};

#[derive(Clone, Debug, Default)]
pub struct CodeLibrary {
    modules: Vec<ModuleDef>,
    /// `location$name` → index into `modules`.
    index:   BTreeMap<String, usize>,
}

impl CodeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the modules of one behavior file, stamping each with the file's
    /// location and system flag.
    pub fn add_file(&mut self, location: &str, is_system: bool, modules: Vec<ModuleDef>) -> DistributionResult<()> {
        for module in &modules {
            check_module(module)?;
        }
        for mut module in modules {
            module.location = location.to_string();
            module.system_module = is_system;
            self.insert(module);
        }
        Ok(())
    }

    /// Add one definition as is.
    pub fn add(&mut self, module: ModuleDef) -> DistributionResult<()> {
        check_module(&module)?;
        self.insert(module);
        Ok(())
    }

    fn insert(&mut self, module: ModuleDef) {
        let key = library_key(&module.location, &module.name);
        match self.index.get(&key) {
            Some(&i) => {
                warn!(module = %module.name, location = %module.location, "module defined twice; later definition wins");
                self.modules[i] = module;
            }
            None => {
                self.index.insert(key, self.modules.len());
                self.modules.push(module);
            }
        }
    }

    pub fn get(&self, location: &str, name: &str) -> Option<&ModuleDef> {
        self.index.get(&library_key(location, name)).map(|&i| &self.modules[i])
    }

    /// Definitions in the order their keys were first added.
    pub fn modules(&self) -> &[ModuleDef] {
        &self.modules
    }

    pub fn into_defs(self) -> Vec<ModuleDef> {
        self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn library_key(location: &str, name: &str) -> String {
    format!("{location}${name}")
}

/// Checks an authored module before it is queued for distribution: an `add`
/// with a non-empty name whose behaviors all have names.  The remaining
/// structural rules are those of [`ModuleDef::validate`].
pub fn check_module(module: &ModuleDef) -> DistributionResult<()> {
    let invalid = |reason: &str| DistributionError::InvalidModule {
        name:   module.name.clone(),
        reason: reason.to_string(),
    };
    if module.action != ModuleAction::Add {
        return Err(invalid("only module additions can be assembled"));
    }
    if module.name.is_empty() {
        return Err(invalid("module has no name"));
    }
    if module.model_behaviors.iter().chain(&module.view_behaviors).any(|b| b.name.is_empty()) {
        return Err(invalid("behavior has no name"));
    }
    module.validate().map_err(|e| DistributionError::InvalidModule {
        name:   module.name.clone(),
        reason: e.to_string(),
    })
}
