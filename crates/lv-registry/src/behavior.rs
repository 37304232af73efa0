//! `Behavior` — one named, versioned capability definition.

use lv_core::{BehaviorId, BehaviorKind, BehaviorRef};

/// Location prefix for modules exported by a filtered `save`.  Such modules
/// bypass the directory filter, and their behaviors record the location with
/// the prefix stripped.
pub const DETACHED_PREFIX: &str = "(detached):";

/// A capability definition owned by a [`Module`][crate::Module].
///
/// `revision` counts successful compilations: 0 means the source has never
/// compiled, and every accepted source change increments it.  Compiled
/// tables are cached separately (see [`CompiledCache`][crate::CompiledCache])
/// keyed by `(id, revision)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Behavior {
    pub id:        BehaviorId,
    pub name:      String,
    pub kind:      BehaviorKind,
    pub source:    String,
    pub location:  String,
    pub is_system: bool,
    pub revision:  u32,
    /// External name of the owning module.
    pub module:    String,
}

impl Behavior {
    /// A behavior that has not compiled yet.
    pub fn new(
        id:        BehaviorId,
        module:    &str,
        name:      &str,
        kind:      BehaviorKind,
        location:  &str,
        is_system: bool,
    ) -> Self {
        Self {
            id,
            name:     name.to_string(),
            kind,
            source:   String::new(),
            location: strip_detached(location).to_string(),
            is_system,
            revision: 0,
            module:   module.to_string(),
        }
    }

    /// The `(module, behavior)` name pair deferred work is bound to.
    pub fn target(&self) -> BehaviorRef {
        BehaviorRef::new(&self.module, &self.name)
    }

    #[inline]
    pub fn is_compiled(&self) -> bool {
        self.revision > 0
    }
}

pub(crate) fn is_detached(location: &str) -> bool {
    location.starts_with(DETACHED_PREFIX)
}

fn strip_detached(location: &str) -> &str {
    location.strip_prefix(DETACHED_PREFIX).unwrap_or(location)
}
