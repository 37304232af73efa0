//! `CompiledCache` — locally compiled capability tables.
//!
//! Tables are never replicated.  The model registry and every mirror
//! registry own a cache each and fill it from the replicated source text; a
//! cached table is valid only for the revision it was compiled from.

use std::sync::Arc;

use lv_capability::{CapabilityTable, CompileError, Compiler};
use lv_core::BehaviorId;
use rustc_hash::FxHashMap;

use crate::Behavior;

#[derive(Clone)]
struct Entry {
    revision: u32,
    table:    Arc<CapabilityTable>,
}

#[derive(Clone, Default)]
pub struct CompiledCache {
    entries: FxHashMap<BehaviorId, Entry>,
}

impl CompiledCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table compiled from `behavior`'s current revision, if cached.
    pub fn get(&self, behavior: &Behavior) -> Option<Arc<CapabilityTable>> {
        self.entries
            .get(&behavior.id)
            .filter(|e| e.revision == behavior.revision)
            .map(|e| Arc::clone(&e.table))
    }

    /// Whatever table is cached for `id`, current or stale.
    pub fn get_any(&self, id: BehaviorId) -> Option<Arc<CapabilityTable>> {
        self.entries.get(&id).map(|e| Arc::clone(&e.table))
    }

    /// Revision of the cached table for `id`.
    pub fn cached_revision(&self, id: BehaviorId) -> Option<u32> {
        self.entries.get(&id).map(|e| e.revision)
    }

    /// Return the current table, compiling `behavior.source` on a miss.
    ///
    /// A behavior at revision 0 has never compiled anywhere; `None` is
    /// returned without invoking the compiler.
    pub fn ensure(
        &mut self,
        behavior: &Behavior,
        compiler: &dyn Compiler,
    ) -> Option<Result<Arc<CapabilityTable>, CompileError>> {
        if !behavior.is_compiled() {
            return None;
        }
        if let Some(table) = self.get(behavior) {
            return Some(Ok(table));
        }
        Some(compiler.compile(&behavior.source, &behavior.location).map(|table| {
            let table = Arc::new(table);
            self.insert(behavior.id, behavior.revision, Arc::clone(&table));
            table
        }))
    }

    /// Store a table, returning the one it replaces.
    pub fn insert(
        &mut self,
        id:       BehaviorId,
        revision: u32,
        table:    Arc<CapabilityTable>,
    ) -> Option<Arc<CapabilityTable>> {
        self.entries
            .insert(id, Entry { revision, table })
            .map(|old| old.table)
    }

    pub fn evict(&mut self, id: BehaviorId) -> Option<Arc<CapabilityTable>> {
        self.entries.remove(&id).map(|e| e.table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
