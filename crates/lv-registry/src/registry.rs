//! `ModuleRegistry` — load, name, compile, track usage, and plan lifecycle
//! effects.
//!
//! # Reload ordering
//!
//! `load_libraries` applies a whole batch of definitions before planning any
//! effect, then returns, for the model tier:
//!
//! ```text
//! for each changed behavior (definition order):
//!     for each using instance:  Retire   (superseded table's teardown)
//! for each changed behavior (definition order):
//!     for each using instance:  Setup    (deferred)
//! ```
//!
//! so every stale teardown runs before any new setup.  Changed view
//! behaviors are reported as one batch (`LoadReport::view_setup_all`).

use std::collections::BTreeMap;
use std::sync::Arc;

use lv_capability::{CapabilityTable, CompileError, Compiler};
use lv_core::{BehaviorId, BehaviorKind, BehaviorRef, InstanceId};
use rand::Rng;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::behavior::is_detached;
use crate::{
    Behavior, BehaviorDef, CompiledCache, DETACHED_PREFIX, Dispatch, Lifecycle, Module,
    ModuleAction, ModuleDef, RegistryConfig, RegistryResult, UsageIndex, resolve_external_name,
};

// ── LoadReport ────────────────────────────────────────────────────────────────

/// Everything one `load_libraries` call did.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Declared module name → external name, for every added module.
    pub names:          BTreeMap<String, String>,
    /// Behaviors whose source compiled to a new table, in definition order.
    pub changed:        Vec<BehaviorRef>,
    /// Model-tier effects: all `Retire`s, then deferred `Setup`s.
    pub effects:        Vec<Lifecycle>,
    /// Changed view behaviors, for one batched view-tier notification.
    pub view_setup_all: Vec<BehaviorRef>,
    /// External names of modules dropped by `remove` directives.
    pub removed:        Vec<String>,
    /// Compile failures; the affected behaviors kept their previous code.
    pub failures:       Vec<CompileError>,
    /// Locations skipped by the directory filter.
    pub skipped:        Vec<String>,
    /// The code-load switch was off; nothing was applied.
    pub disabled:       bool,
}

impl LoadReport {
    /// `true` if the batch changed registry contents.
    pub fn is_effective(&self) -> bool {
        !self.names.is_empty() || !self.changed.is_empty() || !self.removed.is_empty()
    }
}

// ── ModuleRegistry ────────────────────────────────────────────────────────────

pub struct ModuleRegistry {
    config:         RegistryConfig,
    compiler:       Arc<dyn Compiler>,
    /// Keyed by external name.
    modules:        BTreeMap<String, Module>,
    /// `(location, declared name)` → external name given on first load.
    external_names: BTreeMap<(String, String), String>,
    behaviors:      FxHashMap<BehaviorId, Behavior>,
    next_id:        BehaviorId,
    cache:          CompiledCache,
    usage:          UsageIndex,
}

/// A behavior that compiled to a new table during a load, with the table it
/// superseded.
struct Changed {
    id:  BehaviorId,
    old: Option<Arc<CapabilityTable>>,
}

impl ModuleRegistry {
    pub fn new(config: RegistryConfig, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            config,
            compiler,
            modules:        BTreeMap::new(),
            external_names: BTreeMap::new(),
            behaviors:      FxHashMap::default(),
            next_id:        BehaviorId(0),
            cache:          CompiledCache::new(),
            usage:          UsageIndex::default(),
        }
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    /// Apply a batch of module definitions.
    ///
    /// Every definition is validated first; an invalid one rejects the whole
    /// batch before anything is mutated.  Compile failures do not: the
    /// failing behavior keeps its previous source and table (or stays
    /// uncompiled if it is new) and the rest of the batch proceeds.
    pub fn load_libraries(&mut self, defs: &[ModuleDef]) -> RegistryResult<LoadReport> {
        if !self.config.code_load_enabled {
            info!(definitions = defs.len(), "code loading disabled; ignoring module definitions");
            return Ok(LoadReport { disabled: true, ..LoadReport::default() });
        }
        for def in defs {
            def.validate()?;
        }

        let mut report = LoadReport::default();
        let mut changed = Vec::new();

        for def in defs {
            if !self.config.accepts(&def.location) {
                debug!(location = %def.location, "module outside behavior directories; skipped");
                report.skipped.push(def.location.clone());
                continue;
            }
            match def.action {
                ModuleAction::Remove => {
                    let removed = self.remove_location(&def.location);
                    report.removed.extend(removed);
                }
                ModuleAction::Add => self.add_module(def, &mut report, &mut changed),
            }
        }

        self.plan_reload(&changed, &mut report);

        info!(
            modules  = report.names.len(),
            changed  = report.changed.len(),
            removed  = report.removed.len(),
            failures = report.failures.len(),
            "module definitions loaded"
        );
        Ok(report)
    }

    fn add_module(&mut self, def: &ModuleDef, report: &mut LoadReport, changed: &mut Vec<Changed>) {
        let external = resolve_external_name(
            &def.name,
            &def.location,
            |ext| self.modules.contains_key(ext),
            |loc, declared| self.external_names.get(&(loc.to_string(), declared.to_string())).cloned(),
        );
        if external != def.name {
            debug!(declared = %def.name, external = %external, location = %def.location, "module renamed");
        }
        report.names.insert(def.name.clone(), external.clone());
        self.external_names
            .insert((def.location.clone(), def.name.clone()), external.clone());

        let mut module = self
            .modules
            .remove(&external)
            .unwrap_or_else(|| Module::new(&def.name, &external, &def.location, def.system_module));
        module.location = def.location.clone();
        module.is_system = def.system_module;

        let previous: Vec<BehaviorId> = module.all_behaviors().collect();
        module.model = self.load_behaviors(&external, def, BehaviorKind::Model, &module.model, report, changed);
        module.view = self.load_behaviors(&external, def, BehaviorKind::View, &module.view, report, changed);

        for id in previous {
            if !module.model.contains(&id) && !module.view.contains(&id) {
                self.drop_behavior(id);
            }
        }
        self.modules.insert(external, module);
    }

    fn load_behaviors(
        &mut self,
        external: &str,
        def:      &ModuleDef,
        kind:     BehaviorKind,
        previous: &[BehaviorId],
        report:   &mut LoadReport,
        changed:  &mut Vec<Changed>,
    ) -> Vec<BehaviorId> {
        let list: &[BehaviorDef] = match kind {
            BehaviorKind::Model => &def.model_behaviors,
            BehaviorKind::View  => &def.view_behaviors,
        };

        let mut ids = Vec::with_capacity(list.len());
        for bdef in list {
            let existing = previous
                .iter()
                .copied()
                .find(|id| self.behaviors.get(id).is_some_and(|b| b.name == bdef.name));
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = self.next_id;
                    self.next_id = id.next();
                    let behavior =
                        Behavior::new(id, external, &bdef.name, kind, &def.location, def.system_module);
                    self.behaviors.insert(id, behavior);
                    id
                }
            };
            self.update_source(id, &bdef.source_text, report, changed);
            ids.push(id);
        }
        ids
    }

    /// Compile `source` for `id` if it differs from the cached source or the
    /// behavior has never compiled.
    fn update_source(
        &mut self,
        id:      BehaviorId,
        source:  &str,
        report:  &mut LoadReport,
        changed: &mut Vec<Changed>,
    ) {
        let Some(behavior) = self.behaviors.get_mut(&id) else {
            return;
        };
        if behavior.is_compiled() && behavior.source == source {
            return;
        }

        match self.compiler.compile(source, &behavior.location) {
            Ok(table) => {
                let old = self.cache.get_any(id);
                behavior.source = source.to_string();
                behavior.revision += 1;
                self.cache.insert(id, behavior.revision, Arc::new(table));
                debug!(behavior = %behavior.target(), revision = behavior.revision, "behavior compiled");
                changed.push(Changed { id, old });
            }
            Err(err) => {
                warn!(behavior = %behavior.target(), error = %err, "compile failed; keeping previous code");
                if !behavior.is_compiled() {
                    behavior.source = source.to_string();
                }
                report.failures.push(err);
            }
        }
    }

    fn plan_reload(&self, changed: &[Changed], report: &mut LoadReport) {
        let live: Vec<(&Changed, &Behavior)> = changed
            .iter()
            .filter_map(|c| self.behaviors.get(&c.id).map(|b| (c, b)))
            .collect();

        report.changed = live.iter().map(|(_, b)| b.target()).collect();

        let model = || live.iter().filter(|(_, b)| b.kind == BehaviorKind::Model);

        for (c, b) in model() {
            let Some(old) = c.old.as_ref().filter(|t| t.has_teardown()) else {
                continue;
            };
            for &instance in self.usage.model.users(b.id) {
                report.effects.push(Lifecycle::Retire {
                    instance,
                    target: b.target(),
                    table:  Arc::clone(old),
                });
            }
        }
        for (_, b) in model() {
            if !self.cache.get(b).is_some_and(|t| t.has_setup()) {
                continue;
            }
            for &instance in self.usage.model.users(b.id) {
                report.effects.push(Lifecycle::Setup {
                    instance,
                    target:   b.target(),
                    dispatch: Dispatch::Deferred,
                });
            }
        }

        report.view_setup_all = live
            .iter()
            .filter(|(_, b)| b.kind == BehaviorKind::View)
            .map(|(_, b)| b.target())
            .collect();
    }

    /// Drop every module loaded from `location`.
    fn remove_location(&mut self, location: &str) -> Vec<String> {
        let doomed: Vec<String> = self
            .modules
            .values()
            .filter(|m| m.location == location)
            .map(|m| m.external_name.clone())
            .collect();

        for external in &doomed {
            if let Some(module) = self.modules.remove(external) {
                for id in module.all_behaviors() {
                    self.drop_behavior(id);
                }
            }
        }
        self.external_names.retain(|(loc, _), _| loc != location);

        if !doomed.is_empty() {
            info!(location, modules = ?doomed, "modules removed");
        }
        doomed
    }

    fn drop_behavior(&mut self, id: BehaviorId) {
        if let Some(behavior) = self.behaviors.remove(&id) {
            debug!(behavior = %behavior.target(), "behavior dropped");
        }
        self.cache.evict(id);
        let model = self.usage.model.forget(id);
        let view = self.usage.view.forget(id);
        if !model.is_empty() || !view.is_empty() {
            debug!(?id, model_users = model.len(), view_users = view.len(), "usage records orphaned");
        }
    }

    // ── Usage ─────────────────────────────────────────────────────────────────

    /// Record `instance` as a model-tier user of `id`.  On first use returns
    /// an immediate `Setup` if the behavior defines one; repeated use is a
    /// no-op.
    pub fn model_use(&mut self, instance: InstanceId, id: BehaviorId) -> Option<Lifecycle> {
        let Some(behavior) = self.behaviors.get(&id) else {
            debug!(?id, %instance, "use of unknown behavior ignored");
            return None;
        };
        if !self.usage.model.insert(id, instance) {
            return None;
        }
        let target = behavior.target();
        debug!(%instance, behavior = %target, "model use");
        self.cache
            .get(behavior)
            .is_some_and(|t| t.has_setup())
            .then_some(Lifecycle::Setup { instance, target, dispatch: Dispatch::Immediate })
    }

    /// Remove `instance` from the model users of `id`.  Returns a deferred
    /// `Teardown` if it was a user and the behavior defines one.
    pub fn model_unuse(&mut self, instance: InstanceId, id: BehaviorId) -> Option<Lifecycle> {
        self.unuse_model(instance, id, Dispatch::Deferred)
    }

    fn unuse_model(&mut self, instance: InstanceId, id: BehaviorId, dispatch: Dispatch) -> Option<Lifecycle> {
        if !self.usage.model.remove(id, instance) {
            return None;
        }
        let Some(behavior) = self.behaviors.get(&id) else {
            debug!(?id, %instance, "unuse of removed behavior");
            return None;
        };
        let target = behavior.target();
        debug!(%instance, behavior = %target, "model unuse");
        self.cache
            .get(behavior)
            .is_some_and(|t| t.has_teardown())
            .then_some(Lifecycle::Teardown { instance, target, dispatch })
    }

    /// Record `instance` as a view-tier user of `id`.  The first use tells
    /// the view tier to attach the behavior to the instance's mirror.
    pub fn view_use(&mut self, instance: InstanceId, id: BehaviorId) -> Option<Lifecycle> {
        let behavior = self.behaviors.get(&id)?;
        if !self.usage.view.insert(id, instance) {
            return None;
        }
        Some(Lifecycle::ViewAttach { instance, target: behavior.target() })
    }

    pub fn view_unuse(&mut self, instance: InstanceId, id: BehaviorId) -> Option<Lifecycle> {
        if !self.usage.view.remove(id, instance) {
            return None;
        }
        let behavior = self.behaviors.get(&id)?;
        Some(Lifecycle::ViewDetach { instance, target: behavior.target() })
    }

    /// Use every behavior of module `external` (model first, each in
    /// declaration order).
    pub fn attach(&mut self, instance: InstanceId, external: &str) -> Vec<Lifecycle> {
        let Some(module) = self.modules.get(external) else {
            warn!(%instance, module = external, "attach of unknown module ignored");
            return Vec::new();
        };
        let (model, view) = (module.model.clone(), module.view.clone());

        let mut effects = Vec::new();
        effects.extend(model.into_iter().filter_map(|id| self.model_use(instance, id)));
        effects.extend(view.into_iter().filter_map(|id| self.view_use(instance, id)));
        effects
    }

    /// Unuse every behavior of module `external`.  Model teardowns are
    /// dispatched as given.
    pub fn detach(&mut self, instance: InstanceId, external: &str, dispatch: Dispatch) -> Vec<Lifecycle> {
        let Some(module) = self.modules.get(external) else {
            debug!(%instance, module = external, "detach of unknown module ignored");
            return Vec::new();
        };
        let (model, view) = (module.model.clone(), module.view.clone());

        let mut effects = Vec::new();
        effects.extend(model.into_iter().filter_map(|id| self.unuse_model(instance, id, dispatch)));
        effects.extend(view.into_iter().filter_map(|id| self.view_unuse(instance, id)));
        effects
    }

    /// Detach every listed module from an instance that is going away.
    /// Teardowns are immediate.
    pub fn release(&mut self, instance: InstanceId, modules: &[String]) -> Vec<Lifecycle> {
        modules
            .iter()
            .flat_map(|m| self.detach(instance, m, Dispatch::Immediate))
            .collect()
    }

    pub fn usage(&self) -> &UsageIndex {
        &self.usage
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Find a behavior by module external name and behavior name; model
    /// behaviors first, then view behaviors.
    pub fn lookup(&self, external: &str, behavior: &str) -> Option<&Behavior> {
        self.lookup_kind(external, behavior, BehaviorKind::Model)
            .or_else(|| self.lookup_kind(external, behavior, BehaviorKind::View))
    }

    pub fn lookup_kind(&self, external: &str, behavior: &str, kind: BehaviorKind) -> Option<&Behavior> {
        self.modules
            .get(external)?
            .behaviors(kind)
            .iter()
            .filter_map(|id| self.behaviors.get(id))
            .find(|b| b.name == behavior)
    }

    pub fn resolve(&self, target: &BehaviorRef) -> Option<&Behavior> {
        self.lookup(&target.module, &target.behavior)
    }

    /// The current compiled table of a behavior.
    pub fn table(&self, behavior: &Behavior) -> Option<Arc<CapabilityTable>> {
        self.cache.get(behavior)
    }

    /// The current compiled table of the model behavior `target` names.
    pub fn model_table(&self, target: &BehaviorRef) -> Option<Arc<CapabilityTable>> {
        self.lookup_kind(&target.module, &target.behavior, BehaviorKind::Model)
            .and_then(|b| self.table(b))
    }

    /// Compiled model tables of the given modules, in composition order.
    /// Unknown modules and uncompiled behaviors contribute nothing.
    pub fn model_layers(&self, modules: &[String]) -> Vec<(BehaviorRef, Arc<CapabilityTable>)> {
        modules
            .iter()
            .filter_map(|m| self.modules.get(m))
            .flat_map(|m| m.model.iter())
            .filter_map(|id| self.behaviors.get(id))
            .filter_map(|b| self.table(b).map(|t| (b.target(), t)))
            .collect()
    }

    /// `spec` is `"Module"` or `"Module$Behavior"`.  `true` if the module is
    /// among `attached`, has the behavior (when named), and some matching
    /// behavior defines `method` (when given).  Model behaviors are searched
    /// before view behaviors, as in [`lookup`](Self::lookup).
    pub fn has_behavior(&self, attached: &[String], spec: &str, method: Option<&str>) -> bool {
        let (module, behavior) = match spec.split_once('$') {
            Some((m, b)) => (m, Some(b)),
            None => (spec, None),
        };
        if !attached.iter().any(|m| m == module) {
            return false;
        }
        let Some(found) = self.modules.get(module) else {
            return false;
        };
        let mut candidates = found
            .model
            .iter()
            .chain(found.view.iter())
            .filter_map(|id| self.behaviors.get(id))
            .filter(|b| behavior.is_none_or(|name| b.name == name))
            .peekable();

        match method {
            None => behavior.is_none() || candidates.peek().is_some(),
            Some(method) => candidates.any(|b| self.table(b).is_some_and(|t| t.defines(method))),
        }
    }

    pub fn module(&self, external: &str) -> Option<&Module> {
        self.modules.get(external)
    }

    /// All modules, ordered by external name.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn behavior(&self, id: BehaviorId) -> Option<&Behavior> {
        self.behaviors.get(&id)
    }

    pub fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }

    pub fn compiler(&self) -> &Arc<dyn Compiler> {
        &self.compiler
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ── Code-load switch ──────────────────────────────────────────────────────

    pub fn code_load_enabled(&self) -> bool {
        self.config.code_load_enabled
    }

    pub fn set_code_load_enabled(&mut self, enabled: bool) {
        if self.config.code_load_enabled != enabled {
            info!(enabled, "code-load switch changed");
        }
        self.config.code_load_enabled = enabled;
    }

    // ── Export ────────────────────────────────────────────────────────────────

    /// Definitions of all non-system modules, ordered by external name.
    ///
    /// With `only`, just the named modules are exported, and each gets a
    /// fresh detached location so loading the export elsewhere can never
    /// collide with the module it came from.
    pub fn save<R: Rng + ?Sized>(&self, only: Option<&[&str]>, rng: &mut R) -> Vec<ModuleDef> {
        self.modules
            .values()
            .filter(|m| !m.is_system)
            .filter(|m| only.is_none_or(|names| names.contains(&m.external_name.as_str())))
            .map(|m| {
                let location = if only.is_some() && !m.location.is_empty() {
                    format!("{DETACHED_PREFIX}{}/{}", token(rng), token(rng))
                } else {
                    m.location.clone()
                };
                ModuleDef {
                    action:          ModuleAction::Add,
                    name:            m.declared_name.clone(),
                    location,
                    system_module:   false,
                    model_behaviors: self.export(&m.model),
                    view_behaviors:  self.export(&m.view),
                }
            })
            .collect()
    }

    fn export(&self, ids: &[BehaviorId]) -> Vec<BehaviorDef> {
        ids.iter()
            .filter_map(|id| self.behaviors.get(id))
            .map(|b| BehaviorDef { name: b.name.clone(), source_text: b.source.clone() })
            .collect()
    }

    /// `true` if `external` was loaded from a detached location.
    pub fn is_detached(&self, external: &str) -> bool {
        self.modules.get(external).is_some_and(|m| is_detached(&m.location))
    }
}

/// Ten base-36 digits.
fn token<R: Rng + ?Sized>(rng: &mut R) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    (0..10).map(|_| DIGITS[rng.gen_range(0..36)] as char).collect()
}
