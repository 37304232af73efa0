//! `ViewWorld` — the mirror registry of one participant.
//!
//! A view world is never replicated.  It keeps one mirror per model instance
//! and composes each mirror from the *view* behaviors of the instance's
//! modules, compiled locally from the source text the model registry holds.
//! Its compiled cache and usage records are its own; it only reads the
//! registry.
//!
//! # Notice handling
//!
//! ```text
//! Recompose:  teardown of detached behaviors (now)
//!             → new module list
//!             → setup of attached behaviors (deferred, declaration order)
//! SetupAll:   stale teardown, every pair and mirror
//!             → recompile every pair
//!             → setup, every pair and mirror
//! Destroyed:  teardown of every attached behavior, mirror dropped
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use lv_capability::{CapabilityTable, CompileError, Compiler, SETUP, TEARDOWN};
use lv_compose::{DeferredQueue, DeferredTask, Entity, Host, Layer};
use lv_core::{BehaviorId, BehaviorKind, BehaviorRef, InstanceId, Turn, Value};
use lv_registry::{Behavior, CompiledCache, ModuleRegistry, UsageSet};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::dispatch::{self, Call, Entities, WorldHost};
use crate::{ModelWorld, Published, RuntimeObserver, ViewNotice};

// ── ViewState ─────────────────────────────────────────────────────────────────

/// Everything of the view world except its mirrors.
struct ViewState {
    compiler: Arc<dyn Compiler>,
    cache:    CompiledCache,
    /// Revisions whose compilation failed here, so each is reported once.
    failed:   FxHashMap<BehaviorId, u32>,
    errors:   Vec<CompileError>,
    usage:    UsageSet,
    /// Behaviors this view has bound, for cleanup on module removal.
    bound:    BTreeMap<BehaviorRef, BehaviorId>,
    now:      Turn,
    queue:    DeferredQueue,
    pending:  VecDeque<Published>,
    logs:     Vec<(InstanceId, String)>,
}

impl ViewState {
    /// The current view table of `behavior`, compiling on a miss.
    fn table(&mut self, behavior: &Behavior) -> Option<Arc<CapabilityTable>> {
        if self.failed.get(&behavior.id) == Some(&behavior.revision) {
            return None;
        }
        match self.cache.ensure(behavior, self.compiler.as_ref())? {
            Ok(table) => Some(table),
            Err(error) => {
                self.failed.insert(behavior.id, behavior.revision);
                self.errors.push(error);
                None
            }
        }
    }
}

/// A view state paired with the registry it reads, for one operation.
struct ViewHost<'r> {
    registry: &'r ModuleRegistry,
    state:    &'r mut ViewState,
}

impl<'r> ViewHost<'r> {
    fn view_behavior(&self, target: &BehaviorRef) -> Option<&'r Behavior> {
        let registry: &'r ModuleRegistry = self.registry;
        registry.lookup_kind(&target.module, &target.behavior, BehaviorKind::View)
    }

    fn view_table(&mut self, target: &BehaviorRef) -> Option<Arc<CapabilityTable>> {
        let behavior = self.view_behavior(target)?;
        self.state.table(behavior)
    }

    /// Record the id behind `target`.
    fn bind(&mut self, target: &BehaviorRef) -> Option<BehaviorId> {
        let id = self.view_behavior(target)?.id;
        self.state.bound.insert(target.clone(), id);
        Some(id)
    }
}

impl Host for ViewHost<'_> {
    fn now(&self) -> Turn {
        self.state.now
    }

    fn resolve_table(&mut self, target: &BehaviorRef) -> Option<Arc<CapabilityTable>> {
        self.view_table(target)
    }

    fn layers(&mut self, modules: &[String]) -> Vec<Layer> {
        let registry = self.registry;
        modules
            .iter()
            .filter_map(|m| registry.module(m))
            .flat_map(|m| m.view.iter())
            .filter_map(|id| registry.behavior(*id))
            .filter_map(|b| self.state.table(b).map(|t| Layer::new(b.target(), t)))
            .collect()
    }

    fn schedule(&mut self, task: DeferredTask) {
        self.state.queue.push(task);
    }

    fn publish(&mut self, scope: &str, event: &str, data: Value) {
        self.state.pending.push_back(Published { scope: scope.to_string(), event: event.to_string(), data });
    }

    fn has_behavior(&self, attached: &[String], spec: &str, method: Option<&str>) -> bool {
        self.registry.has_behavior(attached, spec, method)
    }

    fn log(&mut self, instance: InstanceId, message: &str) {
        self.state.logs.push((instance, message.to_string()));
    }
}

impl WorldHost for ViewHost<'_> {
    fn tier(&self) -> BehaviorKind {
        BehaviorKind::View
    }

    fn next_event(&mut self) -> Option<Published> {
        self.state.pending.pop_front()
    }

    fn next_due(&mut self) -> Option<DeferredTask> {
        self.state.queue.pop_due(self.state.now)
    }

    fn take_logs(&mut self) -> Vec<(InstanceId, String)> {
        std::mem::take(&mut self.state.logs)
    }
}

// ── ViewWorld ─────────────────────────────────────────────────────────────────

pub struct ViewWorld {
    mirrors: Entities,
    state:   ViewState,
}

impl ViewWorld {
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            mirrors: BTreeMap::new(),
            state: ViewState {
                compiler,
                cache:   CompiledCache::new(),
                failed:  FxHashMap::default(),
                errors:  Vec::new(),
                usage:   UsageSet::new(),
                bound:   BTreeMap::new(),
                now:     Turn::ZERO,
                queue:   DeferredQueue::new(),
                pending: VecDeque::new(),
                logs:    Vec::new(),
            },
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Apply the model's notices in order, then settle at turn `now`.
    pub fn apply<O: RuntimeObserver>(
        &mut self,
        notices:  Vec<ViewNotice>,
        registry: &ModuleRegistry,
        now:      Turn,
        observer: &mut O,
    ) {
        self.state.now = self.state.now.max(now);
        for notice in notices {
            self.apply_one(notice, registry, observer);
        }
        self.settle(registry, observer);
    }

    /// Build mirrors for every instance of `model` that has none, scheduling
    /// their view setups.  Used when a view joins a running world.
    pub fn sync_from<O: RuntimeObserver>(&mut self, model: &ModelWorld, observer: &mut O) {
        let registry = model.registry();
        self.state.now = self.state.now.max(model.now());

        let mut joined = 0usize;
        for entity in model.entities() {
            let instance = entity.id();
            if self.mirrors.contains_key(&instance) {
                continue;
            }
            self.mirrors.insert(instance, mirror_of(instance, entity.fields()));

            let attached: Vec<BehaviorRef> = entity
                .modules()
                .iter()
                .filter_map(|m| registry.module(m))
                .flat_map(|m| m.view.iter())
                .filter_map(|id| registry.behavior(*id))
                .map(|b| b.target())
                .collect();
            let notice = ViewNotice::Recompose {
                instance,
                modules: entity.modules().to_vec(),
                detached: Vec::new(),
                attached,
            };
            self.apply_one(notice, registry, observer);
            joined += 1;
        }
        info!(mirrors = joined, "view synchronised with model");
        self.settle(registry, observer);
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn now(&self) -> Turn {
        self.state.now
    }

    pub fn mirror(&self, id: InstanceId) -> Option<&Entity> {
        self.mirrors.get(&id)
    }

    /// All mirrors, in id order.
    pub fn mirrors(&self) -> impl Iterator<Item = &Entity> {
        self.mirrors.values()
    }

    /// Mirrors using each view behavior.
    pub fn usage(&self) -> &UsageSet {
        &self.state.usage
    }

    pub fn cache(&self) -> &CompiledCache {
        &self.state.cache
    }

    pub fn pending_tasks(&self) -> &DeferredQueue {
        &self.state.queue
    }

    // ── Notice handling ───────────────────────────────────────────────────

    fn settle(&mut self, registry: &ModuleRegistry, observer: &mut dyn RuntimeObserver) {
        let mut host = ViewHost { registry, state: &mut self.state };
        dispatch::settle(&mut self.mirrors, &mut host, observer);
        for error in std::mem::take(&mut self.state.errors) {
            observer.on_compile_error(BehaviorKind::View, &error);
        }
    }

    fn apply_one(&mut self, notice: ViewNotice, registry: &ModuleRegistry, observer: &mut dyn RuntimeObserver) {
        match notice {
            ViewNotice::Spawned { instance, fields } => {
                self.mirrors.entry(instance).or_insert_with(|| mirror_of(instance, &fields));
            }
            ViewNotice::Recompose { instance, modules, detached, attached } => {
                self.recompose(instance, &modules, &detached, &attached, registry, observer);
            }
            ViewNotice::SetupAll { targets } => self.setup_all(&targets, registry, observer),
            ViewNotice::Destroyed { instance } => self.destroy(instance, registry, observer),
            ViewNotice::ModulesRemoved { modules } => self.forget_modules(&modules),
        }
    }

    fn recompose(
        &mut self,
        instance: InstanceId,
        modules:  &[String],
        detached: &[BehaviorRef],
        attached: &[BehaviorRef],
        registry: &ModuleRegistry,
        observer: &mut dyn RuntimeObserver,
    ) {
        let mirror = self.mirrors.entry(instance).or_insert_with(|| Entity::new(instance));
        let mut host = ViewHost { registry, state: &mut self.state };

        for target in detached {
            let Some(id) = host.bind(target) else { continue };
            host.state.usage.remove(id, instance);
            if let Some(table) = host.view_table(target).filter(|t| t.has_teardown()) {
                let layer = Layer::new(target.clone(), table);
                dispatch::run(mirror, &mut host, Call::Layer(layer, TEARDOWN), observer);
            }
        }

        mirror.set_modules(modules);

        let now = host.state.now;
        for target in attached {
            let Some(id) = host.bind(target) else { continue };
            if !host.state.usage.insert(id, instance) {
                continue;
            }
            if host.view_table(target).is_some_and(|t| t.has_setup()) {
                host.state.queue.push(DeferredTask::bound(instance, target.clone(), SETUP, Vec::new(), now));
            }
        }
        debug!(%instance, detached = detached.len(), attached = attached.len(), "mirror recomposed");
    }

    /// Re-initialise every mirror using the given behaviors after their code
    /// changed: all stale teardowns, then recompilation, then all setups.
    fn setup_all(&mut self, targets: &[BehaviorRef], registry: &ModuleRegistry, observer: &mut dyn RuntimeObserver) {
        let mut host = ViewHost { registry, state: &mut self.state };

        let mut pairs = Vec::new();
        for target in targets {
            let Some(behavior) = host.view_behavior(target) else {
                debug!(behavior = %target, "setup-all for unknown view behavior");
                continue;
            };
            let (id, revision) = (behavior.id, behavior.revision);
            host.state.bound.insert(target.clone(), id);
            let users = host.state.usage.users(id).to_vec();
            let stale = match host.state.cache.cached_revision(id) {
                Some(cached) if cached != revision => host.state.cache.get_any(id),
                _ => None,
            };
            pairs.push((target, users, stale));
        }

        for (target, users, stale) in &pairs {
            let Some(stale) = stale.as_ref().filter(|t| t.has_teardown()) else { continue };
            for instance in users {
                if let Some(mirror) = self.mirrors.get_mut(instance) {
                    let layer = Layer::new((*target).clone(), Arc::clone(stale));
                    dispatch::run(mirror, &mut host, Call::Layer(layer, TEARDOWN), observer);
                }
            }
        }

        let fresh: Vec<Option<Arc<CapabilityTable>>> =
            pairs.iter().map(|(target, _, _)| host.view_table(target)).collect();

        for ((target, users, _), table) in pairs.iter().zip(fresh) {
            let Some(table) = table.filter(|t| t.has_setup()) else { continue };
            for instance in users {
                if let Some(mirror) = self.mirrors.get_mut(instance) {
                    let layer = Layer::new((*target).clone(), Arc::clone(&table));
                    dispatch::run(mirror, &mut host, Call::Layer(layer, SETUP), observer);
                }
            }
        }
        debug!(behaviors = pairs.len(), "view behaviors re-initialised");
    }

    fn destroy(&mut self, instance: InstanceId, registry: &ModuleRegistry, observer: &mut dyn RuntimeObserver) {
        let Some(mut mirror) = self.mirrors.remove(&instance) else {
            debug!(%instance, "destroy of unknown mirror");
            return;
        };
        let mut host = ViewHost { registry, state: &mut self.state };

        for task in host.state.queue.take_instance(instance) {
            observer.on_orphaned_task(BehaviorKind::View, &task);
        }

        let targets: Vec<BehaviorRef> = host.state.bound.keys().cloned().collect();
        for target in targets {
            let Some(&id) = host.state.bound.get(&target) else { continue };
            if !host.state.usage.remove(id, instance) {
                continue;
            }
            if let Some(table) = host.view_table(&target).filter(|t| t.has_teardown()) {
                let layer = Layer::new(target, table);
                dispatch::run(&mut mirror, &mut host, Call::Layer(layer, TEARDOWN), observer);
            }
        }
        debug!(%instance, "mirror destroyed");
    }

    /// Drop local records of removed modules.  Mirrors keep the names in
    /// their module lists; they resolve to nothing from now on.
    fn forget_modules(&mut self, modules: &[String]) {
        let removed: BTreeSet<&str> = modules.iter().map(String::as_str).collect();
        let gone: Vec<(BehaviorRef, BehaviorId)> = self
            .state
            .bound
            .iter()
            .filter(|(target, _)| removed.contains(target.module.as_str()))
            .map(|(target, id)| (target.clone(), *id))
            .collect();

        for (target, id) in gone {
            let users = self.state.usage.forget(id);
            self.state.cache.evict(id);
            self.state.failed.remove(&id);
            self.state.bound.remove(&target);
            debug!(behavior = %target, users = users.len(), "view behavior forgotten");
        }
    }
}

fn mirror_of(instance: InstanceId, fields: &BTreeMap<String, Value>) -> Entity {
    let mut mirror = Entity::new(instance);
    for (name, value) in fields {
        mirror.set(name, value.clone());
    }
    mirror
}
