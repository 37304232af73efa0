//! `ModelWorld` — the replicated tier.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use lv_capability::{CapabilityTable, SETUP, TEARDOWN};
use lv_compose::{DeferredQueue, DeferredTask, Entity, Host, Layer};
use lv_core::{BehaviorKind, BehaviorRef, InstanceId, MethodPath, Turn, TurnClock, Value};
use lv_distribution::{DistributionMessage, LoadReceiver};
use lv_registry::{Dispatch, Lifecycle, LoadReport, ModuleDef, ModuleRegistry};
use tracing::{debug, info, warn};

use crate::dispatch::{self, Call, Entities, WorldHost};
use crate::{EntitySnapshot, ModelEvent, Published, RuntimeError, RuntimeObserver, RuntimeResult, ViewNotice};

// ── ModelHost ─────────────────────────────────────────────────────────────────

/// Everything of the model world except its entities.
pub(crate) struct ModelHost {
    registry: ModuleRegistry,
    clock:    TurnClock,
    queue:    DeferredQueue,
    pending:  VecDeque<Published>,
    notices:  Vec<ViewNotice>,
    logs:     Vec<(InstanceId, String)>,
}

impl Host for ModelHost {
    fn now(&self) -> Turn {
        self.clock.now()
    }

    fn resolve_table(&mut self, target: &BehaviorRef) -> Option<Arc<CapabilityTable>> {
        self.registry.model_table(target)
    }

    fn layers(&mut self, modules: &[String]) -> Vec<Layer> {
        self.registry
            .model_layers(modules)
            .into_iter()
            .map(|(target, table)| Layer::new(target, table))
            .collect()
    }

    fn schedule(&mut self, task: DeferredTask) {
        self.queue.push(task);
    }

    fn publish(&mut self, scope: &str, event: &str, data: Value) {
        self.pending.push_back(Published { scope: scope.to_string(), event: event.to_string(), data });
    }

    fn has_behavior(&self, attached: &[String], spec: &str, method: Option<&str>) -> bool {
        self.registry.has_behavior(attached, spec, method)
    }

    fn log(&mut self, instance: InstanceId, message: &str) {
        self.logs.push((instance, message.to_string()));
    }
}

impl WorldHost for ModelHost {
    fn tier(&self) -> BehaviorKind {
        BehaviorKind::Model
    }

    fn next_event(&mut self) -> Option<Published> {
        self.pending.pop_front()
    }

    fn next_due(&mut self) -> Option<DeferredTask> {
        self.queue.pop_due(self.clock.now())
    }

    fn take_logs(&mut self) -> Vec<(InstanceId, String)> {
        std::mem::take(&mut self.logs)
    }
}

// ── ModelWorld ────────────────────────────────────────────────────────────────

/// The deterministic tier of one replica: instances, the module registry,
/// and the deferred-task queue, all advanced by [`ModelEvent`]s only.
///
/// View behaviors are never run here.  Changes that concern them are queued
/// as [`ViewNotice`]s for the replica's view world.
pub struct ModelWorld {
    entities:      Entities,
    host:          ModelHost,
    receiver:      LoadReceiver,
    next_instance: InstanceId,
}

impl ModelWorld {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            entities: BTreeMap::new(),
            host: ModelHost {
                registry,
                clock:   TurnClock::new(),
                queue:   DeferredQueue::new(),
                pending: VecDeque::new(),
                notices: Vec::new(),
                logs:    Vec::new(),
            },
            receiver:      LoadReceiver::new(),
            next_instance: InstanceId(1),
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Apply one replicated event, then settle: deliver published events and
    /// run every deferred task that is due.
    ///
    /// Capability failures are reported to `observer` and never abort the
    /// event.  An error is returned only for an event that names an unknown
    /// instance; nothing was applied in that case.
    pub fn handle<O: RuntimeObserver>(&mut self, event: ModelEvent, observer: &mut O) -> RuntimeResult<()> {
        let result = self.apply(event, observer);
        dispatch::settle(&mut self.entities, &mut self.host, observer);
        result
    }

    /// Move to the next turn and run what became due.
    pub fn advance<O: RuntimeObserver>(&mut self, observer: &mut O) -> Turn {
        self.host.clock.advance();
        dispatch::settle(&mut self.entities, &mut self.host, observer);
        self.host.clock.now()
    }

    /// Load definitions directly, outside any distribution round (e.g. the
    /// system modules every replica starts with).
    pub fn load<O: RuntimeObserver>(&mut self, defs: &[ModuleDef], observer: &mut O) -> RuntimeResult<LoadReport> {
        let report = self.host.registry.load_libraries(defs)?;
        self.apply_report(&report, observer);
        dispatch::settle(&mut self.entities, &mut self.host, observer);
        Ok(report)
    }

    /// Notices for the view tier accumulated since the last call.
    pub fn take_notices(&mut self) -> Vec<ViewNotice> {
        std::mem::take(&mut self.host.notices)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn now(&self) -> Turn {
        self.host.clock.now()
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.host.registry
    }

    pub fn entity(&self, id: InstanceId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// All instances, in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn pending_tasks(&self) -> &DeferredQueue {
        &self.host.queue
    }

    pub fn load_receiver(&self) -> &LoadReceiver {
        &self.receiver
    }

    /// The id the next `Spawn` will allocate.
    pub fn next_instance_id(&self) -> InstanceId {
        self.next_instance
    }

    /// Replicated state of every instance, in id order.
    pub fn snapshot(&self) -> Vec<EntitySnapshot> {
        self.entities
            .values()
            .map(|e| EntitySnapshot {
                id:        e.id(),
                fields:    e.fields().clone(),
                modules:   e.modules().to_vec(),
                listeners: e.listeners.iter().map(|l| l.key()).collect(),
            })
            .collect()
    }

    // ── Event application ─────────────────────────────────────────────────

    fn apply(&mut self, event: ModelEvent, observer: &mut dyn RuntimeObserver) -> RuntimeResult<()> {
        match event {
            ModelEvent::Distribution(message) => {
                self.receive(message, observer);
                Ok(())
            }
            ModelEvent::Spawn { modules, fields } => {
                self.spawn(&modules, fields, observer);
                Ok(())
            }
            ModelEvent::SetModules { instance, modules } => self.recompose(instance, &modules, observer),
            ModelEvent::Destroy { instance } => self.destroy(instance, observer),
            ModelEvent::Invoke { instance, method, args } => {
                let entity = self.entities.get_mut(&instance).ok_or(RuntimeError::UnknownInstance(instance))?;
                let path = MethodPath::bare(method);
                dispatch::run(entity, &mut self.host, Call::Path(&path, &args), observer);
                Ok(())
            }
            ModelEvent::Publish { scope, event, data } => {
                self.host.pending.push_back(Published { scope, event, data });
                Ok(())
            }
            ModelEvent::DisableCodeLoad => {
                self.host.registry.set_code_load_enabled(false);
                Ok(())
            }
            ModelEvent::Advance => {
                self.host.clock.advance();
                Ok(())
            }
        }
    }

    fn receive(&mut self, message: DistributionMessage, observer: &mut dyn RuntimeObserver) {
        match self.receiver.handle(message, &mut self.host.registry) {
            Ok(None) => {}
            Ok(Some(applied)) => {
                self.apply_report(&applied.report, observer);
                if !applied.report.disabled {
                    observer.on_persist_requested(applied.session_key);
                }
            }
            Err(error) => {
                warn!(%error, "distribution round rejected");
                observer.on_rejected_payload(&error);
            }
        }
    }

    /// Run a load's model effects and queue its view notices.
    fn apply_report(&mut self, report: &LoadReport, observer: &mut dyn RuntimeObserver) {
        for failure in &report.failures {
            observer.on_compile_error(BehaviorKind::Model, failure);
        }
        observer.on_load(report);

        for effect in &report.effects {
            self.apply_effect(effect.clone(), observer);
        }
        if !report.view_setup_all.is_empty() {
            self.host.notices.push(ViewNotice::SetupAll { targets: report.view_setup_all.clone() });
        }
        if !report.removed.is_empty() {
            self.host.notices.push(ViewNotice::ModulesRemoved { modules: report.removed.clone() });
        }
    }

    fn apply_effect(&mut self, effect: Lifecycle, observer: &mut dyn RuntimeObserver) {
        let now = self.host.clock.now();
        match effect {
            Lifecycle::Setup { instance, target, dispatch: Dispatch::Immediate } => {
                self.run_on(instance, &target, SETUP, observer);
            }
            Lifecycle::Teardown { instance, target, dispatch: Dispatch::Immediate } => {
                self.run_on(instance, &target, TEARDOWN, observer);
            }
            Lifecycle::Setup { instance, target, dispatch: Dispatch::Deferred } => {
                self.host.queue.push(DeferredTask::bound(instance, target, SETUP, Vec::new(), now));
            }
            Lifecycle::Teardown { instance, target, dispatch: Dispatch::Deferred } => {
                self.host.queue.push(DeferredTask::bound(instance, target, TEARDOWN, Vec::new(), now));
            }
            Lifecycle::Retire { instance, target, table } => {
                let Some(entity) = self.entities.get_mut(&instance) else {
                    debug!(%instance, behavior = %target, "retire for missing instance");
                    return;
                };
                dispatch::run(entity, &mut self.host, Call::Layer(Layer::new(target, table), TEARDOWN), observer);
            }
            Lifecycle::ViewAttach { .. } | Lifecycle::ViewDetach { .. } => {
                debug!(effect = ?effect, "view effect outside a recomposition ignored");
            }
        }
    }

    fn run_on(&mut self, instance: InstanceId, target: &BehaviorRef, method: &str, observer: &mut dyn RuntimeObserver) {
        let Some(entity) = self.entities.get_mut(&instance) else {
            debug!(%instance, behavior = %target, method, "hook for missing instance");
            return;
        };
        let path = MethodPath::on(target, method);
        dispatch::run(entity, &mut self.host, Call::Path(&path, &[]), observer);
    }

    fn spawn(&mut self, modules: &[String], fields: BTreeMap<String, Value>, observer: &mut dyn RuntimeObserver) {
        let instance = self.next_instance;
        self.next_instance = instance.next();

        let mut entity = Entity::new(instance);
        for (name, value) in fields {
            entity.set(&name, value);
        }
        self.host.notices.push(ViewNotice::Spawned { instance, fields: entity.fields().clone() });
        self.entities.insert(instance, entity);
        info!(%instance, modules = modules.len(), "instance spawned");

        // The instance was just inserted.
        let _ = self.recompose(instance, modules, observer);
    }

    /// Replace the module list: detached modules' teardowns are deferred,
    /// newly attached modules run `setup` now.
    fn recompose(&mut self, instance: InstanceId, modules: &[String], observer: &mut dyn RuntimeObserver) -> RuntimeResult<()> {
        let entity = self.entities.get_mut(&instance).ok_or(RuntimeError::UnknownInstance(instance))?;
        let diff = entity.set_modules(modules);
        if diff.is_empty() {
            return Ok(());
        }
        let current = entity.modules().to_vec();

        let registry = &mut self.host.registry;
        let mut effects = Vec::new();
        for module in &diff.detached {
            effects.extend(registry.detach(instance, module, Dispatch::Deferred));
        }
        for module in &diff.attached {
            effects.extend(registry.attach(instance, module));
        }

        let (mut detached, mut attached) = (Vec::new(), Vec::new());
        for effect in effects {
            match effect {
                Lifecycle::ViewDetach { target, .. } => detached.push(target),
                Lifecycle::ViewAttach { target, .. } => attached.push(target),
                other => self.apply_effect(other, observer),
            }
        }
        debug!(%instance, detached = ?diff.detached, attached = ?diff.attached, "instance recomposed");
        self.host.notices.push(ViewNotice::Recompose { instance, modules: current, detached, attached });
        Ok(())
    }

    /// Remove an instance.  Pending teardowns and the teardowns of every
    /// attached behavior run now; other pending tasks are dropped.
    fn destroy(&mut self, instance: InstanceId, observer: &mut dyn RuntimeObserver) -> RuntimeResult<()> {
        let mut entity = self.entities.remove(&instance).ok_or(RuntimeError::UnknownInstance(instance))?;

        for task in self.host.queue.take_instance(instance) {
            match (&task.target, task.method.as_str()) {
                (Some(target), TEARDOWN) => {
                    let path = MethodPath::on(target, TEARDOWN);
                    dispatch::run(&mut entity, &mut self.host, Call::Path(&path, &[]), observer);
                }
                _ => observer.on_orphaned_task(BehaviorKind::Model, &task),
            }
        }

        let modules = entity.modules().to_vec();
        for effect in self.host.registry.release(instance, &modules) {
            if let Lifecycle::Teardown { target, .. } = effect {
                let path = MethodPath::on(&target, TEARDOWN);
                dispatch::run(&mut entity, &mut self.host, Call::Path(&path, &[]), observer);
            }
        }

        info!(%instance, "instance destroyed");
        self.host.notices.push(ViewNotice::Destroyed { instance });
        Ok(())
    }
}
