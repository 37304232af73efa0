//! Running capability code against a world's entities.
//!
//! Shared by the model and the view world.  Both keep their entities apart
//! from their host state, so a [`Composer`] can borrow one entity and the
//! host at the same time.

use std::collections::BTreeMap;

use lv_compose::{Composer, DeferredTask, Entity, Host, Layer};
use lv_core::{BehaviorKind, InstanceId, MethodPath, Value};
use tracing::debug;

use crate::{Published, RuntimeObserver};

pub(crate) type Entities = BTreeMap<InstanceId, Entity>;

/// What the settle loop needs from a world beyond [`Host`].
pub(crate) trait WorldHost: Host {
    fn tier(&self) -> BehaviorKind;

    /// Next published event awaiting delivery.
    fn next_event(&mut self) -> Option<Published>;

    /// Next deferred task due at or before the current turn.
    fn next_due(&mut self) -> Option<DeferredTask>;

    /// Operator messages logged since the last call.
    fn take_logs(&mut self) -> Vec<(InstanceId, String)>;
}

/// One way of entering capability code.
pub(crate) enum Call<'a> {
    /// A method of a named behavior, or resolved through the layers.
    Path(&'a MethodPath, &'a [Value]),
    /// A method of a specific table, which need not be attached.
    Layer(Layer, &'a str),
}

/// Run `call` on `entity`, reporting a failure to `observer`.
pub(crate) fn run<H: WorldHost>(
    entity:   &mut Entity,
    host:     &mut H,
    call:     Call<'_>,
    observer: &mut dyn RuntimeObserver,
) -> Option<Value> {
    let tier = host.tier();
    let instance = entity.id();
    let result = match call {
        Call::Path(path, args) => Composer::new(entity, host).dispatch(path, args),
        Call::Layer(layer, method) => Composer::new(entity, host).with_current(layer).run(method, &[]),
    };
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            debug!(%tier, %instance, %error, "capability call failed");
            observer.on_invocation_error(tier, instance, &error);
            None
        }
    }
}

/// Run a deferred task against the code that backs its target now.
pub(crate) fn run_task<H: WorldHost>(
    entities: &mut Entities,
    host:     &mut H,
    task:     DeferredTask,
    observer: &mut dyn RuntimeObserver,
) {
    let tier = host.tier();
    let Some(entity) = entities.get_mut(&task.instance) else {
        debug!(%tier, task = %task.describe(), "task for missing instance");
        observer.on_orphaned_task(tier, &task);
        return;
    };
    let path = match &task.target {
        Some(target) => {
            if host.resolve_table(target).is_none() {
                debug!(%tier, task = %task.describe(), "task for missing behavior");
                observer.on_orphaned_task(tier, &task);
                return;
            }
            MethodPath::on(target, task.method.as_str())
        }
        None => MethodPath::bare(task.method.as_str()),
    };
    run(entity, host, Call::Path(&path, &task.args), observer);
}

/// Deliver one event to every matching listener, instances in id order and
/// each instance's handlers in registration order.
pub(crate) fn deliver<H: WorldHost>(
    entities:  &mut Entities,
    host:      &mut H,
    published: &Published,
    observer:  &mut dyn RuntimeObserver,
) {
    let targets: Vec<(InstanceId, MethodPath)> = entities
        .values()
        .flat_map(|e| {
            let id = e.id();
            e.listeners
                .handlers(&published.scope, &published.event)
                .map(move |h| (id, h.clone()))
        })
        .collect();

    let args = std::slice::from_ref(&published.data);
    for (id, handler) in targets {
        if let Some(entity) = entities.get_mut(&id) {
            run(entity, host, Call::Path(&handler, args), observer);
        }
    }
}

/// Deliver pending events and run due tasks until neither is left.
pub(crate) fn settle<H: WorldHost>(entities: &mut Entities, host: &mut H, observer: &mut dyn RuntimeObserver) {
    loop {
        if let Some(published) = host.next_event() {
            deliver(entities, host, &published, observer);
        } else if let Some(task) = host.next_due() {
            run_task(entities, host, task, observer);
        } else {
            break;
        }
    }
    let tier = host.tier();
    for (instance, message) in host.take_logs() {
        observer.on_log(tier, instance, &message);
    }
}
