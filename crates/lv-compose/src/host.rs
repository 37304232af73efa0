//! The `Host` trait — a world as seen by a composer.

use std::sync::Arc;

use lv_capability::CapabilityTable;
use lv_core::{BehaviorRef, InstanceId, Turn, Value};

use crate::{DeferredTask, Layer};

/// Everything a [`Composer`][crate::Composer] routes outside its entity.
///
/// Implemented by the model world (tables from the module registry) and by
/// the view world (tables from its own mirror cache).
pub trait Host {
    /// The world's current turn.
    fn now(&self) -> Turn;

    /// The current table of `target` on this tier.
    fn resolve_table(&mut self, target: &BehaviorRef) -> Option<Arc<CapabilityTable>>;

    /// Compiled layers for an entity composed of `modules`, in composition
    /// order.
    fn layers(&mut self, modules: &[String]) -> Vec<Layer>;

    fn schedule(&mut self, task: DeferredTask);

    fn publish(&mut self, scope: &str, event: &str, data: Value);

    /// See [`Receiver::has`][lv_capability::Receiver::has].
    fn has_behavior(&self, attached: &[String], spec: &str, method: Option<&str>) -> bool;

    /// Operator message from capability code running on `instance`.
    fn log(&mut self, instance: InstanceId, message: &str);
}
