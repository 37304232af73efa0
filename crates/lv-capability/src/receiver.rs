//! The `Receiver` trait — the instance as seen from inside capability code.

use lv_core::{InstanceId, Value};

use crate::InvocationResult;

/// The composed instance a capability method runs against.
///
/// Implemented by `lv-compose`'s `Composer`.  Member reads and writes follow
/// the layered resolution rules (current capability, then attached
/// capabilities last-attached-first, then the base entity); everything else
/// is routed to the hosting world.
///
/// Target strings follow [`lv_core::names`]: `"Module$Behavior"` or a bare
/// `"Behavior"` in the calling capability's module.
pub trait Receiver {
    /// Identity of the underlying base entity.  Never changes under
    /// composition.
    fn id(&self) -> InstanceId;

    /// Read a member.
    fn get(&mut self, name: &str) -> InvocationResult<Value>;

    /// Write a member (through a setter override if one is attached).
    fn set(&mut self, name: &str, value: Value) -> InvocationResult<()>;

    /// Invoke a member method on this composed instance.
    fn invoke(&mut self, method: &str, args: &[Value]) -> InvocationResult<Value>;

    /// Invoke `method` of a specific behavior on this instance.
    fn call(&mut self, target: &str, method: &str, args: &[Value]) -> InvocationResult<Value>;

    /// Schedule `method` of the calling capability `delay` turns from now.
    ///
    /// The task is bound to the capability's module and behavior *names*, so
    /// it runs whatever code backs that behavior when it fires.
    fn future(&mut self, delay: u64, method: &str, args: &[Value]) -> InvocationResult<()>;

    /// Register `handler` for `event` on this instance's own scope.
    fn listen(&mut self, event: &str, handler: &str) -> InvocationResult<()> {
        let scope = self.id().scope();
        self.subscribe(&scope, event, handler)
    }

    /// Register `handler` for `event` on `scope`.  Registering the same
    /// `(scope, event, handler)` again is a no-op.
    fn subscribe(&mut self, scope: &str, event: &str, handler: &str) -> InvocationResult<()>;

    /// Publish an event.  Model-tier publications are delivered after the
    /// current handler completes.
    fn publish(&mut self, scope: &str, event: &str, data: Value);

    /// `spec` is `"Module"` or `"Module$Behavior"`.  `true` if the module is
    /// attached to this instance (and has the behavior, and the behavior
    /// defines `method`, when given).
    fn has(&mut self, spec: &str, method: Option<&str>) -> bool;

    /// Report a message on the operator channel.
    fn log(&mut self, message: &str);
}
