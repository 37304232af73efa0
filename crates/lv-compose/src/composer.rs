//! `Composer` — an entity seen through its stack of capability tables.

use std::fmt;
use std::mem;
use std::sync::Arc;

use lv_capability::{CapabilityTable, InvocationError, InvocationResult, Receiver};
use lv_core::{BehaviorRef, InstanceId, MethodPath, Value};

use crate::{DeferredTask, Entity, Host};

/// Nested capability calls allowed within one dispatch.  The call that would
/// go deeper fails with [`InvocationError::TooDeep`].
pub const MAX_CALL_DEPTH: usize = 64;

/// One attached behavior's compiled table.
#[derive(Clone, Debug)]
pub struct Layer {
    pub target: BehaviorRef,
    pub table:  Arc<CapabilityTable>,
}

impl Layer {
    pub fn new(target: BehaviorRef, table: Arc<CapabilityTable>) -> Self {
        Self { target, table }
    }
}

/// A composed instance for the duration of one dispatch.
///
/// Built fresh for every call from the entity's current module list, so a
/// change of composition or of the code behind a behavior is visible to the
/// very next call.  Holds no state of its own beyond the current layer and
/// the call depth.
pub struct Composer<'a> {
    entity:  &'a mut Entity,
    host:    &'a mut dyn Host,
    layers:  Vec<Layer>,
    current: Option<Layer>,
    /// Set while an accessor runs: member access goes straight to the base.
    raw:     bool,
    depth:   usize,
}

impl<'a> Composer<'a> {
    pub fn new(entity: &'a mut Entity, host: &'a mut dyn Host) -> Self {
        let layers = host.layers(entity.modules());
        Self { entity, host, layers, current: None, raw: false, depth: 0 }
    }

    /// Make `layer` the current one (it need not be among the attached
    /// layers: detached and superseded tables run this way).
    pub fn with_current(mut self, layer: Layer) -> Self {
        self.current = Some(layer);
        self
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn entity(&self) -> &Entity {
        self.entity
    }

    /// Run `method` of the current layer.
    pub fn run(&mut self, method: &str, args: &[Value]) -> InvocationResult<Value> {
        let Some(layer) = self.current.clone() else {
            return self.invoke(method, args);
        };
        let Some(m) = layer.table.method(method).cloned() else {
            return Err(InvocationError::UnknownMethod {
                capability: layer.target.to_string(),
                method:     method.to_string(),
            });
        };
        self.enter(&layer.target, method)?;
        let result = m.call(self, args);
        self.depth -= 1;
        result
    }

    /// Current nesting of capability calls.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run a handler: a fully qualified path runs that behavior's method;
    /// otherwise the method is resolved through the layers.
    pub fn dispatch(&mut self, path: &MethodPath, args: &[Value]) -> InvocationResult<Value> {
        match path.target() {
            Some(target) => self.call_target(&target, &path.method, args),
            None => self.invoke(&path.method, args),
        }
    }

    fn call_target(&mut self, target: &BehaviorRef, method: &str, args: &[Value]) -> InvocationResult<Value> {
        let table = self.host.resolve_table(target).ok_or_else(|| InvocationError::MissingBehavior {
            behavior: target.to_string(),
            method:   method.to_string(),
        })?;
        self.with_layer(Layer::new(target.clone(), table), method, args)
    }

    /// Run `method` of `layer` with it as the current layer.
    fn with_layer(&mut self, layer: Layer, method: &str, args: &[Value]) -> InvocationResult<Value> {
        let Some(m) = layer.table.method(method).cloned() else {
            return Err(InvocationError::UnknownMethod {
                capability: layer.target.to_string(),
                method:     method.to_string(),
            });
        };
        self.enter(&layer.target, method)?;
        let previous = mem::replace(&mut self.current, Some(layer));
        let result = m.call(self, args);
        self.current = previous;
        self.depth -= 1;
        result
    }

    /// Count one more nested call, refusing past [`MAX_CALL_DEPTH`].
    /// Every successful `enter` is paired with a decrement by the caller.
    fn enter(&mut self, capability: &dyn fmt::Display, method: &str) -> InvocationResult<()> {
        if self.depth >= MAX_CALL_DEPTH {
            tracing::debug!(%capability, method, depth = self.depth, "call depth exceeded");
            return Err(InvocationError::TooDeep {
                capability: capability.to_string(),
                method:     method.to_string(),
                depth:      self.depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Current layer, then attached layers last-attached first.
    fn search_order(&self) -> impl Iterator<Item = &Layer> {
        self.current.iter().chain(self.layers.iter().rev())
    }

    fn current_target(&self) -> Option<&BehaviorRef> {
        self.current.as_ref().map(|l| &l.target)
    }

    fn capability_name(&self) -> String {
        match self.current_target() {
            Some(t) => t.to_string(),
            None => self.entity.id().to_string(),
        }
    }

    fn invalid(&self, err: lv_core::LvError, name: &str) -> InvocationError {
        tracing::debug!(capability = %self.capability_name(), error = %err, "bad qualified name");
        InvocationError::InvalidName(name.to_string())
    }
}

impl Receiver for Composer<'_> {
    fn id(&self) -> InstanceId {
        self.entity.id()
    }

    fn get(&mut self, name: &str) -> InvocationResult<Value> {
        if !self.raw {
            let getter = self
                .search_order()
                .find_map(|l| l.table.accessor(name).and_then(|a| a.get.clone()).map(|g| (l.target.clone(), g)));
            if let Some((target, getter)) = getter {
                self.enter(&target, name)?;
                let previous = mem::replace(&mut self.raw, true);
                let result = getter(self);
                self.raw = previous;
                self.depth -= 1;
                return result;
            }
        }
        Ok(self.entity.get(name))
    }

    fn set(&mut self, name: &str, value: Value) -> InvocationResult<()> {
        if !self.raw {
            let setter = self
                .search_order()
                .find_map(|l| l.table.accessor(name).and_then(|a| a.set.clone()).map(|s| (l.target.clone(), s)));
            if let Some((target, setter)) = setter {
                self.enter(&target, name)?;
                let previous = mem::replace(&mut self.raw, true);
                let result = setter(self, value);
                self.raw = previous;
                self.depth -= 1;
                return result;
            }
        }
        self.entity.set(name, value);
        Ok(())
    }

    fn invoke(&mut self, method: &str, args: &[Value]) -> InvocationResult<Value> {
        let found = self.search_order().find(|l| l.table.has_method(method)).cloned();
        match found {
            Some(layer) => self.with_layer(layer, method, args),
            None => Err(InvocationError::UnknownMethod {
                capability: self.capability_name(),
                method:     method.to_string(),
            }),
        }
    }

    fn call(&mut self, target: &str, method: &str, args: &[Value]) -> InvocationResult<Value> {
        let current = self.current_target().map(|t| t.module.clone());
        let target = BehaviorRef::parse(target, current.as_deref()).map_err(|e| self.invalid(e, target))?;
        self.call_target(&target, method, args)
    }

    fn future(&mut self, delay: u64, method: &str, args: &[Value]) -> InvocationResult<()> {
        let path = MethodPath::parse(method)
            .map_err(|e| self.invalid(e, method))?
            .qualify(self.current_target());
        let task = DeferredTask {
            instance: self.entity.id(),
            target:   path.target(),
            method:   path.method,
            args:     args.to_vec(),
            due:      self.host.now() + delay,
        };
        self.host.schedule(task);
        Ok(())
    }

    fn subscribe(&mut self, scope: &str, event: &str, handler: &str) -> InvocationResult<()> {
        let path = MethodPath::parse(handler)
            .map_err(|e| self.invalid(e, handler))?
            .qualify(self.current_target());
        self.entity.listeners.add(scope, event, path);
        Ok(())
    }

    fn publish(&mut self, scope: &str, event: &str, data: Value) {
        self.host.publish(scope, event, data);
    }

    fn has(&mut self, spec: &str, method: Option<&str>) -> bool {
        self.host.has_behavior(self.entity.modules(), spec, method)
    }

    fn log(&mut self, message: &str) {
        let id = self.entity.id();
        self.host.log(id, message);
    }
}

impl PartialEq<Entity> for Composer<'_> {
    fn eq(&self, other: &Entity) -> bool {
        self.entity.id() == other.id()
    }
}

impl PartialEq<InstanceId> for Composer<'_> {
    fn eq(&self, other: &InstanceId) -> bool {
        self.entity.id() == *other
    }
}
