//! The compiled capability table.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use lv_core::Value;

use crate::{InvocationResult, Receiver};

/// Lifecycle hook run when a behavior is attached (or its code replaced).
pub const SETUP: &str = "setup";
/// Lifecycle hook run when a behavior is detached (or its code superseded).
pub const TEARDOWN: &str = "teardown";

pub type MethodFn = dyn Fn(&mut dyn Receiver, &[Value]) -> InvocationResult<Value> + Send + Sync;
pub type GetterFn = dyn Fn(&mut dyn Receiver) -> InvocationResult<Value> + Send + Sync;
pub type SetterFn = dyn Fn(&mut dyn Receiver, Value) -> InvocationResult<()> + Send + Sync;

// ── Method ────────────────────────────────────────────────────────────────────

/// One callable member of a capability table.
#[derive(Clone)]
pub struct Method {
    name: String,
    func: Arc<MethodFn>,
}

impl Method {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut dyn Receiver, &[Value]) -> InvocationResult<Value> + Send + Sync + 'static,
    {
        Self { name: name.into(), func: Arc::new(func) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn call(&self, receiver: &mut dyn Receiver, args: &[Value]) -> InvocationResult<Value> {
        (self.func)(receiver, args)
    }
}

// ── Accessor ──────────────────────────────────────────────────────────────────

/// A getter and/or setter override for one member name.
///
/// Accessors run with the *base entity* as receiver: reads and writes they
/// perform bypass every capability layer, so an accessor may back itself with
/// a base field of the same name without recursing.
#[derive(Clone, Default)]
pub struct Accessor {
    pub get: Option<Arc<GetterFn>>,
    pub set: Option<Arc<SetterFn>>,
}

// ── CapabilityTable ───────────────────────────────────────────────────────────

/// The executable member set produced by compiling one behavior's source.
///
/// Members are kept in `BTreeMap`s so `member_names` is ordered identically
/// on every replica.
#[derive(Clone, Default)]
pub struct CapabilityTable {
    name:      String,
    methods:   BTreeMap<String, Method>,
    accessors: BTreeMap<String, Accessor>,
}

impl CapabilityTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Builder-style method registration.
    pub fn with_method<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&mut dyn Receiver, &[Value]) -> InvocationResult<Value> + Send + Sync + 'static,
    {
        self.insert_method(Method::new(name, func));
        self
    }

    /// Builder-style accessor registration.
    pub fn with_accessor(mut self, name: &str, accessor: Accessor) -> Self {
        self.accessors.insert(name.to_string(), accessor);
        self
    }

    /// Add or replace a method.
    pub fn insert_method(&mut self, method: Method) {
        self.methods.insert(method.name.clone(), method);
    }

    /// The capability's own name (e.g. the `capability` header).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn accessor(&self, name: &str) -> Option<&Accessor> {
        self.accessors.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// `true` if the table defines `name` as either a method or an accessor.
    pub fn defines(&self, name: &str) -> bool {
        self.methods.contains_key(name) || self.accessors.contains_key(name)
    }

    #[inline]
    pub fn has_setup(&self) -> bool {
        self.has_method(SETUP)
    }

    #[inline]
    pub fn has_teardown(&self) -> bool {
        self.has_method(TEARDOWN)
    }

    /// All member names, methods first, each group sorted.
    pub fn member_names(&self) -> Vec<&str> {
        self.methods
            .keys()
            .chain(self.accessors.keys())
            .map(String::as_str)
            .collect()
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("accessors", &self.accessors.keys().collect::<Vec<_>>())
            .finish()
    }
}
