//! Event-handler registrations of one entity.
//!
//! A registration is keyed by `scope:event:handler`, where the handler is the
//! fully qualified `Module$Behavior.method` name.  Setup code typically
//! subscribes unconditionally and is re-run on every reload, so registering
//! an existing key again must change nothing.

use std::collections::BTreeSet;

use lv_core::MethodPath;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listener {
    pub scope:   String,
    pub event:   String,
    pub handler: MethodPath,
}

impl Listener {
    pub fn key(&self) -> String {
        listener_key(&self.scope, &self.event, &self.handler)
    }
}

fn listener_key(scope: &str, event: &str, handler: &MethodPath) -> String {
    format!("{scope}:{event}:{handler}")
}

/// Registrations in the order they were first made.
#[derive(Clone, Debug, Default)]
pub struct ListenerSet {
    entries: Vec<Listener>,
    keys:    BTreeSet<String>,
}

impl ListenerSet {
    /// Register a handler.  Returns `false` if the key was already present.
    pub fn add(&mut self, scope: &str, event: &str, handler: MethodPath) -> bool {
        if !self.keys.insert(listener_key(scope, event, &handler)) {
            return false;
        }
        self.entries.push(Listener { scope: scope.to_string(), event: event.to_string(), handler });
        true
    }

    pub fn remove(&mut self, scope: &str, event: &str, handler: &MethodPath) -> bool {
        if !self.keys.remove(&listener_key(scope, event, handler)) {
            return false;
        }
        self.entries
            .retain(|l| !(l.scope == scope && l.event == event && &l.handler == handler));
        true
    }

    /// Handlers for `(scope, event)`, in registration order.
    pub fn handlers<'a>(&'a self, scope: &'a str, event: &'a str) -> impl Iterator<Item = &'a MethodPath> + 'a {
        self.entries
            .iter()
            .filter(move |l| l.scope == scope && l.event == event)
            .map(|l| &l.handler)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Listener> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.keys.clear();
    }
}
