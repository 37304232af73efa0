//! `DeferredQueue` — turn-keyed queue of name-bound deferred calls.
//!
//! A task records *names*, never a compiled table: when it fires it is
//! resolved against whatever code backs `(module, behavior)` at that moment.
//! Work scheduled before a reload therefore runs the new code.
//!
//! `BTreeMap<Turn, VecDeque<_>>` gives ordering by due turn, FIFO within a
//! turn, and O(log T) push and pop where T is the number of distinct pending
//! turns.

use std::collections::{BTreeMap, VecDeque};

use lv_core::{BehaviorRef, InstanceId, Turn, Value};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferredTask {
    pub instance: InstanceId,
    /// `None` targets whatever layer of the instance defines `method`.
    pub target:   Option<BehaviorRef>,
    pub method:   String,
    pub args:     Vec<Value>,
    pub due:      Turn,
}

impl DeferredTask {
    /// A task bound to a specific behavior.
    pub fn bound(instance: InstanceId, target: BehaviorRef, method: &str, args: Vec<Value>, due: Turn) -> Self {
        Self { instance, target: Some(target), method: method.to_string(), args, due }
    }

    /// `"Module$Behavior.method"`, or the bare method name.
    pub fn describe(&self) -> String {
        match &self.target {
            Some(t) => format!("{t}.{}", self.method),
            None => self.method.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DeferredQueue {
    inner: BTreeMap<Turn, VecDeque<DeferredTask>>,
    /// Cached total task count for O(1) `len()`.
    total: usize,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: DeferredTask) {
        self.inner.entry(task.due).or_default().push_back(task);
        self.total += 1;
    }

    /// Remove and return the oldest task due at or before `now`.
    pub fn pop_due(&mut self, now: Turn) -> Option<DeferredTask> {
        let mut entry = self.inner.first_entry()?;
        if *entry.key() > now {
            return None;
        }
        let task = entry.get_mut().pop_front();
        if entry.get().is_empty() {
            entry.remove();
        }
        if task.is_some() {
            self.total -= 1;
        }
        task
    }

    /// Remove every task for `instance`, in firing order.
    pub fn take_instance(&mut self, instance: InstanceId) -> Vec<DeferredTask> {
        let mut taken = Vec::new();
        for queue in self.inner.values_mut() {
            let (mine, rest): (VecDeque<_>, VecDeque<_>) =
                queue.drain(..).partition(|t| t.instance == instance);
            taken.extend(mine);
            *queue = rest;
        }
        self.inner.retain(|_, q| !q.is_empty());
        self.total -= taken.len();
        taken
    }

    /// The earliest turn with a pending task.
    pub fn next_due(&self) -> Option<Turn> {
        self.inner.keys().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeferredTask> {
        self.inner.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
