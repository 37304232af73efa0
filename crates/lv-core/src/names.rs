//! Behavior kinds and qualified capability names.
//!
//! Capability code addresses other capabilities by string:
//!
//! ```text
//! "Module$Behavior"          explicit module (external name) and behavior
//! "Behavior"                 behavior in the calling capability's module
//! "Module$Behavior.method"   handler string naming a method
//! "Behavior.method"          handler in the calling capability's module
//! "method"                   method of the calling capability (or the base)
//! ```
//!
//! Parsing is purely syntactic; resolution against the registry happens in
//! the crates that own the registry.

use std::fmt;

use crate::{LvError, LvResult};

// ── BehaviorKind ──────────────────────────────────────────────────────────────

/// Which tier a Behavior's code runs on.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum BehaviorKind {
    /// Deterministic, replicated model-tier capability.
    Model,
    /// Non-replicated, per-participant view-tier capability.
    View,
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehaviorKind::Model => write!(f, "model-capability"),
            BehaviorKind::View  => write!(f, "view-capability"),
        }
    }
}

// ── BehaviorRef ───────────────────────────────────────────────────────────────

/// A `(module external name, behavior name)` pair.
///
/// Deferred tasks and view notifications carry this instead of a table
/// reference, so they always resolve against the *current* registry state.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BehaviorRef {
    pub module:   String,
    pub behavior: String,
}

impl BehaviorRef {
    pub fn new(module: impl Into<String>, behavior: impl Into<String>) -> Self {
        Self { module: module.into(), behavior: behavior.into() }
    }

    /// Parse `"Module$Behavior"` or `"Behavior"`.
    ///
    /// A bare behavior name is qualified with `current_module`; without one
    /// the name is rejected.
    pub fn parse(spec: &str, current_module: Option<&str>) -> LvResult<BehaviorRef> {
        match spec.split_once('$') {
            Some((module, behavior)) if !module.is_empty() && !behavior.is_empty() => {
                Ok(BehaviorRef::new(module, behavior))
            }
            Some(_) => Err(LvError::InvalidName(spec.to_string())),
            None if spec.is_empty() => Err(LvError::InvalidName(spec.to_string())),
            None => match current_module {
                Some(module) => Ok(BehaviorRef::new(module, spec)),
                None => Err(LvError::InvalidName(spec.to_string())),
            },
        }
    }
}

impl fmt::Display for BehaviorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}${}", self.module, self.behavior)
    }
}

// ── MethodPath ────────────────────────────────────────────────────────────────

/// A possibly partially qualified method name (`[Module$][Behavior.]method`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodPath {
    pub module:   Option<String>,
    pub behavior: Option<String>,
    pub method:   String,
}

impl MethodPath {
    /// A method on the base entity (or the current capability).
    pub fn bare(method: impl Into<String>) -> Self {
        Self { module: None, behavior: None, method: method.into() }
    }

    /// A fully qualified method of a specific behavior.
    pub fn on(target: &BehaviorRef, method: impl Into<String>) -> Self {
        Self {
            module:   Some(target.module.clone()),
            behavior: Some(target.behavior.clone()),
            method:   method.into(),
        }
    }

    /// Parse a handler string.  A `$` or `.` in position 0 is not treated as
    /// a separator.
    pub fn parse(handler: &str) -> LvResult<MethodPath> {
        let mut rest = handler;
        let mut module = None;
        let mut behavior = None;

        if let Some(dollar) = rest.find('$').filter(|&i| i >= 1) {
            module = Some(rest[..dollar].to_string());
            rest = &rest[dollar + 1..];
        }
        if let Some(dot) = rest.find('.').filter(|&i| i >= 1) {
            behavior = Some(rest[..dot].to_string());
            rest = &rest[dot + 1..];
        }
        if rest.is_empty() || rest.contains(['$', '.']) {
            return Err(LvError::InvalidName(handler.to_string()));
        }
        Ok(MethodPath { module, behavior, method: rest.to_string() })
    }

    /// Fill the missing module / behavior parts from the calling capability.
    pub fn qualify(mut self, current: Option<&BehaviorRef>) -> MethodPath {
        if let Some(cur) = current {
            if self.module.is_none() {
                self.module = Some(cur.module.clone());
            }
            if self.behavior.is_none() {
                self.behavior = Some(cur.behavior.clone());
            }
        }
        self
    }

    /// The behavior this path targets, if fully qualified.
    pub fn target(&self) -> Option<BehaviorRef> {
        match (&self.module, &self.behavior) {
            (Some(m), Some(b)) => Some(BehaviorRef::new(m.clone(), b.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for MethodPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.module, &self.behavior) {
            (Some(m), Some(b)) => write!(f, "{m}${b}.{}", self.method),
            (None, Some(b))    => write!(f, "{b}.{}", self.method),
            _                  => write!(f, "{}", self.method),
        }
    }
}
