//! `ScriptCompiler` — reference compiler for a small line-oriented capability
//! language.
//!
//! # Language
//!
//! ```text
//! capability Counter                 # header names the capability
//!   accessor label -> labelText      # getter/setter routed to a base field
//!   accessor kind = "counter"        # read-only constant
//!
//!   method setup
//!     set count 0
//!     listen bump onBump             # idempotent across repeated setups
//!   end
//!
//!   method onBump(amount)
//!     add count $amount
//!     future 1 announce @count       # bound to Counter's module+behavior
//!   end
//! end
//! ```
//!
//! Statements (one per line):
//!
//! | Statement                               | Effect                               |
//! |-----------------------------------------|--------------------------------------|
//! | `set <member> <rhs>`                    | write member                         |
//! | `add <member> <expr>`                   | integer add (null counts as 0)       |
//! | `push <member> <expr>`                  | append to a list member              |
//! | `invoke <method> <expr>*`               | call a member of this instance       |
//! | `call <target> <method> <expr>*`        | call a method of a named behavior    |
//! | `future <delay> <method> <expr>*`       | deferred call of this capability     |
//! | `listen <event> <handler>`              | subscribe on own scope               |
//! | `subscribe <scope-expr> <event> <handler>` | subscribe on any scope            |
//! | `publish <scope-expr> <event> [expr]`   | publish an event                     |
//! | `log <expr>+`                           | operator message                     |
//! | `return <rhs>`                          | return a value                       |
//!
//! Expressions are single tokens: integers, `"strings"`, `true`, `false`,
//! `null`, `self`, `$param` / `$0` (arguments) and `@member` (member read).
//! A `<rhs>` is an expression, `invoke …`, `call …`, or `has <spec> [method]`.
//! `#` starts a comment outside string literals.
//!
//! Compilation is a pure function of the text: the same source always yields
//! a table with the same members and the same behavior.

mod exec;
mod parse;

use std::sync::Arc;

use tracing::debug;

use crate::table::{Accessor, CapabilityTable, Method};
use crate::{CompileError, Compiler, Receiver};
use lv_core::Value;

use exec::{MethodCtx, run_body};
use parse::{AccessorDef, Script};

/// The reference [`Compiler`].  Stateless.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptCompiler;

impl ScriptCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Compiler for ScriptCompiler {
    fn compile(&self, source: &str, location: &str) -> Result<CapabilityTable, CompileError> {
        let script = parse::parse(source, location)?;
        debug!(
            capability = %script.name,
            methods = script.methods.len(),
            accessors = script.accessors.len(),
            location,
            "compiled capability script"
        );
        Ok(link(script))
    }
}

/// Turn the parsed script into closures.
fn link(script: Script) -> CapabilityTable {
    let mut table = CapabilityTable::new(script.name.clone());

    for def in script.methods {
        let ctx = MethodCtx {
            capability: script.name.clone(),
            method:     def.name.clone(),
        };
        let body = Arc::new(def.body);
        table.insert_method(Method::new(def.name, move |rx, args| {
            run_body(&body, rx, args, &ctx)
        }));
    }

    for (name, def) in script.accessors {
        let accessor = match def {
            AccessorDef::Field(field) => {
                let read = field.clone();
                let write = field;
                Accessor {
                    get: Some(Arc::new(move |rx: &mut dyn Receiver| rx.get(&read))),
                    set: Some(Arc::new(move |rx: &mut dyn Receiver, value: Value| rx.set(&write, value))),
                }
            }
            AccessorDef::Constant(value) => Accessor {
                get: Some(Arc::new(move |_rx: &mut dyn Receiver| Ok(value.clone()))),
                set: None,
            },
        };
        table = table.with_accessor(&name, accessor);
    }

    table
}
