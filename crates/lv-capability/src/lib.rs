//! `lv-capability` — what a compiled capability is, and how it gets compiled.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                      |
//! |--------------|---------------------------------------------------------------|
//! | [`table`]    | `CapabilityTable`, `Method`, `Accessor`                       |
//! | [`receiver`] | `Receiver` trait — the composed instance seen by capability code |
//! | [`compiler`] | `Compiler` trait (the pluggable, pure compile boundary)       |
//! | [`script`]   | `ScriptCompiler` — reference compiler for a small line language |
//! | [`error`]    | `CompileError`, `InvocationError`                             |
//!
//! # Design notes
//!
//! A capability table is an explicit vtable: method and accessor closures
//! looked up by name.  Nothing in a table refers to an instance; every method
//! receives the composed instance as `&mut dyn Receiver`, so the same table is
//! shared by every instance that attaches the behavior and can be replaced
//! wholesale when the behavior's source changes.

pub mod compiler;
pub mod error;
pub mod receiver;
pub mod script;
pub mod table;

#[cfg(test)]
mod tests;

pub use compiler::Compiler;
pub use error::{CompileError, InvocationError, InvocationResult};
pub use receiver::Receiver;
pub use script::ScriptCompiler;
pub use table::{Accessor, CapabilityTable, GetterFn, Method, MethodFn, SetterFn, SETUP, TEARDOWN};
