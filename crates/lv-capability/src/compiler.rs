//! The compile boundary.

use crate::{CapabilityTable, CompileError};

/// Turns a behavior's source text into an executable capability table.
///
/// # Contract
///
/// - Must be a pure function of `source` (and `location`, used only for
///   diagnostics): every replica and every view compiles independently and
///   must end up with behaviorally identical tables.
/// - Must not consult ambient or global state.
/// - Implementations must be `Send + Sync`; one compiler is shared by the
///   model registry and every mirror registry of a process.
pub trait Compiler: Send + Sync {
    fn compile(&self, source: &str, location: &str) -> Result<CapabilityTable, CompileError>;
}

/// Any suitable closure is a compiler, which keeps test doubles small.
impl<F> Compiler for F
where
    F: Fn(&str, &str) -> Result<CapabilityTable, CompileError> + Send + Sync,
{
    fn compile(&self, source: &str, location: &str) -> Result<CapabilityTable, CompileError> {
        self(source, location)
    }
}
