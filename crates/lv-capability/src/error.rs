use thiserror::Error;

/// The compiler rejected a capability's source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}:{line}: {message}")]
pub struct CompileError {
    /// Location hint passed to the compiler (module file path).
    pub location: String,
    /// 1-based source line, 0 when the error is not tied to a line.
    pub line:     usize,
    pub message:  String,
}

impl CompileError {
    pub fn new(location: &str, line: usize, message: impl Into<String>) -> Self {
        Self { location: location.to_string(), line, message: message.into() }
    }
}

/// A call into capability code failed.
///
/// Always names the capability and method so the operator can find it.
/// Callers report these per call; they never abort the triggering message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("a method named {method} not found in {capability}")]
    UnknownMethod { capability: String, method: String },

    #[error("behavior {behavior} not found (calling {method})")]
    MissingBehavior { behavior: String, method: String },

    #[error("call depth {depth} exceeded in {capability}.{method}()")]
    TooDeep { capability: String, method: String, depth: usize },

    #[error("invalid name {0:?}")]
    InvalidName(String),

    #[error("error in {capability}.{method}(): {message}")]
    Failed { capability: String, method: String, message: String },
}

pub type InvocationResult<T> = Result<T, InvocationError>;
