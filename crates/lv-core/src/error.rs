//! Framework error type.
//!
//! Sub-crates define their own error enums and wrap `LvError` as one variant
//! via `#[from]` where a core failure can surface through them.

use thiserror::Error;

use crate::InstanceId;

/// The top-level error type for `lv-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum LvError {
    #[error("instance {0} not found")]
    InstanceNotFound(InstanceId),

    #[error("invalid qualified name {0:?}")]
    InvalidName(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for all `lv-*` crates.
pub type LvResult<T> = Result<T, LvError>;
