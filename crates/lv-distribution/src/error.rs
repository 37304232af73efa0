use lv_registry::RegistryError;
use thiserror::Error;

use crate::SessionKey;

#[derive(Debug, Error)]
pub enum DistributionError {
    /// The assembled payload could not be decoded or failed validation.
    /// Nothing was applied.
    #[error("malformed payload in session {session}: {reason}")]
    Malformed { session: SessionKey, reason: String },

    #[error("invalid module {name:?}: {reason}")]
    InvalidModule { name: String, reason: String },

    #[error("cannot encode module definitions: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type DistributionResult<T> = Result<T, DistributionError>;
