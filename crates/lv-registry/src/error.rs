use lv_core::LvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid module definition {name:?}: {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error(transparent)]
    Core(#[from] LvError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
