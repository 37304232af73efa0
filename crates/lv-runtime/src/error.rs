use lv_core::InstanceId;
use lv_distribution::DistributionError;
use lv_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime configuration error: {0}")]
    Config(String),

    #[error("no instance {0}")]
    UnknownInstance(InstanceId),

    #[error("bus frame could not be encoded or decoded: {0}")]
    Wire(#[from] serde_json::Error),

    #[error(transparent)]
    Distribution(#[from] DistributionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
