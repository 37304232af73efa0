//! Replica configuration.

use lv_distribution::ChunkConfig;
use lv_registry::RegistryConfig;
use serde::{Deserialize, Serialize};

use crate::{RuntimeError, RuntimeResult};

/// Configuration of one replica.  Every field has a default, so a JSON
/// document only needs the values it changes:
///
/// ```json
/// { "seed": 7,
///   "registry": { "behaviorDirs": ["behaviors/default"], "codeLoadEnabled": true },
///   "chunks": { "chunkSize": 2880, "throttleThreshold": 80000, "paceMs": 16 } }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Seed of the replica-local RNG (session keys, detached locations).
    pub seed:     u64,
    pub registry: RegistryConfig,
    pub chunks:   ChunkConfig,
    /// Build a view world alongside the model world.
    pub view:     bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            seed:     0,
            registry: RegistryConfig::default(),
            chunks:   ChunkConfig::default(),
            view:     true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(json: &str) -> RuntimeResult<Self> {
        let config: RuntimeConfig = serde_json::from_str(json).map_err(|e| RuntimeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        if self.chunks.chunk_size == 0 {
            return Err(RuntimeError::Config("chunks.chunkSize must be positive".into()));
        }
        if self.registry.behavior_dirs.iter().any(String::is_empty) {
            return Err(RuntimeError::Config("registry.behaviorDirs may not contain an empty entry".into()));
        }
        Ok(())
    }
}
