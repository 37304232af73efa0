use serde::{Deserialize, Serialize};

/// Registry configuration.
///
/// # Directory filter
///
/// When `behavior_dirs` is non-empty, a module whose location directory (the
/// part before the last `/`) does not start with one of the entries is
/// skipped on load.  Detached locations are always accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Accepted location prefixes (user and system behavior directories).
    pub behavior_dirs:     Vec<String>,
    /// Initial state of the code-load switch.
    pub code_load_enabled: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { behavior_dirs: Vec::new(), code_load_enabled: true }
    }
}

impl RegistryConfig {
    /// `true` if a module at `location` passes the directory filter.
    pub fn accepts(&self, location: &str) -> bool {
        if self.behavior_dirs.is_empty() || location.is_empty() || crate::behavior::is_detached(location) {
            return true;
        }
        let dir = location.rsplit_once('/').map_or("", |(dir, _)| dir);
        self.behavior_dirs.iter().any(|prefix| dir.starts_with(prefix.as_str()))
    }
}
