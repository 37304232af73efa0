//! `ReplicaBuilder` — fluent API for constructing a [`Replica`].

use std::sync::Arc;

use lv_capability::{Compiler, ScriptCompiler};
use lv_distribution::ChunkSender;
use lv_registry::{ModuleDef, ModuleRegistry};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::{ModelWorld, Replica, RuntimeConfig, RuntimeResult, TracingObserver, ViewWorld};

/// Builder for [`Replica`].
///
/// # Required
///
/// - `config` — supplied to `new`.
///
/// # Optional
///
/// - `compiler` — defaults to [`ScriptCompiler`].
/// - `bootstrap` — definitions loaded before the first event (typically the
///   system modules).  They are loaded locally, not distributed.
///
/// # Example
///
/// ```rust,ignore
/// let replica = ReplicaBuilder::new(RuntimeConfig::default())
///     .bootstrap(system_modules)
///     .build()?;
/// ```
pub struct ReplicaBuilder {
    config:    RuntimeConfig,
    compiler:  Option<Arc<dyn Compiler>>,
    bootstrap: Vec<ModuleDef>,
}

impl ReplicaBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config, compiler: None, bootstrap: Vec::new() }
    }

    pub fn compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn bootstrap(mut self, defs: Vec<ModuleDef>) -> Self {
        self.bootstrap.extend(defs);
        self
    }

    /// Validate the configuration and construct the replica.
    pub fn build(self) -> RuntimeResult<Replica> {
        self.config.validate()?;

        let compiler: Arc<dyn Compiler> = match self.compiler {
            Some(compiler) => compiler,
            None => Arc::new(ScriptCompiler::new()),
        };
        let registry = ModuleRegistry::new(self.config.registry.clone(), Arc::clone(&compiler));
        let mut model = ModelWorld::new(registry);
        if !self.bootstrap.is_empty() {
            model.load(&self.bootstrap, &mut TracingObserver)?;
        }
        // Nothing is mirrored yet; bootstrap notices would only re-run setups.
        model.take_notices();

        let view = self.config.view.then(|| ViewWorld::new(compiler));

        Ok(Replica {
            model,
            view,
            sender: ChunkSender::new(self.config.chunks.clone()),
            rng:    SmallRng::seed_from_u64(self.config.seed),
            cursor: 0,
        })
    }
}
