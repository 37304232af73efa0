//! `Replica` — one participant: a model world and, optionally, its view.

use std::sync::Arc;

use lv_capability::Compiler;
use lv_distribution::{ChunkSender, Transfer};
use lv_registry::ModuleDef;
use rand::rngs::SmallRng;
use tracing::debug;

use crate::{LocalBus, ModelEvent, ModelWorld, RuntimeObserver, RuntimeResult, ViewWorld};

/// A model world fed from the bus, plus the view world that mirrors it.
///
/// Create via [`ReplicaBuilder`][crate::ReplicaBuilder].
pub struct Replica {
    pub(crate) model:  ModelWorld,
    pub(crate) view:   Option<ViewWorld>,
    pub(crate) sender: ChunkSender,
    /// Replica-local; never influences model state.
    pub(crate) rng:    SmallRng,
    /// Bus frames consumed so far.
    pub(crate) cursor: usize,
}

impl Replica {
    // ── Message handling ──────────────────────────────────────────────────

    /// Apply one event to the model, then pass the resulting notices to the
    /// view.
    pub fn handle<O: RuntimeObserver>(&mut self, event: ModelEvent, observer: &mut O) -> RuntimeResult<()> {
        let result = self.model.handle(event, observer);
        self.notify_view(observer);
        result
    }

    /// Move to the next turn (a local shortcut for an `Advance` event).
    pub fn advance<O: RuntimeObserver>(&mut self, observer: &mut O) {
        self.model.advance(observer);
        self.notify_view(observer);
    }

    /// Handle every bus event not yet seen.  Returns how many were handled.
    ///
    /// An event that fails is skipped and its error returned; the next call
    /// resumes after it.
    pub fn sync<O: RuntimeObserver>(&mut self, bus: &LocalBus, observer: &mut O) -> RuntimeResult<usize> {
        let events = bus.read_from(self.cursor)?;
        let mut handled = 0;
        for event in events {
            self.cursor += 1;
            handled += 1;
            self.handle(event, observer)?;
        }
        debug!(handled, cursor = self.cursor, "replica synced");
        Ok(handled)
    }

    fn notify_view<O: RuntimeObserver>(&mut self, observer: &mut O) {
        let notices = self.model.take_notices();
        if let Some(view) = self.view.as_mut() {
            view.apply(notices, self.model.registry(), self.model.now(), observer);
        }
    }

    // ── Authoring ─────────────────────────────────────────────────────────

    /// Prepare a distribution round for `defs` under a fresh session key.
    pub fn distribute(&mut self, defs: &[ModuleDef]) -> RuntimeResult<Transfer> {
        Ok(self.sender.prepare(defs, &mut self.rng)?)
    }

    /// Export module definitions.  With `only`, just the named modules, at
    /// fresh detached locations.
    pub fn save(&mut self, only: Option<&[&str]>) -> Vec<ModuleDef> {
        self.model.registry().save(only, &mut self.rng)
    }

    /// Start a view world for an already running model.
    pub fn join_view<O: RuntimeObserver>(&mut self, compiler: Arc<dyn Compiler>, observer: &mut O) {
        self.model.take_notices();
        let mut view = ViewWorld::new(compiler);
        view.sync_from(&self.model, observer);
        self.view = Some(view);
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn model(&self) -> &ModelWorld {
        &self.model
    }

    pub fn view(&self) -> Option<&ViewWorld> {
        self.view.as_ref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}
