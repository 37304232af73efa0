//! `LoadReceiver` — the receiving end of a distribution round.
//!
//! At most one session is in flight.  `LoadStart` always wins: it drops any
//! partially received session and starts an empty one.  Chunks and
//! completions for any other key are discarded without comment, which is
//! what lets a sender abandon a round by simply starting another.

use lv_registry::{LoadReport, ModuleDef, ModuleRegistry};
use tracing::{debug, info, warn};

use crate::{DistributionError, DistributionMessage, DistributionResult, SessionKey};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LoadPhase {
    Idle,
    Receiving,
    /// Payload complete; decoding and validating.
    Assembling,
    /// Handed to the registry.  Immediately followed by `Idle`.
    Applied,
}

/// A decoded, validated payload.
#[derive(Clone, Debug)]
pub struct Assembled {
    pub session_key: SessionKey,
    pub defs:        Vec<ModuleDef>,
}

/// Outcome of a completed round.  Its existence is the persist trigger.
#[derive(Debug)]
pub struct AppliedLoad {
    pub session_key: SessionKey,
    pub report:      LoadReport,
}

#[derive(Debug)]
struct Session {
    key:    SessionKey,
    chunks: Vec<Vec<u8>>,
    bytes:  usize,
}

#[derive(Debug)]
pub struct LoadReceiver {
    session: Option<Session>,
    phase:   LoadPhase,
}

impl Default for LoadReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadReceiver {
    pub fn new() -> Self {
        Self { session: None, phase: LoadPhase::Idle }
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// Key of the session being received.
    pub fn session_key(&self) -> Option<SessionKey> {
        self.session.as_ref().map(|s| s.key)
    }

    /// Bytes buffered for the current session.
    pub fn buffered_bytes(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.bytes)
    }

    /// Feed one message.  Returns the assembled payload when a `LoadDone`
    /// completes the current session.
    ///
    /// A malformed payload is an error; the session is consumed either way.
    pub fn receive(&mut self, message: DistributionMessage) -> DistributionResult<Option<Assembled>> {
        match message {
            DistributionMessage::LoadStart { session_key } => {
                if let Some(old) = self.session.take() {
                    info!(old = %old.key, new = %session_key, "load session superseded");
                }
                self.session = Some(Session { key: session_key, chunks: Vec::new(), bytes: 0 });
                self.phase = LoadPhase::Receiving;
                Ok(None)
            }
            DistributionMessage::LoadOne { session_key, bytes } => {
                match self.session.as_mut() {
                    Some(s) if s.key == session_key => {
                        s.bytes += bytes.len();
                        s.chunks.push(bytes);
                    }
                    _ => debug!(session = %session_key, "chunk for inactive session discarded"),
                }
                Ok(None)
            }
            DistributionMessage::LoadDone { session_key } => {
                let session = match self.session.take() {
                    Some(s) if s.key == session_key => s,
                    other => {
                        self.session = other;
                        debug!(session = %session_key, "completion for inactive session discarded");
                        return Ok(None);
                    }
                };
                self.phase = LoadPhase::Assembling;
                let result = assemble(session);
                self.phase = LoadPhase::Idle;
                result.map(Some)
            }
        }
    }

    /// Feed one message and apply a completed payload to `registry`.
    pub fn handle(
        &mut self,
        message:  DistributionMessage,
        registry: &mut ModuleRegistry,
    ) -> DistributionResult<Option<AppliedLoad>> {
        let Some(assembled) = self.receive(message)? else {
            return Ok(None);
        };
        self.phase = LoadPhase::Applied;
        let applied = apply(assembled, registry);
        self.phase = LoadPhase::Idle;
        applied.map(Some)
    }
}

/// Load an assembled payload into `registry`.
pub fn apply(assembled: Assembled, registry: &mut ModuleRegistry) -> DistributionResult<AppliedLoad> {
    let report = registry.load_libraries(&assembled.defs)?;
    info!(
        session = %assembled.session_key,
        modules = assembled.defs.len(),
        changed = report.changed.len(),
        failures = report.failures.len(),
        "distribution round applied"
    );
    Ok(AppliedLoad { session_key: assembled.session_key, report })
}

fn assemble(session: Session) -> DistributionResult<Assembled> {
    let malformed = |reason: String| {
        warn!(session = %session.key, %reason, "distribution payload rejected");
        DistributionError::Malformed { session: session.key, reason }
    };

    let payload = session.chunks.concat();
    let text = std::str::from_utf8(&payload).map_err(|e| malformed(format!("invalid UTF-8: {e}")))?;
    let defs: Vec<ModuleDef> =
        serde_json::from_str(text).map_err(|e| malformed(format!("not a module-definition array: {e}")))?;
    for def in &defs {
        def.validate().map_err(|e| malformed(e.to_string()))?;
    }
    Ok(Assembled { session_key: session.key, defs })
}
