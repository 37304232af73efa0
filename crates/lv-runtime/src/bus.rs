//! `LocalBus` — an in-process stand-in for the sync transport.
//!
//! Events are stored as JSON frames in publish order; every reader sees the
//! same sequence.  Only replicated data can cross: anything that does not
//! survive encoding never reaches a replica.

use lv_distribution::Transfer;
use tracing::debug;

use crate::{ModelEvent, RuntimeResult};

#[derive(Debug, Default)]
pub struct LocalBus {
    frames: Vec<String>,
    /// Sum of the pacing delays of published transfers, in milliseconds.
    paced_ms: u64,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, event: &ModelEvent) -> RuntimeResult<()> {
        self.frames.push(serde_json::to_string(event)?);
        Ok(())
    }

    /// Publish a whole distribution round.  Delays are accounted, not
    /// waited for.
    pub fn publish_transfer(&mut self, transfer: Transfer) -> RuntimeResult<()> {
        let delay = transfer.total_delay_ms();
        let session = transfer.session_key;
        for message in transfer.into_messages() {
            self.publish(&ModelEvent::Distribution(message))?;
        }
        self.paced_ms += delay;
        debug!(%session, delay_ms = delay, frames = self.frames.len(), "transfer published");
        Ok(())
    }

    /// Events from position `from` on.
    pub fn read_from(&self, from: usize) -> RuntimeResult<Vec<ModelEvent>> {
        self.frames
            .iter()
            .skip(from)
            .map(|frame| Ok(serde_json::from_str(frame)?))
            .collect()
    }

    /// Raw frames, in publish order.
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn paced_ms(&self) -> u64 {
        self.paced_ms
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
