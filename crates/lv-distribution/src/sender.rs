//! `ChunkSender` — serialize a module set and cut it into paced chunks.
//!
//! The sender does no I/O.  It returns the full message sequence of a round,
//! each message tagged with the delay to wait before publishing it; the
//! caller owns the transport and the clock.

use lv_registry::ModuleDef;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DistributionError, DistributionMessage, DistributionResult, SessionKey};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkConfig {
    /// Bytes per `LoadOne` chunk.
    pub chunk_size:         usize,
    /// Payloads larger than this many bytes are paced.
    pub throttle_threshold: usize,
    /// Delay between chunks of a paced payload, in milliseconds.
    pub pace_ms:            u64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { chunk_size: 2880, throttle_threshold: 80_000, pace_ms: 16 }
    }
}

/// One message of a round and how long to wait before publishing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
    pub delay_ms: u64,
    pub message:  DistributionMessage,
}

/// The complete message sequence of one distribution round.
#[derive(Clone, Debug)]
pub struct Transfer {
    pub session_key:   SessionKey,
    pub payload_bytes: usize,
    pub throttled:     bool,
    pub messages:      Vec<Outgoing>,
}

impl Transfer {
    /// Number of `LoadOne` chunks.
    pub fn chunk_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|o| matches!(o.message, DistributionMessage::LoadOne { .. }))
            .count()
    }

    /// Sum of all inter-message delays.
    pub fn total_delay_ms(&self) -> u64 {
        self.messages.iter().map(|o| o.delay_ms).sum()
    }

    /// The messages in publish order, without their delays.
    pub fn into_messages(self) -> impl Iterator<Item = DistributionMessage> {
        self.messages.into_iter().map(|o| o.message)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChunkSender {
    config: ChunkConfig,
}

impl ChunkSender {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Serialize `defs` under a fresh session key and split the result.
    pub fn prepare<R: Rng + ?Sized>(&self, defs: &[ModuleDef], rng: &mut R) -> DistributionResult<Transfer> {
        let payload = encode(defs)?;
        Ok(self.split(SessionKey::random(rng), &payload))
    }

    /// Split an encoded payload into `LoadStart`, the chunks, and `LoadDone`.
    ///
    /// When the payload exceeds the throttle threshold, every message after
    /// the first chunk waits `pace_ms`.
    pub fn split(&self, session_key: SessionKey, payload: &[u8]) -> Transfer {
        let throttled = payload.len() > self.config.throttle_threshold;
        let pace = if throttled { self.config.pace_ms } else { 0 };

        let mut messages = Vec::with_capacity(payload.len() / self.config.chunk_size.max(1) + 3);
        messages.push(Outgoing { delay_ms: 0, message: DistributionMessage::LoadStart { session_key } });
        for (i, chunk) in payload.chunks(self.config.chunk_size.max(1)).enumerate() {
            messages.push(Outgoing {
                delay_ms: if i == 0 { 0 } else { pace },
                message:  DistributionMessage::LoadOne { session_key, bytes: chunk.to_vec() },
            });
        }
        let done_delay = if payload.is_empty() { 0 } else { pace };
        messages.push(Outgoing { delay_ms: done_delay, message: DistributionMessage::LoadDone { session_key } });

        debug!(
            session = %session_key,
            bytes = payload.len(),
            chunks = messages.len() - 2,
            throttled,
            "distribution round prepared"
        );
        Transfer { session_key, payload_bytes: payload.len(), throttled, messages }
    }
}

/// The wire payload: the definitions as a UTF-8 JSON array.
pub fn encode(defs: &[ModuleDef]) -> DistributionResult<Vec<u8>> {
    serde_json::to_vec(defs).map_err(DistributionError::Encode)
}
