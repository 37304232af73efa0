//! Wire messages of one distribution round.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Identifies one distribution round.  Drawn at random by the sender.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(pub u64);

impl SessionKey {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        SessionKey(rng.r#gen())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// ```json
/// { "type": "loadStart", "sessionKey": 42 }
/// { "type": "loadOne",   "sessionKey": 42, "bytes": [91, 123, …] }
/// { "type": "loadDone",  "sessionKey": 42 }
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DistributionMessage {
    LoadStart { session_key: SessionKey },
    LoadOne { session_key: SessionKey, bytes: Vec<u8> },
    LoadDone { session_key: SessionKey },
}

impl DistributionMessage {
    pub fn session_key(&self) -> SessionKey {
        match self {
            DistributionMessage::LoadStart { session_key }
            | DistributionMessage::LoadOne { session_key, .. }
            | DistributionMessage::LoadDone { session_key } => *session_key,
        }
    }

    /// `"loadStart"`, `"loadOne"` or `"loadDone"`.
    pub fn kind(&self) -> &'static str {
        match self {
            DistributionMessage::LoadStart { .. } => "loadStart",
            DistributionMessage::LoadOne { .. }   => "loadOne",
            DistributionMessage::LoadDone { .. }  => "loadDone",
        }
    }
}
