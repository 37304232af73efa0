//! `lv-distribution` — moving module definitions between replicas.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                     |
//! |---------------|--------------------------------------------------------------|
//! | [`message`]   | `DistributionMessage`, `SessionKey` — the wire shape          |
//! | [`sender`]    | `ChunkSender`, `ChunkConfig`, `Transfer` — split and pace     |
//! | [`receiver`]  | `LoadReceiver` — session state machine, assembly, apply       |
//! | [`library`]   | `CodeLibrary` — sender-side assembly of module definitions    |
//! | [`error`]     | `DistributionError`, `DistributionResult`                     |
//!
//! # Protocol
//!
//! ```text
//! sender:    LoadStart(k)  LoadOne(k, bytes)…  LoadDone(k)
//! receiver:  Idle ──start──▶ Receiving ──done──▶ Assembling ──▶ Applied ──▶ Idle
//! ```
//!
//! The payload is the JSON array of module definitions, UTF-8 encoded and cut
//! into fixed-size byte chunks.  A new `LoadStart` supersedes whatever session
//! was in flight; chunks and completions carrying any other key are dropped.
//! Nothing reaches the registry until the whole payload has been decoded and
//! every definition validated.

pub mod error;
pub mod library;
pub mod message;
pub mod receiver;
pub mod sender;

#[cfg(test)]
mod tests;

pub use error::{DistributionError, DistributionResult};
pub use library::{CodeLibrary, check_module};
pub use message::{DistributionMessage, SessionKey};
pub use receiver::{AppliedLoad, Assembled, LoadPhase, LoadReceiver};
pub use sender::{ChunkConfig, ChunkSender, Outgoing, Transfer};
