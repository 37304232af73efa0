//! `lv-core` — foundational types for the live-reload capability runtime.
//!
//! This crate is a dependency of every other `lv-*` crate.  It has no `lv-*`
//! dependencies and only `thiserror` (plus optional `serde`) externally.
//!
//! # What lives here
//!
//! | Module     | Contents                                                   |
//! |------------|------------------------------------------------------------|
//! | [`ids`]    | `InstanceId`, `BehaviorId`                                 |
//! | [`turn`]   | `Turn`, `TurnClock` — the cooperative-loop time unit       |
//! | [`value`]  | `Value`, the dynamic value passed to and from capabilities |
//! | [`names`]  | `BehaviorKind`, `BehaviorRef`, `MethodPath`                |
//! | [`error`]  | `LvError`, `LvResult`                                      |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |
//!           | Required by `lv-registry` and `lv-distribution`.           |

pub mod error;
pub mod ids;
pub mod names;
pub mod turn;
pub mod value;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{LvError, LvResult};
pub use ids::{BehaviorId, InstanceId};
pub use names::{BehaviorKind, BehaviorRef, MethodPath};
pub use turn::{Turn, TurnClock};
pub use value::Value;
