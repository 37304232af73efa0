//! `lv-compose` — per-instance capability composition and dispatch.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`entity`]     | `Entity` — the base object: id, fields, attached modules   |
//! | [`listeners`]  | `ListenerSet` — idempotent event-handler registrations     |
//! | [`deferred`]   | `DeferredTask`, `DeferredQueue` — name-bound scheduled work |
//! | [`host`]       | `Host` trait — what a composer needs from its world        |
//! | [`composer`]   | `Composer`, `Layer`, `MAX_CALL_DEPTH` — layered resolution |
//!
//! # Resolution order
//!
//! ```text
//! read / invoke:  current layer → layers last-attached → first → base entity
//! write:          first layer (same order) with a setter accessor → base field
//! ```
//!
//! Accessors run against the raw base entity, so an accessor may back
//! itself with a base field of the same name.

pub mod composer;
pub mod deferred;
pub mod entity;
pub mod host;
pub mod listeners;

#[cfg(test)]
mod tests;

pub use composer::{Composer, Layer, MAX_CALL_DEPTH};
pub use deferred::{DeferredQueue, DeferredTask};
pub use entity::{Entity, ModuleDiff};
pub use host::Host;
pub use listeners::{Listener, ListenerSet};
