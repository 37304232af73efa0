//! `lv-registry` — the authoritative, replicated store of capability modules.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                    |
//! |---------------|-------------------------------------------------------------|
//! | [`def`]       | `ModuleDef`, `BehaviorDef`, `ModuleAction` — the wire shape  |
//! | [`naming`]    | external-name collision resolution                          |
//! | [`behavior`]  | `Behavior`, one versioned capability definition             |
//! | [`module`]    | `Module`, an ordered group of behaviors                     |
//! | [`usage`]     | `UsageSet`, `UsageIndex` — which instances use which behavior |
//! | [`cache`]     | `CompiledCache` — local compiled tables keyed by revision   |
//! | [`lifecycle`] | `Lifecycle`, `Dispatch` — setup/teardown effects            |
//! | [`registry`]  | `ModuleRegistry`, `LoadReport`                              |
//! | [`config`]    | `RegistryConfig`                                            |
//! | [`error`]     | `RegistryError`, `RegistryResult`                           |
//!
//! # Effects, not callbacks
//!
//! The registry never runs capability code.  Operations that would trigger a
//! lifecycle hook return [`Lifecycle`] values describing it; the hosting
//! world applies them (immediately, or via its deferred queue) against its
//! own instances.  This keeps the registry free of any reference to instance
//! storage and makes the reload ordering directly testable.

pub mod behavior;
pub mod cache;
pub mod config;
pub mod def;
pub mod error;
pub mod lifecycle;
pub mod module;
pub mod naming;
pub mod registry;
pub mod usage;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use behavior::{Behavior, DETACHED_PREFIX};
pub use cache::CompiledCache;
pub use config::RegistryConfig;
pub use def::{BehaviorDef, ModuleAction, ModuleDef};
pub use error::{RegistryError, RegistryResult};
pub use lifecycle::{Dispatch, Lifecycle};
pub use module::Module;
pub use naming::resolve_external_name;
pub use registry::{LoadReport, ModuleRegistry};
pub use usage::{UsageIndex, UsageSet};
