//! `lv-runtime` — the worlds that host live-reloadable capabilities.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                       |
//! |--------------|----------------------------------------------------------------|
//! | [`event`]    | `ModelEvent` (replicated input), `ViewNotice` (model → view)   |
//! | [`model`]    | `ModelWorld` — entities, registry, deferred queue, turn clock  |
//! | [`view`]     | `ViewWorld` — the mirror registry of one participant           |
//! | [`replica`]  | `Replica` — a model world plus its view, fed from the bus      |
//! | [`bus`]      | `LocalBus` — in-process, totally ordered broadcast             |
//! | [`observer`] | `RuntimeObserver`, `NoopObserver`, `TracingObserver`           |
//! | [`config`]   | `RuntimeConfig`                                                |
//! | [`builder`]  | `ReplicaBuilder`                                               |
//! | [`error`]    | `RuntimeError`, `RuntimeResult`                                |
//!
//! # Handling one message
//!
//! ```text
//! ① Apply     — the event's immediate effects (first-attach setup, retire
//!               teardowns of superseded tables, event handlers, …).
//! ② Settle    — deliver events published during ①, then run every deferred
//!               task due at or before the current turn, FIFO, repeating
//!               until both are empty.
//! ③ Notify    — hand the accumulated view notices to the view world, which
//!               applies and settles them the same way against its mirrors.
//! ```
//!
//! `Advance` moves the model clock one turn and settles again.  Everything a
//! replica does is a function of the ordered event stream, so replicas fed
//! the same stream end in the same state.
//!
//! # Quick-start
//!
//! ```rust,ignore
//! let mut replica = ReplicaBuilder::new(RuntimeConfig::default()).build()?;
//! let mut bus = LocalBus::new();
//! bus.publish_transfer(replica.distribute(&defs)?)?;
//! bus.publish(&ModelEvent::Spawn { modules: vec!["Lights".into()], fields: Default::default() })?;
//! replica.sync(&bus, &mut TracingObserver)?;
//! ```

pub mod builder;
pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod observer;
pub mod replica;
pub mod view;

mod dispatch;


pub use builder::ReplicaBuilder;
pub use bus::LocalBus;
pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use event::{EntitySnapshot, ModelEvent, Published, ViewNotice};
pub use model::ModelWorld;
pub use observer::{NoopObserver, RuntimeObserver, TracingObserver};
pub use replica::Replica;
pub use view::ViewWorld;
