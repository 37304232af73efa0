//! live-reload — two replicas share one bus while a module is hot-swapped.
//!
//! The author replica distributes `Lights` v1, spawns two lamps, schedules a
//! deferred call, then distributes v2.  The peer replica sees only the bus
//! and ends in the same model state.  Run with `RUST_LOG=debug` for the
//! per-step trace.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lv_core::{InstanceId, Value};
use lv_registry::ModuleDef;
use lv_runtime::{LocalBus, ModelEvent, Replica, ReplicaBuilder, RuntimeConfig, TracingObserver};

// ── Constants ─────────────────────────────────────────────────────────────────

const AUTHOR_SEED: u64 = 42;
const PEER_SEED:   u64 = 7;
const LAMPS:       u64 = 2;

// ── Module sources ────────────────────────────────────────────────────────────

fn lamp_model(version: i64) -> String {
    format!(
        "capability Lamp\n\
         \x20 method setup\n    set version {version}\n    listen toggle onToggle\n  end\n\
         \x20 method teardown\n    log \"retiring lamp code v{version}\"\n  end\n\
         \x20 method onToggle(times)\n    add toggles $times\n  end\n\
         \x20 method dim\n    future 2 settle\n  end\n\
         \x20 method settle\n    set dimmedBy {version}\n  end\n\
         end\n"
    )
}

fn lamp_view(version: i64) -> String {
    format!(
        "capability LampView\n\
         \x20 method setup\n    log \"drawing lamp v{version}\"\n  end\n\
         \x20 method teardown\n    log \"erasing lamp v{version}\"\n  end\n\
         end\n"
    )
}

fn lights(version: i64) -> ModuleDef {
    ModuleDef::new("Lights", "user/lights.lv")
        .with_model("Lamp", &lamp_model(version))
        .with_view("LampView", &lamp_view(version))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn print_state(label: &str, replica: &Replica) {
    println!("{label} (turn {}):", replica.model().now().0);
    for snap in replica.model().snapshot() {
        let field = |name: &str| snap.fields.get(name).cloned().unwrap_or(Value::Null);
        println!(
            "  {}  version={}  toggles={}  dimmedBy={}  listeners={:?}",
            snap.id,
            field("version"),
            field("toggles"),
            field("dimmedBy"),
            snap.listeners
        );
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== live-reload — capability hot swap across replicas ===");

    let mut author = ReplicaBuilder::new(RuntimeConfig { seed: AUTHOR_SEED, ..RuntimeConfig::default() }).build()?;
    let mut peer =
        ReplicaBuilder::new(RuntimeConfig { seed: PEER_SEED, view: false, ..RuntimeConfig::default() }).build()?;
    let mut bus = LocalBus::new();
    let mut observer = TracingObserver;

    // 1. Distribute v1 and spawn the lamps.
    bus.publish_transfer(author.distribute(&[lights(1)])?)?;
    for _ in 0..LAMPS {
        bus.publish(&ModelEvent::Spawn { modules: vec!["Lights".into()], fields: BTreeMap::new() })?;
    }
    let first = InstanceId(1);
    bus.publish(&ModelEvent::Publish { scope: first.scope(), event: "toggle".into(), data: Value::Int(3) })?;
    bus.publish(&ModelEvent::Invoke { instance: first, method: "dim".into(), args: Vec::new() })?;
    author.sync(&bus, &mut observer)?;
    print_state("after v1", &author);

    // 2. Hot-swap to v2 while the deferred call is still pending.
    bus.publish_transfer(author.distribute(&[lights(2)])?)?;
    bus.publish(&ModelEvent::Advance)?;
    bus.publish(&ModelEvent::Advance)?;
    author.sync(&bus, &mut observer)?;
    print_state("after v2", &author);

    // 3. The peer replays the whole stream.
    peer.sync(&bus, &mut observer)?;
    let agree = author.model().snapshot() == peer.model().snapshot();
    info!(frames = bus.len(), paced_ms = bus.paced_ms(), agree, "bus replayed by peer");
    println!();
    println!("frames on bus: {}  |  replicas agree: {agree}", bus.len());
    anyhow::ensure!(agree, "replicas diverged");

    Ok(())
}
