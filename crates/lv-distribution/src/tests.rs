//! Unit tests for lv-distribution.

use std::sync::Arc;

use lv_capability::ScriptCompiler;
use lv_registry::{ModuleDef, ModuleRegistry, RegistryConfig};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::sender::encode;
use crate::{
    ChunkConfig, ChunkSender, CodeLibrary, DistributionError, DistributionMessage, LoadPhase,
    LoadReceiver, SessionKey, check_module,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn registry() -> ModuleRegistry {
    ModuleRegistry::new(RegistryConfig::default(), Arc::new(ScriptCompiler::new()))
}

fn lamp(version: i64) -> ModuleDef {
    ModuleDef::new("Lights", "user/lights.lv").with_model(
        "Lamp",
        &format!("capability Lamp\n  method ping\n    return {version}\n  end\nend\n"),
    )
}

fn small_chunks() -> ChunkSender {
    ChunkSender::new(ChunkConfig { chunk_size: 16, throttle_threshold: 100_000, pace_ms: 16 })
}

fn start(key: u64) -> DistributionMessage {
    DistributionMessage::LoadStart { session_key: SessionKey(key) }
}

fn one(key: u64, bytes: &[u8]) -> DistributionMessage {
    DistributionMessage::LoadOne { session_key: SessionKey(key), bytes: bytes.to_vec() }
}

fn done(key: u64) -> DistributionMessage {
    DistributionMessage::LoadDone { session_key: SessionKey(key) }
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod message_tests {
    use super::*;

    #[test]
    fn wire_shape_is_camel_case() {
        let json = serde_json::to_value(one(7, b"ab")).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "loadOne", "sessionKey": 7, "bytes": [97, 98] }));

        let back: DistributionMessage = serde_json::from_str(r#"{"type":"loadDone","sessionKey":7}"#).unwrap();
        assert_eq!(back, done(7));
        assert_eq!(back.kind(), "loadDone");
        assert_eq!(back.session_key(), SessionKey(7));
    }

    #[test]
    fn session_keys_follow_the_rng() {
        let a = SessionKey::random(&mut SmallRng::seed_from_u64(3));
        let b = SessionKey::random(&mut SmallRng::seed_from_u64(3));
        assert_eq!(a, b);
        assert_eq!(SessionKey(255).to_string(), "00000000000000ff");
    }
}

// ── Sender ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod sender_tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ChunkConfig::default();
        assert_eq!((c.chunk_size, c.throttle_threshold, c.pace_ms), (2880, 80_000, 16));
    }

    #[test]
    fn small_payload_is_unpaced() {
        let payload = vec![b'x'; 40];
        let t = small_chunks().split(SessionKey(1), &payload);

        assert!(!t.throttled);
        assert_eq!(t.chunk_count(), 3);
        assert_eq!(t.total_delay_ms(), 0);
        assert_eq!(t.messages.first().map(|o| o.message.kind()), Some("loadStart"));
        assert_eq!(t.messages.last().map(|o| o.message.kind()), Some("loadDone"));

        let sizes: Vec<usize> = t
            .into_messages()
            .filter_map(|m| match m {
                DistributionMessage::LoadOne { bytes, .. } => Some(bytes.len()),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![16, 16, 8]);
    }

    #[test]
    fn large_payload_is_paced_between_chunks() {
        let sender = ChunkSender::new(ChunkConfig { chunk_size: 100, throttle_threshold: 200, pace_ms: 5 });
        let t = sender.split(SessionKey(1), &[0u8; 250]);

        assert!(t.throttled);
        let delays: Vec<u64> = t.messages.iter().map(|o| o.delay_ms).collect();
        // start, three chunks, done
        assert_eq!(delays, vec![0, 0, 5, 5, 5]);
        assert_eq!(t.total_delay_ms(), 15);
    }

    #[test]
    fn threshold_is_exclusive() {
        let sender = ChunkSender::new(ChunkConfig { chunk_size: 10, throttle_threshold: 30, pace_ms: 5 });
        assert!(!sender.split(SessionKey(1), &[0u8; 30]).throttled);
        assert!(sender.split(SessionKey(1), &[0u8; 31]).throttled);
    }

    #[test]
    fn prepare_encodes_definitions() {
        let mut rng = SmallRng::seed_from_u64(9);
        let defs = vec![lamp(1)];
        let t = ChunkSender::default().prepare(&defs, &mut rng).unwrap();

        assert_eq!(t.payload_bytes, encode(&defs).unwrap().len());
        assert_eq!(t.chunk_count(), 1);
        assert_eq!(t.session_key, SessionKey::random(&mut SmallRng::seed_from_u64(9)));
    }
}

// ── Receiver ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod receiver_tests {
    use super::*;

    fn send(rx: &mut LoadReceiver, reg: &mut ModuleRegistry, messages: Vec<DistributionMessage>) -> usize {
        let mut applied = 0;
        for m in messages {
            if rx.handle(m, reg).unwrap().is_some() {
                applied += 1;
            }
        }
        applied
    }

    #[test]
    fn full_round_applies_once() {
        let mut reg = registry();
        let mut rx = LoadReceiver::new();
        let t = small_chunks().split(SessionKey(5), &encode(&[lamp(1)]).unwrap());
        assert!(t.chunk_count() > 1);

        let mut messages: Vec<_> = t.into_messages().collect();
        let last = messages.pop().unwrap();
        assert_eq!(send(&mut rx, &mut reg, messages), 0);
        assert_eq!(rx.phase(), LoadPhase::Receiving);
        assert!(rx.buffered_bytes() > 0);

        let applied = rx.handle(last, &mut reg).unwrap().unwrap();
        assert_eq!(applied.session_key, SessionKey(5));
        assert_eq!(applied.report.names["Lights"], "Lights");
        assert!(reg.lookup("Lights", "Lamp").is_some());
        assert_eq!(rx.phase(), LoadPhase::Idle);
        assert_eq!(rx.session_key(), None);
    }

    #[test]
    fn new_start_supersedes_partial_session() {
        let mut reg = registry();
        let mut rx = LoadReceiver::new();
        let payload = encode(&[lamp(2)]).unwrap();

        send(&mut rx, &mut reg, vec![start(1), one(1, b"[{\"name\":")]);
        send(&mut rx, &mut reg, vec![start(2), one(1, b"garbage")]);
        assert_eq!(rx.session_key(), Some(SessionKey(2)));
        assert_eq!(rx.buffered_bytes(), 0);

        // The old session's completion is ignored.
        assert!(rx.handle(done(1), &mut reg).unwrap().is_none());
        assert_eq!(rx.session_key(), Some(SessionKey(2)));

        let applied = send(&mut rx, &mut reg, vec![one(2, &payload), done(2)]);
        assert_eq!(applied, 1);
        assert_eq!(reg.behavior_count(), 1);
    }

    #[test]
    fn messages_without_a_session_are_ignored() {
        let mut reg = registry();
        let mut rx = LoadReceiver::new();
        assert_eq!(send(&mut rx, &mut reg, vec![one(3, b"[]"), done(3)]), 0);
        assert_eq!(rx.phase(), LoadPhase::Idle);
    }

    #[test]
    fn malformed_json_mutates_nothing() {
        let mut reg = registry();
        let mut rx = LoadReceiver::new();
        rx.handle(start(4), &mut reg).unwrap();
        rx.handle(one(4, b"[{\"name\": \"Lights\""), &mut reg).unwrap();

        let err = rx.handle(done(4), &mut reg).unwrap_err();
        assert!(matches!(err, DistributionError::Malformed { session: SessionKey(4), .. }));
        assert_eq!(reg.behavior_count(), 0);
        assert_eq!(rx.phase(), LoadPhase::Idle);
        assert_eq!(rx.session_key(), None);
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let mut rx = LoadReceiver::new();
        rx.receive(start(4)).unwrap();
        rx.receive(one(4, &[0xff, 0xfe])).unwrap();
        assert!(matches!(rx.receive(done(4)), Err(DistributionError::Malformed { .. })));
    }

    #[test]
    fn one_invalid_definition_rejects_the_round() {
        let mut reg = registry();
        let mut rx = LoadReceiver::new();
        let payload = encode(&[lamp(1), ModuleDef::new("", "user/x.lv")]).unwrap();

        let err = send_err(&mut rx, &mut reg, vec![start(6), one(6, &payload), done(6)]);
        assert!(matches!(err, Some(DistributionError::Malformed { .. })));
        assert_eq!(reg.behavior_count(), 0);
    }

    fn send_err(
        rx: &mut LoadReceiver,
        reg: &mut ModuleRegistry,
        messages: Vec<DistributionMessage>,
    ) -> Option<DistributionError> {
        messages.into_iter().find_map(|m| rx.handle(m, reg).err())
    }

    #[test]
    fn disabled_registry_still_completes_the_round() {
        let mut reg = registry();
        reg.set_code_load_enabled(false);
        let mut rx = LoadReceiver::new();
        let payload = encode(&[lamp(1)]).unwrap();

        rx.handle(start(8), &mut reg).unwrap();
        rx.handle(one(8, &payload), &mut reg).unwrap();
        let applied = rx.handle(done(8), &mut reg).unwrap().unwrap();
        assert!(applied.report.disabled);
        assert_eq!(reg.behavior_count(), 0);
    }
}

// ── Library ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod library_tests {
    use super::*;

    #[test]
    fn later_duplicate_wins_in_first_position() {
        let mut lib = CodeLibrary::new();
        lib.add(lamp(1)).unwrap();
        lib.add(ModuleDef::new("Doors", "user/doors.lv")).unwrap();
        lib.add(lamp(2)).unwrap();

        assert_eq!(lib.len(), 2);
        let names: Vec<&str> = lib.modules().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Lights", "Doors"]);
        let source = &lib.get("user/lights.lv", "Lights").unwrap().model_behaviors[0].source_text;
        assert!(source.contains("return 2"));
    }

    #[test]
    fn same_name_at_another_location_is_distinct() {
        let mut lib = CodeLibrary::new();
        lib.add(lamp(1)).unwrap();
        let mut other = lamp(1);
        other.location = "user/other.lv".into();
        lib.add(other).unwrap();
        assert_eq!(lib.len(), 2);
    }

    #[test]
    fn add_file_stamps_location_and_system_flag() {
        let mut lib = CodeLibrary::new();
        lib.add_file("system/base.lv", true, vec![ModuleDef::new("Base", ""), ModuleDef::new("Extra", "")])
            .unwrap();

        assert!(lib.modules().iter().all(|m| m.location == "system/base.lv" && m.system_module));
        assert!(lib.get("system/base.lv", "Extra").is_some());
    }

    #[test]
    fn add_file_checks_every_module_first() {
        let mut lib = CodeLibrary::new();
        let bad = ModuleDef::new("Bad", "").with_model("", "capability X\nend\n");
        let err = lib.add_file("user/f.lv", false, vec![ModuleDef::new("Good", ""), bad]).unwrap_err();

        assert!(matches!(err, DistributionError::InvalidModule { ref name, .. } if name == "Bad"));
        assert!(lib.is_empty());
    }

    #[test]
    fn check_module_rules() {
        assert!(check_module(&lamp(1)).is_ok());
        assert!(check_module(&ModuleDef::new("", "x")).is_err());
        assert!(check_module(&ModuleDef::remove("user/lights.lv")).is_err());
        assert!(check_module(&lamp(1).with_model("Lamp", "capability Lamp\nend\n")).is_err());
    }

    #[test]
    fn library_round_trips_through_a_receiver() {
        let mut lib = CodeLibrary::new();
        lib.add(lamp(3)).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        let t = small_chunks().prepare(lib.modules(), &mut rng).unwrap();

        let mut reg = registry();
        let mut rx = LoadReceiver::new();
        let applied: Vec<_> = t.into_messages().filter_map(|m| rx.handle(m, &mut reg).unwrap()).collect();
        assert_eq!(applied.len(), 1);
        assert!(reg.lookup("Lights", "Lamp").is_some());
    }
}
