//! Unit tests for lv-compose.

use std::collections::BTreeMap;
use std::sync::Arc;

use lv_capability::{
    Accessor, CapabilityTable, Compiler, InvocationError, Receiver, ScriptCompiler,
};
use lv_core::{BehaviorRef, InstanceId, MethodPath, Turn, Value};

use crate::{Composer, DeferredQueue, DeferredTask, Entity, Host, Layer, ListenerSet, MAX_CALL_DEPTH};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Tables keyed by behavior; modules list their behaviors in order.
#[derive(Default)]
struct TestHost {
    now:       Turn,
    tables:    BTreeMap<BehaviorRef, Arc<CapabilityTable>>,
    modules:   BTreeMap<String, Vec<BehaviorRef>>,
    scheduled: Vec<DeferredTask>,
    published: Vec<(String, String, Value)>,
    logs:      Vec<(InstanceId, String)>,
}

impl TestHost {
    fn install(&mut self, module: &str, behavior: &str, table: CapabilityTable) {
        let target = BehaviorRef::new(module, behavior);
        self.modules.entry(module.to_string()).or_default().push(target.clone());
        self.tables.insert(target, Arc::new(table));
    }

    fn install_script(&mut self, module: &str, behavior: &str, source: &str) {
        let table = ScriptCompiler::new().compile(source, "test.lv").unwrap();
        self.install(module, behavior, table);
    }
}

impl Host for TestHost {
    fn now(&self) -> Turn {
        self.now
    }

    fn resolve_table(&mut self, target: &BehaviorRef) -> Option<Arc<CapabilityTable>> {
        self.tables.get(target).cloned()
    }

    fn layers(&mut self, modules: &[String]) -> Vec<Layer> {
        modules
            .iter()
            .filter_map(|m| self.modules.get(m))
            .flatten()
            .filter_map(|t| self.tables.get(t).map(|table| Layer::new(t.clone(), Arc::clone(table))))
            .collect()
    }

    fn schedule(&mut self, task: DeferredTask) {
        self.scheduled.push(task);
    }

    fn publish(&mut self, scope: &str, event: &str, data: Value) {
        self.published.push((scope.to_string(), event.to_string(), data));
    }

    fn has_behavior(&self, attached: &[String], spec: &str, _method: Option<&str>) -> bool {
        attached.iter().any(|m| m == spec)
    }

    fn log(&mut self, instance: InstanceId, message: &str) {
        self.logs.push((instance, message.to_string()));
    }
}

fn entity(id: u64, modules: &[&str]) -> Entity {
    let mut e = Entity::new(InstanceId(id));
    let modules: Vec<String> = modules.iter().map(|m| m.to_string()).collect();
    e.set_modules(&modules);
    e
}

fn constant(name: &str, method: &str, value: i64) -> CapabilityTable {
    CapabilityTable::new(name).with_method(method, move |_rx, _args| Ok(Value::Int(value)))
}

// ── Entity ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod entity_tests {
    use super::*;

    #[test]
    fn set_modules_reports_diff_and_dedupes() {
        let mut e = entity(1, &["A", "B"]);
        let diff = e.set_modules(&["B".into(), "C".into(), "C".into(), "D".into()]);

        assert_eq!(diff.detached, vec!["A".to_string()]);
        assert_eq!(diff.attached, vec!["C".to_string(), "D".to_string()]);
        assert_eq!(e.modules(), &["B".to_string(), "C".to_string(), "D".to_string()]);
        assert!(e.set_modules(&["B".into(), "C".into(), "D".into()]).is_empty());
    }

    #[test]
    fn null_write_removes_field() {
        let mut e = Entity::new(InstanceId(1)).with_field("x", Value::Int(3));
        assert_eq!(e.get("x"), Value::Int(3));
        e.set("x", Value::Null);
        assert!(e.field("x").is_none());
        assert_eq!(e.get("x"), Value::Null);
    }

    #[test]
    fn equality_is_identity() {
        let a = Entity::new(InstanceId(4)).with_field("x", Value::Int(1));
        let b = Entity::new(InstanceId(4)).with_field("x", Value::Int(2));
        assert_eq!(a, b);
        assert_ne!(a, Entity::new(InstanceId(5)));
    }
}

// ── Listeners ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod listener_tests {
    use super::*;

    #[test]
    fn registration_is_idempotent() {
        let mut set = ListenerSet::default();
        let h = MethodPath::parse("Lights$Lamp.onBump").unwrap();

        assert!(set.add("7", "bump", h.clone()));
        assert!(!set.add("7", "bump", h.clone()));
        assert!(set.add("7", "other", h.clone()));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().next().unwrap().key(), "7:bump:Lights$Lamp.onBump");
    }

    #[test]
    fn handlers_in_registration_order() {
        let mut set = ListenerSet::default();
        set.add("s", "e", MethodPath::parse("M$B.two").unwrap());
        set.add("s", "e", MethodPath::parse("M$A.one").unwrap());
        set.add("t", "e", MethodPath::parse("M$A.nope").unwrap());

        let got: Vec<String> = set.handlers("s", "e").map(|h| h.to_string()).collect();
        assert_eq!(got, vec!["M$B.two", "M$A.one"]);
    }

    #[test]
    fn remove_allows_re_adding() {
        let mut set = ListenerSet::default();
        let h = MethodPath::bare("go");
        set.add("s", "e", h.clone());
        assert!(set.remove("s", "e", &h));
        assert!(!set.remove("s", "e", &h));
        assert!(set.is_empty());
        assert!(set.add("s", "e", h));
    }
}

// ── Deferred queue ────────────────────────────────────────────────────────────

#[cfg(test)]
mod deferred_tests {
    use super::*;

    fn task(instance: u64, method: &str, due: u64) -> DeferredTask {
        DeferredTask::bound(InstanceId(instance), BehaviorRef::new("M", "B"), method, vec![], Turn(due))
    }

    #[test]
    fn pops_by_due_turn_then_fifo() {
        let mut q = DeferredQueue::new();
        q.push(task(1, "late", 3));
        q.push(task(1, "a", 1));
        q.push(task(2, "b", 1));
        assert_eq!(q.len(), 3);
        assert_eq!(q.next_due(), Some(Turn(1)));

        assert_eq!(q.pop_due(Turn(0)), None);
        assert_eq!(q.pop_due(Turn(1)).unwrap().method, "a");
        assert_eq!(q.pop_due(Turn(1)).unwrap().method, "b");
        assert_eq!(q.pop_due(Turn(2)), None);
        assert_eq!(q.pop_due(Turn(5)).unwrap().method, "late");
        assert!(q.is_empty());
    }

    #[test]
    fn take_instance_removes_only_that_instance() {
        let mut q = DeferredQueue::new();
        q.push(task(1, "x", 2));
        q.push(task(2, "y", 2));
        q.push(task(1, "z", 4));

        let taken: Vec<String> = q.take_instance(InstanceId(1)).into_iter().map(|t| t.method).collect();
        assert_eq!(taken, vec!["x", "z"]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_due(), Some(Turn(2)));
    }

    #[test]
    fn describe_names_target() {
        assert_eq!(task(1, "go", 0).describe(), "M$B.go");
    }
}

// ── Composer ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod composer_tests {
    use super::*;

    #[test]
    fn later_layers_shadow_earlier_ones() {
        let mut host = TestHost::default();
        host.install("A", "X", constant("X", "value", 1));
        host.install("B", "Y", constant("Y", "value", 2));
        let mut e = entity(1, &["A", "B"]);

        let mut c = Composer::new(&mut e, &mut host);
        assert_eq!(c.invoke("value", &[]).unwrap(), Value::Int(2));
    }

    #[test]
    fn current_layer_wins() {
        let mut host = TestHost::default();
        host.install("A", "X", constant("X", "value", 1));
        host.install("B", "Y", constant("Y", "value", 2));
        let table = host.tables[&BehaviorRef::new("A", "X")].clone();
        let mut e = entity(1, &["A", "B"]);

        let mut c = Composer::new(&mut e, &mut host)
            .with_current(Layer::new(BehaviorRef::new("A", "X"), table));
        assert_eq!(c.run("value", &[]).unwrap(), Value::Int(1));
    }

    #[test]
    fn unknown_method_names_capability() {
        let mut host = TestHost::default();
        host.install("A", "X", constant("X", "value", 1));
        let table = host.tables[&BehaviorRef::new("A", "X")].clone();
        let mut e = entity(1, &["A"]);

        let mut c = Composer::new(&mut e, &mut host)
            .with_current(Layer::new(BehaviorRef::new("A", "X"), table));
        assert_eq!(
            c.run("missing", &[]).unwrap_err(),
            InvocationError::UnknownMethod { capability: "A$X".into(), method: "missing".into() }
        );
    }

    #[test]
    fn reads_fall_through_to_base() {
        let mut host = TestHost::default();
        host.install("A", "X", constant("X", "value", 1));
        let mut e = entity(1, &["A"]);
        e.set("hp", Value::Int(10));

        let mut c = Composer::new(&mut e, &mut host);
        assert_eq!(c.get("hp").unwrap(), Value::Int(10));
        c.set("hp", Value::Int(9)).unwrap();
        drop(c);
        assert_eq!(e.get("hp"), Value::Int(9));
    }

    #[test]
    fn setter_accessor_runs_against_raw_base() {
        let mut host = TestHost::default();
        // `label` is stored upper-cased under the same name.
        let table = CapabilityTable::new("Upper").with_accessor("label", Accessor {
            get: Some(Arc::new(|rx: &mut dyn Receiver| rx.get("label"))),
            set: Some(Arc::new(|rx: &mut dyn Receiver, v: Value| {
                let text = v.as_text().unwrap_or_default().to_uppercase();
                rx.set("label", Value::Text(text))
            })),
        });
        host.install("A", "Upper", table);
        let mut e = entity(1, &["A"]);

        let mut c = Composer::new(&mut e, &mut host);
        c.set("label", Value::from("lamp")).unwrap();
        assert_eq!(c.get("label").unwrap(), Value::from("LAMP"));
        drop(c);
        assert_eq!(e.get("label"), Value::from("LAMP"));
    }

    #[test]
    fn first_setter_in_resolution_order_receives_write() {
        let mut host = TestHost::default();
        let redirect = |field: &'static str| Accessor {
            get: None,
            set: Some(Arc::new(move |rx: &mut dyn Receiver, v: Value| rx.set(field, v))),
        };
        host.install("A", "First", CapabilityTable::new("First").with_accessor("x", redirect("fromFirst")));
        host.install("B", "Second", CapabilityTable::new("Second").with_accessor("x", redirect("fromSecond")));
        let mut e = entity(1, &["A", "B"]);

        Composer::new(&mut e, &mut host).set("x", Value::Int(1)).unwrap();
        assert_eq!(e.get("fromSecond"), Value::Int(1));
        assert!(e.field("fromFirst").is_none());
        assert!(e.field("x").is_none());
    }

    #[test]
    fn identity_is_preserved() {
        let mut host = TestHost::default();
        host.install("A", "X", constant("X", "value", 1));
        let mut e = entity(42, &["A"]);
        let base = e.clone();

        let c = Composer::new(&mut e, &mut host);
        assert_eq!(c.id(), InstanceId(42));
        assert!(c == base);
        assert!(c == InstanceId(42));
    }

    #[test]
    fn call_resolves_in_current_module() {
        let mut host = TestHost::default();
        host.install_script("Lights", "Lamp", "capability Lamp\n method go\n  return call Switch flip 5\n end\nend");
        host.install_script("Lights", "Switch", "capability Switch\n method flip(n)\n  return $n\n end\nend");
        let mut e = entity(1, &["Lights"]);

        let mut c = Composer::new(&mut e, &mut host);
        let path = MethodPath::parse("Lights$Lamp.go").unwrap();
        assert_eq!(c.dispatch(&path, &[]).unwrap(), Value::Int(5));
    }

    #[test]
    fn call_to_missing_behavior_is_an_error() {
        let mut host = TestHost::default();
        host.install_script("M", "B", "capability B\n method go\n  call Nope x\n end\nend");
        let mut e = entity(1, &["M"]);

        let err = Composer::new(&mut e, &mut host)
            .dispatch(&MethodPath::parse("M$B.go").unwrap(), &[])
            .unwrap_err();
        assert_eq!(err, InvocationError::MissingBehavior { behavior: "M$Nope".into(), method: "x".into() });
    }

    #[test]
    fn future_binds_module_and_behavior_names() {
        let mut host = TestHost::default();
        host.now = Turn(10);
        host.install_script("M", "B", "capability B\n method go\n  future 3 tick 1\n  future 0 Other.tock\n end\nend");
        let mut e = entity(5, &["M"]);

        Composer::new(&mut e, &mut host)
            .dispatch(&MethodPath::parse("M$B.go").unwrap(), &[])
            .unwrap();

        assert_eq!(
            host.scheduled,
            vec![
                DeferredTask::bound(InstanceId(5), BehaviorRef::new("M", "B"), "tick", vec![Value::Int(1)], Turn(13)),
                DeferredTask::bound(InstanceId(5), BehaviorRef::new("M", "Other"), "tock", vec![], Turn(10)),
            ]
        );
    }

    #[test]
    fn listen_qualifies_handler_and_is_idempotent() {
        let mut host = TestHost::default();
        host.install_script("M", "B", "capability B\n method setup\n  listen poke onPoke\n end\nend");
        let mut e = entity(3, &["M"]);
        let setup = MethodPath::parse("M$B.setup").unwrap();

        Composer::new(&mut e, &mut host).dispatch(&setup, &[]).unwrap();
        Composer::new(&mut e, &mut host).dispatch(&setup, &[]).unwrap();

        assert_eq!(e.listeners.len(), 1);
        let handlers: Vec<String> = e.listeners.handlers("3", "poke").map(|h| h.to_string()).collect();
        assert_eq!(handlers, vec!["M$B.onPoke"]);
    }

    #[test]
    fn publish_has_and_log_route_to_host() {
        let mut host = TestHost::default();
        host.install_script(
            "M",
            "B",
            "capability B\n method go\n  set ok has M\n  set no has Z\n  publish self done @ok\n  log \"hi\"\n end\nend",
        );
        let mut e = entity(8, &["M"]);

        Composer::new(&mut e, &mut host)
            .dispatch(&MethodPath::parse("M$B.go").unwrap(), &[])
            .unwrap();

        assert_eq!(e.get("ok"), Value::Bool(true));
        assert_eq!(e.get("no"), Value::Bool(false));
        assert_eq!(host.published, vec![("8".to_string(), "done".to_string(), Value::Bool(true))]);
        assert_eq!(host.logs, vec![(InstanceId(8), "hi".to_string())]);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut host = TestHost::default();
        host.install_script("M", "B", "capability B\n method go\n  listen e B.\n end\nend");
        let mut e = entity(1, &["M"]);

        let err = Composer::new(&mut e, &mut host)
            .dispatch(&MethodPath::parse("M$B.go").unwrap(), &[])
            .unwrap_err();
        assert_eq!(err, InvocationError::InvalidName("B.".into()));
    }

    #[test]
    fn self_recursion_stops_at_depth_limit() {
        let mut host = TestHost::default();
        host.install_script(
            "M",
            "Loop",
            "capability Loop\n method spin\n  invoke spin\n end\n method ok\n  return 1\n end\nend",
        );
        let mut e = entity(1, &["M"]);

        let mut c = Composer::new(&mut e, &mut host);
        let err = c.invoke("spin", &[]).unwrap_err();
        assert_eq!(
            err,
            InvocationError::TooDeep { capability: "M$Loop".into(), method: "spin".into(), depth: MAX_CALL_DEPTH }
        );
        assert_eq!(c.depth(), 0);
        assert_eq!(c.invoke("ok", &[]).unwrap(), Value::Int(1));
    }

    #[test]
    fn mutual_calls_stop_at_depth_limit() {
        let mut host = TestHost::default();
        host.install_script("M", "Ping", "capability Ping\n method go\n  call Pong go\n end\nend");
        host.install_script("M", "Pong", "capability Pong\n method go\n  call Ping go\n end\nend");
        let mut e = entity(1, &["M"]);

        let err = Composer::new(&mut e, &mut host)
            .dispatch(&MethodPath::parse("M$Ping.go").unwrap(), &[])
            .unwrap_err();
        assert!(matches!(err, InvocationError::TooDeep { depth: MAX_CALL_DEPTH, .. }), "{err:?}");
    }
}
