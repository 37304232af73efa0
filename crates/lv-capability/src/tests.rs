//! Unit tests for lv-capability.

use std::collections::BTreeMap;

use lv_core::{InstanceId, Value};

use crate::{
    Accessor, CapabilityTable, CompileError, Compiler, InvocationError, InvocationResult,
    Receiver, ScriptCompiler,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// A flat receiver: fields in a map, `invoke` dispatches into one table,
/// everything routed to the world is recorded.
#[derive(Default)]
struct TestRx {
    id:         InstanceId,
    fields:     BTreeMap<String, Value>,
    table:      Option<CapabilityTable>,
    calls:      Vec<(String, String, Vec<Value>)>,
    futures:    Vec<(u64, String, Vec<Value>)>,
    subs:       Vec<(String, String, String)>,
    published:  Vec<(String, String, Value)>,
    logs:       Vec<String>,
    attached:   Vec<&'static str>,
}

impl TestRx {
    fn new(id: u64) -> Self {
        Self { id: InstanceId(id), ..Self::default() }
    }

    fn with_table(mut self, table: CapabilityTable) -> Self {
        self.table = Some(table);
        self
    }

    fn field(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or_default()
    }
}

impl Receiver for TestRx {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn get(&mut self, name: &str) -> InvocationResult<Value> {
        Ok(self.field(name))
    }

    fn set(&mut self, name: &str, value: Value) -> InvocationResult<()> {
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    fn invoke(&mut self, method: &str, args: &[Value]) -> InvocationResult<Value> {
        let found = self.table.as_ref().and_then(|t| t.method(method).cloned());
        match found {
            Some(m) => m.call(self, args),
            None => Err(InvocationError::UnknownMethod {
                capability: "TestRx".into(),
                method:     method.into(),
            }),
        }
    }

    fn call(&mut self, target: &str, method: &str, args: &[Value]) -> InvocationResult<Value> {
        self.calls.push((target.into(), method.into(), args.to_vec()));
        Ok(Value::Int(self.calls.len() as i64))
    }

    fn future(&mut self, delay: u64, method: &str, args: &[Value]) -> InvocationResult<()> {
        self.futures.push((delay, method.into(), args.to_vec()));
        Ok(())
    }

    fn subscribe(&mut self, scope: &str, event: &str, handler: &str) -> InvocationResult<()> {
        self.subs.push((scope.into(), event.into(), handler.into()));
        Ok(())
    }

    fn publish(&mut self, scope: &str, event: &str, data: Value) {
        self.published.push((scope.into(), event.into(), data));
    }

    fn has(&mut self, spec: &str, _method: Option<&str>) -> bool {
        self.attached.iter().any(|a| *a == spec)
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.into());
    }
}

fn compile(src: &str) -> Result<CapabilityTable, CompileError> {
    ScriptCompiler::new().compile(src, "test/module.lv")
}

fn run(table: &CapabilityTable, rx: &mut TestRx, method: &str, args: &[Value]) -> InvocationResult<Value> {
    let m = table.method(method).cloned().expect("method present");
    m.call(rx, args)
}

const COUNTER: &str = r#"
capability Counter
  accessor label -> labelText
  accessor kind = "counter"

  # lifecycle
  method setup
    set count 0
    listen bump onBump
  end

  method onBump(amount)
    add count $amount
    future 1 announce @count
  end

  method announce(n)
    publish self counted $n
    log "count is" $n
  end

  method teardown
    set count null
  end
end
"#;

// ── Table ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod table_tests {
    use super::*;

    #[test]
    fn builder_registers_members() {
        let table = CapabilityTable::new("T")
            .with_method("setup", |_rx, _args| Ok(Value::Null))
            .with_method("go", |_rx, args| Ok(args.first().cloned().unwrap_or_default()))
            .with_accessor("x", Accessor::default());

        assert_eq!(table.name(), "T");
        assert!(table.has_setup());
        assert!(!table.has_teardown());
        assert!(table.defines("x"));
        assert!(!table.has_method("x"));
        assert_eq!(table.member_names(), vec!["go", "setup", "x"]);
    }

    #[test]
    fn method_call_receives_args() {
        let table = CapabilityTable::new("T")
            .with_method("echo", |_rx, args| Ok(args[0].clone()));
        let mut rx = TestRx::new(1);
        assert_eq!(run(&table, &mut rx, "echo", &[Value::Int(5)]).unwrap(), Value::Int(5));
    }

    #[test]
    fn later_insert_replaces() {
        let table = CapabilityTable::new("T")
            .with_method("go", |_rx, _| Ok(Value::Int(1)))
            .with_method("go", |_rx, _| Ok(Value::Int(2)));
        let mut rx = TestRx::new(1);
        assert_eq!(run(&table, &mut rx, "go", &[]).unwrap(), Value::Int(2));
    }
}

// ── Compiler trait ────────────────────────────────────────────────────────────

#[cfg(test)]
mod compiler_tests {
    use super::*;

    #[test]
    fn closures_are_compilers() {
        let compiler = |source: &str, _location: &str| -> Result<CapabilityTable, CompileError> {
            Ok(CapabilityTable::new(source.trim()))
        };
        let table = compiler.compile(" Named ", "x").unwrap();
        assert_eq!(table.name(), "Named");
    }

    #[test]
    fn compiler_is_object_safe() {
        let boxed: Box<dyn Compiler> = Box::new(ScriptCompiler::new());
        let table = boxed.compile(COUNTER, "counter.lv").unwrap();
        assert_eq!(table.name(), "Counter");
    }
}

// ── Script compiler ───────────────────────────────────────────────────────────

#[cfg(test)]
mod script_tests {
    use super::*;

    #[test]
    fn counter_members() {
        let table = compile(COUNTER).unwrap();
        assert_eq!(
            table.member_names(),
            vec!["announce", "onBump", "setup", "teardown", "kind", "label"]
        );
        assert!(table.has_setup());
        assert!(table.has_teardown());
    }

    #[test]
    fn setup_initialises_and_listens_on_own_scope() {
        let table = compile(COUNTER).unwrap();
        let mut rx = TestRx::new(42);
        run(&table, &mut rx, "setup", &[]).unwrap();

        assert_eq!(rx.field("count"), Value::Int(0));
        assert_eq!(rx.subs, vec![("42".to_string(), "bump".to_string(), "onBump".to_string())]);
    }

    #[test]
    fn named_args_and_future() {
        let table = compile(COUNTER).unwrap();
        let mut rx = TestRx::new(1);
        run(&table, &mut rx, "setup", &[]).unwrap();
        run(&table, &mut rx, "onBump", &[Value::Int(3)]).unwrap();
        run(&table, &mut rx, "onBump", &[Value::Int(4)]).unwrap();

        assert_eq!(rx.field("count"), Value::Int(7));
        assert_eq!(
            rx.futures,
            vec![
                (1, "announce".to_string(), vec![Value::Int(3)]),
                (1, "announce".to_string(), vec![Value::Int(7)]),
            ]
        );
    }

    #[test]
    fn publish_and_log() {
        let table = compile(COUNTER).unwrap();
        let mut rx = TestRx::new(9);
        run(&table, &mut rx, "announce", &[Value::Int(2)]).unwrap();

        assert_eq!(rx.published, vec![("9".to_string(), "counted".to_string(), Value::Int(2))]);
        assert_eq!(rx.logs, vec!["count is 2".to_string()]);
    }

    #[test]
    fn add_treats_null_as_zero() {
        let table = compile("capability A\n method go\n  add n 5\n end\nend").unwrap();
        let mut rx = TestRx::new(1);
        run(&table, &mut rx, "go", &[]).unwrap();
        assert_eq!(rx.field("n"), Value::Int(5));
    }

    #[test]
    fn add_on_text_fails_with_names() {
        let table = compile("capability A\n method go\n  add n 1\n end\nend").unwrap();
        let mut rx = TestRx::new(1);
        rx.fields.insert("n".into(), Value::from("x"));
        let err = run(&table, &mut rx, "go", &[]).unwrap_err();
        match err {
            InvocationError::Failed { capability, method, message } => {
                assert_eq!(capability, "A");
                assert_eq!(method, "go");
                assert!(message.starts_with("line 3:"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn push_builds_list() {
        let src = "capability A\n method go(x)\n  push items $x\n  push items \"b\"\n end\nend";
        let table = compile(src).unwrap();
        let mut rx = TestRx::new(1);
        run(&table, &mut rx, "go", &[Value::Int(1)]).unwrap();
        assert_eq!(rx.field("items"), Value::List(vec![Value::Int(1), Value::from("b")]));
    }

    #[test]
    fn return_call_and_has() {
        let src = r#"
capability A
  method viaCall
    return call Other$B ping 1 "two"
  end
  method lampAttached
    return has Lights$Lamp
  end
  method chained
    set out invoke lampAttached
    return @out
  end
end
"#;
        let table = compile(src).unwrap();
        let mut rx = TestRx::new(1).with_table(table.clone());
        rx.attached.push("Lights$Lamp");

        assert_eq!(run(&table, &mut rx, "viaCall", &[]).unwrap(), Value::Int(1));
        assert_eq!(
            rx.calls,
            vec![("Other$B".to_string(), "ping".to_string(), vec![Value::Int(1), Value::from("two")])]
        );
        assert_eq!(run(&table, &mut rx, "lampAttached", &[]).unwrap(), Value::Bool(true));
        assert_eq!(run(&table, &mut rx, "chained", &[]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn positional_args_and_missing_args() {
        let src = "capability A\n method go\n  return $1\n end\nend";
        let table = compile(src).unwrap();
        let mut rx = TestRx::new(1);
        assert_eq!(run(&table, &mut rx, "go", &[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(2));
        assert_eq!(run(&table, &mut rx, "go", &[]).unwrap(), Value::Null);
    }

    #[test]
    fn subscribe_with_text_scope() {
        let src = "capability A\n method setup\n  subscribe \"global\" tick onTick\n end\nend";
        let table = compile(src).unwrap();
        let mut rx = TestRx::new(1);
        run(&table, &mut rx, "setup", &[]).unwrap();
        assert_eq!(rx.subs, vec![("global".to_string(), "tick".to_string(), "onTick".to_string())]);
    }

    #[test]
    fn accessors_route_and_constants() {
        let table = compile(COUNTER).unwrap();
        let mut rx = TestRx::new(1);

        let label = table.accessor("label").cloned().unwrap();
        (label.set.unwrap())(&mut rx, Value::from("lamp")).unwrap();
        assert_eq!(rx.field("labelText"), Value::from("lamp"));
        assert_eq!((label.get.unwrap())(&mut rx).unwrap(), Value::from("lamp"));

        let kind = table.accessor("kind").cloned().unwrap();
        assert!(kind.set.is_none());
        assert_eq!((kind.get.unwrap())(&mut rx).unwrap(), Value::from("counter"));
    }

    #[test]
    fn string_escapes_and_comments() {
        let src = "capability A # trailing\n method go\n  return \"a \\\"q\\\" # not a comment\"\n end\nend";
        let table = compile(src).unwrap();
        let mut rx = TestRx::new(1);
        assert_eq!(run(&table, &mut rx, "go", &[]).unwrap(), Value::from("a \"q\" # not a comment"));
    }

    #[test]
    fn recompiling_same_source_is_equivalent() {
        let a = compile(COUNTER).unwrap();
        let b = compile(COUNTER).unwrap();
        assert_eq!(a.member_names(), b.member_names());

        let mut ra = TestRx::new(5);
        let mut rb = TestRx::new(5);
        for t in [(&a, &mut ra), (&b, &mut rb)] {
            let (table, rx) = t;
            run(table, rx, "setup", &[]).unwrap();
            run(table, rx, "onBump", &[Value::Int(2)]).unwrap();
        }
        assert_eq!(ra.fields, rb.fields);
        assert_eq!(ra.futures, rb.futures);
        assert_eq!(ra.subs, rb.subs);
    }
}

// ── Script compile errors ─────────────────────────────────────────────────────

#[cfg(test)]
mod script_error_tests {
    use super::*;

    fn err(src: &str) -> CompileError {
        compile(src).unwrap_err()
    }

    #[test]
    fn empty_source() {
        assert_eq!(err("  \n # only a comment\n").message, "empty source");
    }

    #[test]
    fn missing_header() {
        let e = err("method go\nend");
        assert_eq!(e.line, 1);
        assert!(e.message.contains("header"));
    }

    #[test]
    fn unknown_statement_reports_line() {
        let e = err("capability A\n method go\n  jump 3\n end\nend");
        assert_eq!(e.line, 3);
        assert_eq!(e.location, "test/module.lv");
        assert!(e.message.contains("jump"));
        assert!(e.to_string().starts_with("test/module.lv:3:"));
    }

    #[test]
    fn missing_method_end() {
        assert!(err("capability A\n method go\n  set x 1\n").message.contains("missing `end`"));
    }

    #[test]
    fn missing_capability_end() {
        assert!(err("capability A\n method go\n end\n").message.contains("missing `end`"));
    }

    #[test]
    fn duplicate_member() {
        let e = err("capability A\n accessor go = 1\n method go\n end\nend");
        assert!(e.message.contains("duplicate"));
    }

    #[test]
    fn unknown_argument() {
        assert!(err("capability A\n method go(a)\n  return $b\n end\nend").message.contains("$b"));
    }

    #[test]
    fn bad_expression_and_delay() {
        assert!(err("capability A\n method go\n  return bare\n end\nend").message.contains("bare"));
        assert!(err("capability A\n method go\n  future -1 go\n end\nend").message.contains("delay"));
    }

    #[test]
    fn trailing_content() {
        assert!(err("capability A\nend\nmethod go\nend").message.contains("after closing"));
    }

    #[test]
    fn unterminated_string() {
        assert!(err("capability A\n method go\n  log \"oops\n end\nend").message.contains("unterminated"));
    }
}
