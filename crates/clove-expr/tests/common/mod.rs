#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use clove_expr::ast::{FnArity, Form, Key, Span, SymbolMeta, Value};
use clove_expr::diagnostics::CollectingSink;
use clove_expr::error::CloveError;
use clove_expr::host::{IntrinsicLocks, Monitors};
use clove_expr::options::CompileOptions;
use clove_expr::runtime::RuntimeCtx;

pub const SOURCE: &str = "test.clv";

/// Shared, ordered record of observable side effects.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Monitor capability that records each acquire before delegating.
pub struct RecordingMonitors {
    events: EventLog,
    locks: IntrinsicLocks,
}

impl RecordingMonitors {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            locks: IntrinsicLocks::new(),
        }
    }

    pub fn locks(&self) -> &IntrinsicLocks {
        &self.locks
    }
}

impl Monitors for RecordingMonitors {
    fn enter(&self, target: &Value) -> Result<(), CloveError> {
        self.locks.enter(target)?;
        self.events
            .lock()
            .unwrap()
            .push(format!("enter {}", target));
        Ok(())
    }
}

pub struct Harness {
    pub rt: RuntimeCtx,
    pub warnings: Arc<CollectingSink>,
    pub monitors: Arc<RecordingMonitors>,
    pub events: EventLog,
}

impl Harness {
    pub fn new(use_vm: bool) -> Self {
        let mut options = CompileOptions::default()
            .with_vm(use_vm)
            .with_source_name(SOURCE);
        options.warn_on_earmuffs = true;
        Self::with_options(options)
    }

    pub fn with_options(options: CompileOptions) -> Self {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let warnings = Arc::new(CollectingSink::new());
        let monitors = Arc::new(RecordingMonitors::new(events.clone()));
        let rt = RuntimeCtx::with_host(options, monitors.clone(), warnings.clone());
        let log = events.clone();
        rt.define_native("mark", FnArity::exact(1), move |args| {
            log.lock().unwrap().push(format!("mark {}", args[0]));
            Ok(args[0].clone())
        });
        rt.define_native("fail", FnArity::exact(0), |_| {
            Err(CloveError::thrown("boom"))
        });
        rt.define_native("+", FnArity::at_least(0), |args| {
            let mut sum = 0;
            for arg in args {
                match arg {
                    Value::Int(n) => sum += n,
                    other => return Err(CloveError::type_mismatch("number", other.type_name())),
                }
            }
            Ok(Value::Int(sum))
        });
        Self {
            rt,
            warnings,
            monitors,
            events,
        }
    }

    pub fn eval(&self, form: &Form) -> Result<Value, CloveError> {
        self.rt.eval_form(form)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

pub fn sym(name: &str) -> Form {
    Form::symbol(name)
}

pub fn list(items: Vec<Form>) -> Form {
    Form::list(items)
}

/// The form placed on `line` of the test source.
pub fn on_line(form: Form, line: usize) -> Form {
    form.at(Span::at_line(line))
}

pub fn meta(entries: Vec<(&str, Form)>) -> SymbolMeta {
    entries
        .into_iter()
        .map(|(k, v)| (Key::keyword(k), v))
        .collect()
}

pub fn def(items: Vec<Form>) -> Form {
    let mut all = vec![sym("def")];
    all.extend(items);
    Form::list(all)
}

pub fn kw(name: &str) -> Value {
    Value::keyword(name)
}
