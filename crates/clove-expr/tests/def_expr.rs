mod common;

use std::sync::Arc;

use clove_expr::analyzer::{analyze, form_to_value};
use clove_expr::ast::{FnArity, Form, HostType, Span, Symbol, Value};
use clove_expr::context::{CompileContext, EvalEnv, Usage};
use clove_expr::diagnostics::CollectingSink;
use clove_expr::error::CloveError;
use clove_expr::expr::Expr;
use clove_expr::host::IntrinsicLocks;
use clove_expr::namespaces::{BindingRegistry, NamespaceStore};
use clove_expr::options::CompileOptions;
use clove_expr::var::push_thread_bindings;
use clove_expr::vm::bytecode::Instruction;
use clove_expr::vm::CodeGen;

use common::{def, kw, list, meta, on_line, sym, Harness, SOURCE};

fn var_of(value: Value) -> Arc<clove_expr::var::Var> {
    match value {
        Value::Var(var) => var,
        other => panic!("expected var, got {}", other),
    }
}

fn both_modes(check: impl Fn(Harness)) {
    for use_vm in [false, true] {
        check(Harness::new(use_vm));
    }
}

#[test]
fn def_binds_root_and_returns_var() {
    both_modes(|h| {
        let form = def(vec![sym("x"), list(vec![sym("+"), Form::int(1), Form::int(2)])]);
        let var = var_of(h.eval(&form).unwrap());
        assert_eq!(var.qualified_name(), "user/x");
        assert_eq!(var.root(), Some(Value::Int(3)));
        let mapped = h.rt.namespaces().lookup("user", "x").unwrap();
        assert!(Arc::ptr_eq(&var, &mapped));
        assert_eq!(h.eval(&sym("x")).unwrap(), Value::Int(3));
    });
}

#[test]
fn def_without_init_leaves_var_unbound() {
    both_modes(|h| {
        let var = var_of(h.eval(&def(vec![sym("pending")])).unwrap());
        assert!(!var.has_root());
        let err = h.eval(&on_line(sym("pending"), 2)).unwrap_err();
        assert_eq!(err.position(), Some((SOURCE, 2)));
        assert!(matches!(err.root_cause(), CloveError::Runtime(_)));
    });
}

#[test]
fn docstring_is_moved_to_meta() {
    both_modes(|h| {
        let form = def(vec![sym("s"), Form::string("doc"), Form::int(5)]);
        let var = var_of(h.eval(&form).unwrap());
        assert_eq!(var.root(), Some(Value::Int(5)));
        assert_eq!(var.meta_value("doc"), Some(Value::String("doc".into())));
    });
}

#[test]
fn string_with_two_arguments_is_the_initializer() {
    both_modes(|h| {
        let var = var_of(h.eval(&def(vec![sym("s"), Form::string("x")])).unwrap());
        assert_eq!(var.root(), Some(Value::String("x".into())));
        assert_eq!(var.meta_value("doc"), None);
    });
}

#[test]
fn arity_and_shape_errors_are_parse_errors() {
    let h = Harness::new(false);
    let cases = [
        def(vec![]),
        def(vec![sym("s"), Form::int(1), Form::int(2), Form::int(3)]),
        def(vec![sym("s"), Form::string("doc"), Form::int(1), Form::int(2)]),
        def(vec![Form::int(1), Form::int(2)]),
    ];
    for form in cases {
        let err = h.eval(&form).unwrap_err();
        assert!(matches!(err, CloveError::Parse(_)), "{:?}", err);
    }
    let err = h.eval(&def(vec![])).unwrap_err();
    assert!(err.to_string().contains("Too few arguments to def"));
    let err = h.eval(&def(vec![Form::int(1), Form::int(2)])).unwrap_err();
    assert!(err.to_string().contains("First argument to def must be a Symbol"));
}

#[test]
fn earmuffed_name_without_dynamic_warns() {
    let h = Harness::new(false);
    let var = var_of(h.eval(&on_line(def(vec![sym("*x*"), Form::int(1)]), 5)).unwrap());
    assert!(!var.is_dynamic());
    let warnings = h.warnings.take();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].symbol, "*x*");
    assert_eq!(warnings[0].file, SOURCE);
    assert_eq!(warnings[0].line, 5);
    assert!(warnings[0].message.contains("^:dynamic *x*"));
}

#[test]
fn dynamic_false_still_warns_for_earmuffs() {
    let h = Harness::new(false);
    let target = Form::symbol_with_meta("*y*", meta(vec![("dynamic", Form::bool(false))]));
    let var = var_of(h.eval(&def(vec![target, Form::int(1)])).unwrap());
    assert!(!var.is_dynamic());
    assert_eq!(h.warnings.warnings().len(), 1);
}

#[test]
fn dynamic_meta_marks_var_without_warning() {
    both_modes(|h| {
        for name in ["*out*", "plain"] {
            let target = Form::symbol_with_meta(name, meta(vec![("dynamic", Form::bool(true))]));
            let var = var_of(h.eval(&def(vec![target, Form::int(1)])).unwrap());
            assert!(var.is_dynamic(), "{}", name);
            assert_eq!(var.meta_value("dynamic"), Some(Value::Bool(true)));
        }
        assert!(h.warnings.warnings().is_empty());
    });
}

#[test]
fn earmuff_warning_can_be_switched_off() {
    let mut options = CompileOptions::default().with_vm(false);
    options.warn_on_earmuffs = false;
    let h = Harness::with_options(options);
    h.eval(&def(vec![sym("*quiet*"), Form::int(1)])).unwrap();
    assert!(h.warnings.warnings().is_empty());
}

#[test]
fn redefinition_overwrites_root() {
    both_modes(|h| {
        let first = var_of(h.eval(&def(vec![sym("x"), Form::int(1)])).unwrap());
        let second = var_of(h.eval(&def(vec![sym("x"), Form::int(2)])).unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.root(), Some(Value::Int(2)));
    });
}

#[test]
fn redefinition_without_dynamic_keeps_flag() {
    let h = Harness::new(false);
    let target = Form::symbol_with_meta("d", meta(vec![("dynamic", Form::bool(true))]));
    let var = var_of(h.eval(&def(vec![target, Form::int(1)])).unwrap());
    h.eval(&def(vec![sym("d"), Form::int(2)])).unwrap();
    assert!(var.is_dynamic());
}

#[test]
fn quoted_arglists_are_unwrapped() {
    both_modes(|h| {
        let shape = list(vec![Form::vector(vec![sym("x")])]);
        let target = Form::symbol_with_meta(
            "f",
            meta(vec![("arglists", Form::quote(shape.clone()))]),
        );
        let var = var_of(h.eval(&def(vec![target, Form::int(1)])).unwrap());
        let expected = form_to_value(&shape).unwrap();
        assert_eq!(var.meta_value("arglists"), Some(expected));
    });
}

#[test]
fn arglists_are_attached_during_analysis() {
    let h = Harness::new(false);
    let shape = list(vec![Form::vector(vec![sym("a"), sym("b")])]);
    let target = Form::symbol_with_meta("g", meta(vec![("arglists", Form::quote(shape.clone()))]));
    h.rt.analyze(&def(vec![target])).unwrap();
    let var = h.rt.namespaces().lookup("user", "g").unwrap();
    assert_eq!(var.meta_value("arglists"), Some(form_to_value(&shape).unwrap()));
}

#[test]
fn meta_always_carries_line_and_file() {
    both_modes(|h| {
        let var = var_of(h.eval(&on_line(def(vec![sym("m"), Form::nil()]), 9)).unwrap());
        assert_eq!(var.meta_value("line"), Some(Value::Int(9)));
        assert_eq!(var.meta_value("file"), Some(Value::String(SOURCE.into())));
        assert_eq!(var.root(), Some(Value::Nil));
    });
}

#[test]
fn user_meta_is_kept_alongside_position() {
    let h = Harness::new(true);
    let target = Form::symbol_with_meta("tagged", meta(vec![("private", Form::bool(true))]));
    let var = var_of(h.eval(&def(vec![target, Form::int(1)])).unwrap());
    assert_eq!(var.meta_value("private"), Some(Value::Bool(true)));
    assert!(var.meta().contains_key(&clove_expr::ast::Key::keyword("line")));
}

#[test]
fn missing_source_is_reported_as_no_source_file() {
    let h = Harness::with_options(CompileOptions::default().with_vm(false));
    let var = var_of(h.eval(&def(vec![sym("anon"), Form::int(1)])).unwrap());
    assert_eq!(
        var.meta_value("file"),
        Some(Value::String("NO_SOURCE_FILE".into()))
    );
}

#[test]
fn qualified_def_outside_current_namespace_fails() {
    let h = Harness::new(false);
    h.rt.namespaces().intern("other", &Symbol::parse("z"));

    let err = h.eval(&def(vec![sym("other/z"), Form::int(1)])).unwrap_err();
    assert!(matches!(err, CloveError::Lookup(_)));
    assert!(err.to_string().contains("Can't create defs outside of current namespace"));

    let err = h.eval(&def(vec![sym("other/missing"), Form::int(1)])).unwrap_err();
    assert!(err.to_string().contains("Can't refer to qualified var that doesn't exist"));

    let err = h.eval(&def(vec![sym("nowhere/x"), Form::int(1)])).unwrap_err();
    assert!(matches!(err, CloveError::Lookup(_)));
    assert!(err.to_string().contains("No such namespace: nowhere"));
}

#[test]
fn qualified_def_in_current_namespace_interns() {
    both_modes(|h| {
        let var = var_of(h.eval(&def(vec![sym("user/q"), Form::int(4)])).unwrap());
        assert_eq!(var.ns(), "user");
        assert_eq!(h.eval(&sym("q")).unwrap(), Value::Int(4));
    });
}

#[test]
fn unqualified_def_replaces_referral() {
    let h = Harness::new(false);
    let foreign = h.rt.namespaces().intern("other", &Symbol::parse("inc"));
    foreign.bind_root(Value::Int(0));
    h.rt.namespaces().refer("user", "inc", foreign.clone());

    let local = var_of(h.eval(&def(vec![sym("inc"), Form::int(1)])).unwrap());
    assert_eq!(local.ns(), "user");
    assert!(!Arc::ptr_eq(&local, &foreign));
    assert_eq!(foreign.root(), Some(Value::Int(0)));
    assert_eq!(h.eval(&sym("inc")).unwrap(), Value::Int(1));
}

#[test]
fn init_failure_is_wrapped_once_with_parse_line() {
    both_modes(|h| {
        let form = on_line(def(vec![sym("bad"), list(vec![sym("fail")])]), 4);
        let err = h.eval(&form).unwrap_err();
        assert_eq!(err.position(), Some((SOURCE, 4)));
        match &err {
            CloveError::Compiler { cause, .. } => {
                assert!(matches!(cause.as_ref(), CloveError::Thrown(_)))
            }
            other => panic!("expected compiler exception, got {:?}", other),
        }
    });
}

#[test]
fn lookup_failure_from_init_is_wrapped_with_def_line() {
    both_modes(|h| {
        h.rt.define_native("resolve-late", FnArity::exact(0), |_| {
            Err(CloveError::lookup("late lookup failure"))
        });
        let form = on_line(def(vec![sym("y"), list(vec![sym("resolve-late")])]), 11);
        let err = h.eval(&form).unwrap_err();
        assert_eq!(err.position(), Some((SOURCE, 11)));
        match &err {
            CloveError::Compiler { cause, .. } => {
                assert!(matches!(cause.as_ref(), CloveError::Lookup(_)))
            }
            other => panic!("expected compiler exception, got {:?}", other),
        }
    });
}

#[test]
fn eval_reports_line_recorded_at_analysis() {
    let store = NamespaceStore::new();
    store.ensure_ns("user");
    let fail = store.intern("user", &Symbol::parse("fail"));
    fail.bind_root(Value::native_fn(
        "fail",
        FnArity::exact(0),
        |_| Err(CloveError::thrown("late")),
    ));
    let sink = CollectingSink::new();
    let ctx = CompileContext::new(&store, &sink, "user")
        .with_source(Some("early.clv".into()))
        .at_line(7);
    let form = def(vec![sym("v"), list(vec![sym("fail")])]).at(Span::at_line(30));
    let expr = analyze(&ctx, &form, Usage::Value).unwrap();
    assert_eq!(expr.static_type(), Some(HostType::Var));

    let locks = IntrinsicLocks::new();
    let err = expr.eval(&EvalEnv::new(&locks)).unwrap_err();
    assert_eq!(err.position(), Some(("early.clv", 7)));
}

#[test]
fn discarded_def_emits_in_order_and_pops() {
    let store = NamespaceStore::new();
    store.ensure_ns("user");
    let sink = CollectingSink::new();
    let ctx = CompileContext::new(&store, &sink, "user").at_line(1);
    let target = Form::symbol_with_meta("*e*", meta(vec![("dynamic", Form::bool(true))]));
    let expr = analyze(&ctx, &def(vec![target, Form::int(8)]), Usage::Discarded).unwrap();
    match &expr {
        Expr::Def(node) => {
            assert!(node.has_init());
            assert!(node.has_meta());
            assert!(node.is_dynamic());
        }
        other => panic!("expected def node, got {}", other.kind_name()),
    }

    let mut gen = CodeGen::new("NO_SOURCE_FILE", Span::at_line(1));
    expr.emit(Usage::Discarded, &mut gen).unwrap();
    let code = gen.code();
    assert!(matches!(code[0], Instruction::PushVar(_, _)));
    assert!(matches!(code[1], Instruction::SetDynamic(_)));
    assert!(matches!(code[2], Instruction::Dup(_)));
    let set_meta = code
        .iter()
        .position(|i| matches!(i, Instruction::SetMeta(_)))
        .unwrap();
    assert!(matches!(code[set_meta - 1], Instruction::MakeMap(3, _)));
    assert!(matches!(code[set_meta + 1], Instruction::Dup(_)));
    assert!(matches!(code[set_meta + 2], Instruction::Const(_, _)));
    assert!(matches!(code[set_meta + 3], Instruction::BindRoot(_)));
    assert_eq!(code.len(), set_meta + 5);
    assert!(matches!(code.last(), Some(Instruction::Pop(_))));
}

#[test]
fn value_def_leaves_var_on_stack() {
    let store = NamespaceStore::new();
    store.ensure_ns("user");
    let sink = CollectingSink::new();
    let ctx = CompileContext::new(&store, &sink, "user");
    let expr = analyze(&ctx, &def(vec![sym("k")]), Usage::Value).unwrap();
    assert!(matches!(&expr, Expr::Def(node) if !node.has_init() && node.has_meta()));
    let mut gen = CodeGen::new("NO_SOURCE_FILE", Span::default());
    expr.emit(Usage::Value, &mut gen).unwrap();
    assert!(!gen
        .code()
        .iter()
        .any(|i| matches!(i, Instruction::Pop(_) | Instruction::BindRoot(_))));
    assert!(matches!(gen.code().last(), Some(Instruction::SetMeta(_))));
}

#[test]
fn thread_bindings_follow_dynamic_flag() {
    let h = Harness::new(false);
    let target = Form::symbol_with_meta("*depth*", meta(vec![("dynamic", Form::bool(true))]));
    let dynamic = var_of(h.eval(&def(vec![target, Form::int(1)])).unwrap());
    let fixed = var_of(h.eval(&def(vec![sym("fixed"), Form::int(1)])).unwrap());

    {
        let _guard = push_thread_bindings(&[(dynamic.clone(), Value::Int(2))]).unwrap();
        assert_eq!(h.eval(&sym("*depth*")).unwrap(), Value::Int(2));
        let other = dynamic.clone();
        let seen = std::thread::spawn(move || other.deref().unwrap())
            .join()
            .unwrap();
        assert_eq!(seen, Value::Int(1));
    }
    assert_eq!(h.eval(&sym("*depth*")).unwrap(), Value::Int(1));

    let err = push_thread_bindings(&[(fixed, Value::Int(3))]).unwrap_err();
    assert!(matches!(err, CloveError::Runtime(_)));
}

#[test]
fn unresolved_symbol_is_a_lookup_error() {
    let h = Harness::new(false);
    let err = h.eval(&sym("nothing-here")).unwrap_err();
    assert!(matches!(err, CloveError::Lookup(_)));
    assert_eq!(kw("a"), Value::keyword("a"));
}
