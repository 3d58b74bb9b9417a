mod common;

use clove_expr::ast::{CollKind, Form, HostType, Value};
use clove_expr::expr::{canonical_empty, Expr};
use clove_expr::vm::bytecode::Instruction;

use common::{list, sym, Harness};

fn empty_form(kind: CollKind) -> Form {
    match kind {
        CollKind::List => Form::list(vec![]),
        CollKind::Vector => Form::vector(vec![]),
        CollKind::Map => Form::map(vec![]),
        CollKind::Set => Form::set(vec![]),
    }
}

const KINDS: [CollKind; 4] = [CollKind::List, CollKind::Vector, CollKind::Map, CollKind::Set];

#[test]
fn empty_literals_analyze_to_empty_nodes() {
    let h = Harness::new(false);
    for kind in KINDS {
        let expr = h.rt.analyze(&empty_form(kind)).unwrap();
        match &expr {
            Expr::Empty(node) => assert_eq!(node.kind(), kind),
            other => panic!("expected empty node, got {}", other.kind_name()),
        }
        assert_eq!(expr.static_type(), Some(HostType::from(kind)));
    }
}

#[test]
fn codegen_references_the_shared_instance() {
    let h = Harness::new(true);
    for kind in KINDS {
        let shared: Vec<&'static Value> = (0..2)
            .map(|_| {
                let compiled = h.rt.compile(&empty_form(kind)).unwrap();
                assert!(compiled.chunk.constants().is_empty());
                match compiled.chunk.code()[0] {
                    Instruction::EmptyCollection(k, _) => {
                        assert_eq!(k, kind);
                        canonical_empty(k)
                    }
                    ref other => panic!("expected empty collection, got {:?}", other),
                }
            })
            .collect();
        assert!(std::ptr::eq(shared[0], shared[1]));
        assert_eq!(shared[0].coll_kind(), Some(kind));
    }
}

#[test]
fn empty_literals_evaluate_to_empty_collections() {
    for use_vm in [false, true] {
        let h = Harness::new(use_vm);
        for kind in KINDS {
            let value = h.eval(&empty_form(kind)).unwrap();
            assert_eq!(value.coll_kind(), Some(kind));
            assert_eq!(value.count(), Some(0));
            let items = match &value {
                Value::List(items) | Value::Vector(items) => items.iter().count(),
                Value::Map(map) => map.iter().count(),
                Value::Set(set) => set.iter().count(),
                other => panic!("not a collection: {}", other),
            };
            assert_eq!(items, 0);
        }
    }
}

#[test]
fn quoted_empty_collections_fold_to_empty_nodes() {
    let h = Harness::new(false);
    let expr = h.rt.analyze(&Form::quote(Form::vector(vec![]))).unwrap();
    assert!(matches!(&expr, Expr::Empty(node) if node.kind() == CollKind::Vector));
    let expr = h.rt.analyze(&Form::quote(Form::vector(vec![Form::int(1)]))).unwrap();
    assert!(matches!(expr, Expr::Constant(_)));
}

#[test]
fn discarded_empty_literal_is_popped() {
    let h = Harness::new(true);
    let form = list(vec![sym("do"), Form::set(vec![]), Form::int(1)]);
    let compiled = h.rt.compile(&form).unwrap();
    let code = compiled.chunk.code();
    assert!(matches!(code[0], Instruction::EmptyCollection(CollKind::Set, _)));
    assert!(matches!(code[1], Instruction::Pop(_)));
    assert_eq!(h.eval(&form).unwrap(), Value::Int(1));
}

#[test]
fn empty_literal_inside_def_is_bound() {
    for use_vm in [false, true] {
        let h = Harness::new(use_vm);
        let form = list(vec![sym("def"), sym("nothing"), Form::map(vec![])]);
        h.eval(&form).unwrap();
        let value = h.eval(&sym("nothing")).unwrap();
        assert_eq!(value.coll_kind(), Some(CollKind::Map));
        assert_eq!(value.count(), Some(0));
    }
}
