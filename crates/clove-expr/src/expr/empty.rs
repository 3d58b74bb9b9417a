use once_cell::sync::Lazy;

use crate::ast::{CollKind, HashMap, HashSet, HostType, Value, Vector};
use crate::context::{EvalEnv, Usage};
use crate::error::CloveError;
use crate::expr::ExprNode;
use crate::vm::bytecode::Instruction;
use crate::vm::compiler::CodeGen;

static EMPTY_LIST: Lazy<Value> = Lazy::new(|| Value::List(Vector::new()));
static EMPTY_VECTOR: Lazy<Value> = Lazy::new(|| Value::Vector(Vector::new()));
static EMPTY_MAP: Lazy<Value> = Lazy::new(|| Value::Map(HashMap::new()));
static EMPTY_SET: Lazy<Value> = Lazy::new(|| Value::Set(HashSet::new()));

/// The process-wide empty instance of `kind`.
pub fn canonical_empty(kind: CollKind) -> &'static Value {
    match kind {
        CollKind::List => &EMPTY_LIST,
        CollKind::Vector => &EMPTY_VECTOR,
        CollKind::Map => &EMPTY_MAP,
        CollKind::Set => &EMPTY_SET,
    }
}

/// An empty collection literal: `()`, `[]`, `{}` or `#{}`.
#[derive(Debug)]
pub struct EmptyExpr {
    coll: Value,
    kind: CollKind,
}

impl EmptyExpr {
    pub fn new(coll: Value) -> Result<Self, CloveError> {
        let kind = coll.coll_kind().ok_or_else(|| {
            CloveError::internal(format!("Unknown collection type: {}", coll.type_name()))
        })?;
        if coll.count() != Some(0) {
            return Err(CloveError::internal(format!(
                "empty literal built from non-empty {}",
                kind.name()
            )));
        }
        Ok(Self { coll, kind })
    }

    pub fn kind(&self) -> CollKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.coll
    }
}

impl ExprNode for EmptyExpr {
    fn static_type(&self) -> Option<HostType> {
        Some(self.kind.into())
    }

    fn eval(&self, _env: &EvalEnv<'_>) -> Result<Value, CloveError> {
        Ok(self.coll.clone())
    }

    fn emit(&self, usage: Usage, gen: &mut CodeGen) -> Result<(), CloveError> {
        let span = gen.span();
        gen.emit(Instruction::EmptyCollection(self.kind, span));
        gen.finish_usage(usage);
        Ok(())
    }
}
