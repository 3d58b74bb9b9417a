use crate::analyzer::analyze;
use crate::ast::{CollKind, Form, FormKind, HashMap, HostType, Key, SymbolMeta, Value};
use crate::context::{CompileContext, EvalEnv, Usage};
use crate::error::CloveError;
use crate::expr::{canonical_empty, ConstantExpr, EmptyExpr, Expr, ExprNode};
use crate::vm::bytecode::Instruction;
use crate::vm::compiler::CodeGen;

/// A non-empty vector, map or set literal whose items are evaluated.
/// Map entries are stored flattened as key, value, key, value.
#[derive(Debug)]
pub struct CollectionExpr {
    kind: CollKind,
    items: Vec<Expr>,
}

impl CollectionExpr {
    pub fn parse(ctx: &CompileContext<'_>, form: &Form, _usage: Usage) -> Result<Expr, CloveError> {
        let (kind, forms): (CollKind, Vec<&Form>) = match &form.kind {
            FormKind::Vector(items) => (CollKind::Vector, items.iter().collect()),
            FormKind::Set(items) => (CollKind::Set, items.iter().collect()),
            FormKind::Map(entries) => (
                CollKind::Map,
                entries.iter().flat_map(|(k, v)| [k, v]).collect(),
            ),
            _ => {
                return Err(ctx.parse_error(
                    form.span,
                    format!("expected a collection literal, got {}", form.kind_name()),
                ))
            }
        };
        if forms.is_empty() {
            return Ok(Expr::Empty(EmptyExpr::new(canonical_empty(kind).clone())?));
        }
        let items = forms
            .into_iter()
            .map(|item| analyze(ctx, item, Usage::Value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::Collection(CollectionExpr { kind, items }))
    }

    /// Map expression over reader metadata; keys are constants, values are
    /// analyzed forms.
    pub fn from_meta(ctx: &CompileContext<'_>, meta: &SymbolMeta) -> Result<Expr, CloveError> {
        let mut items = Vec::with_capacity(meta.len() * 2);
        for (key, form) in meta.iter() {
            items.push(Expr::Constant(ConstantExpr::new(key.to_value())));
            items.push(analyze(ctx, form, Usage::Value)?);
        }
        Ok(Expr::Collection(CollectionExpr {
            kind: CollKind::Map,
            items,
        }))
    }

    pub fn kind(&self) -> CollKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        match self.kind {
            CollKind::Map => self.items.len() / 2,
            _ => self.items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ExprNode for CollectionExpr {
    fn static_type(&self) -> Option<HostType> {
        Some(self.kind.into())
    }

    fn eval(&self, env: &EvalEnv<'_>) -> Result<Value, CloveError> {
        let values = self
            .items
            .iter()
            .map(|item| item.eval(env))
            .collect::<Result<Vec<_>, _>>()?;
        build_collection(self.kind, values)
    }

    fn emit(&self, usage: Usage, gen: &mut CodeGen) -> Result<(), CloveError> {
        for item in &self.items {
            item.emit(Usage::Value, gen)?;
        }
        let span = gen.span();
        let instr = match self.kind {
            CollKind::Vector => Instruction::MakeVector(self.items.len(), span),
            CollKind::Set => Instruction::MakeSet(self.items.len(), span),
            CollKind::Map => Instruction::MakeMap(self.items.len() / 2, span),
            CollKind::List => {
                return Err(CloveError::internal("list literals are invocations, not collections"))
            }
        };
        gen.emit(instr);
        gen.finish_usage(usage);
        Ok(())
    }
}

/// Builds a collection value from evaluated items. Map items alternate key
/// and value.
pub(crate) fn build_collection(kind: CollKind, values: Vec<Value>) -> Result<Value, CloveError> {
    match kind {
        CollKind::List => Ok(Value::List(values.into_iter().collect())),
        CollKind::Vector => Ok(Value::Vector(values.into_iter().collect())),
        CollKind::Set => Ok(Value::Set(values.into_iter().collect())),
        CollKind::Map => {
            if values.len() % 2 != 0 {
                return Err(CloveError::internal("map literal with odd number of items"));
            }
            let mut map = HashMap::new();
            let mut iter = values.into_iter();
            while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                map.insert(Key::from_value(&key)?, value);
            }
            Ok(Value::Map(map))
        }
    }
}
