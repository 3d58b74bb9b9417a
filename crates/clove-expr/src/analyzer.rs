use crate::ast::{Form, FormKind, HashMap, HashSet, Key, Value, Vector};
use crate::context::{CompileContext, Usage};
use crate::error::CloveError;
use crate::expr::{
    BodyExpr, CollectionExpr, ConstantExpr, DefExpr, EmptyExpr, Expr, InvokeExpr,
    MonitorEnterExpr, VarExpr,
};

pub type ParseFn = fn(&CompileContext<'_>, &Form, Usage) -> Result<Expr, CloveError>;

pub const SPECIAL_FORMS: &[&str] = &["def", "monitor-enter", "quote", "do"];

/// Parser for a list headed by `name`, when `name` is a special form.
pub fn special_form(name: &str) -> Option<ParseFn> {
    match name {
        "def" => Some(DefExpr::parse),
        "monitor-enter" => Some(MonitorEnterExpr::parse),
        "quote" => Some(ConstantExpr::parse_quote),
        "do" => Some(BodyExpr::parse),
        _ => None,
    }
}

pub fn analyze(ctx: &CompileContext<'_>, form: &Form, usage: Usage) -> Result<Expr, CloveError> {
    match &form.kind {
        FormKind::Nil
        | FormKind::Bool(_)
        | FormKind::Int(_)
        | FormKind::Float(_)
        | FormKind::String(_)
        | FormKind::Keyword(_) => Ok(Expr::Constant(ConstantExpr::new(form_to_value(form)?))),
        FormKind::Symbol(sym) => VarExpr::parse_symbol(ctx, sym, form.span),
        FormKind::List(items) => match items.first() {
            None => Ok(Expr::Empty(EmptyExpr::new(Value::List(Vector::new()))?)),
            Some(head) => {
                let parser = head
                    .as_symbol()
                    .filter(|sym| !sym.is_qualified())
                    .and_then(|sym| special_form(sym.name()));
                match parser {
                    Some(parse) => parse(ctx, form, usage),
                    None => InvokeExpr::parse(ctx, form, usage),
                }
            }
        },
        FormKind::Vector(_) | FormKind::Map(_) | FormKind::Set(_) => {
            CollectionExpr::parse(ctx, form, usage)
        }
    }
}

/// Converts quoted data into a runtime value. Symbols stay symbols.
pub fn form_to_value(form: &Form) -> Result<Value, CloveError> {
    Ok(match &form.kind {
        FormKind::Nil => Value::Nil,
        FormKind::Bool(b) => Value::Bool(*b),
        FormKind::Int(n) => Value::Int(*n),
        FormKind::Float(n) => Value::Float(*n),
        FormKind::String(s) => Value::String(s.clone()),
        FormKind::Keyword(k) => Value::Keyword(k.clone()),
        FormKind::Symbol(sym) => Value::Symbol(sym.clone()),
        FormKind::List(items) => Value::List(
            items
                .iter()
                .map(form_to_value)
                .collect::<Result<Vector<_>, _>>()?,
        ),
        FormKind::Vector(items) => Value::Vector(
            items
                .iter()
                .map(form_to_value)
                .collect::<Result<Vector<_>, _>>()?,
        ),
        FormKind::Set(items) => Value::Set(
            items
                .iter()
                .map(form_to_value)
                .collect::<Result<HashSet<_>, _>>()?,
        ),
        FormKind::Map(entries) => {
            let mut map = HashMap::new();
            for (k, v) in entries {
                let key = Key::from_value(&form_to_value(k)?)
                    .map_err(|err| err.with_span(k.span))?;
                map.insert(key, form_to_value(v)?);
            }
            Value::Map(map)
        }
    })
}
