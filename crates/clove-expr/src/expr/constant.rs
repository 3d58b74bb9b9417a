use crate::analyzer::form_to_value;
use crate::ast::{Form, HostType, Value};
use crate::context::{CompileContext, EvalEnv, Usage};
use crate::error::CloveError;
use crate::expr::{EmptyExpr, Expr, ExprNode};
use crate::vm::compiler::CodeGen;

/// A literal or quoted value.
#[derive(Debug)]
pub struct ConstantExpr {
    value: Value,
}

impl ConstantExpr {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// `(quote x)`. Empty quoted collections fold into an empty literal.
    pub fn parse_quote(
        ctx: &CompileContext<'_>,
        form: &Form,
        _usage: Usage,
    ) -> Result<Expr, CloveError> {
        let items = form
            .as_list()
            .ok_or_else(|| ctx.parse_error(form.span, "quote expects a list form"))?;
        if items.len() != 2 {
            return Err(ctx.parse_error(form.span, "Wrong number of args to quote"));
        }
        let value = form_to_value(&items[1])?;
        Self::literal(value)
    }

    /// Wraps an already-converted value, routing empty collections to
    /// `EmptyExpr`.
    pub fn literal(value: Value) -> Result<Expr, CloveError> {
        if value.count() == Some(0) {
            return Ok(Expr::Empty(EmptyExpr::new(value)?));
        }
        Ok(Expr::Constant(ConstantExpr::new(value)))
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl ExprNode for ConstantExpr {
    fn static_type(&self) -> Option<HostType> {
        Some(self.value.host_type())
    }

    fn eval(&self, _env: &EvalEnv<'_>) -> Result<Value, CloveError> {
        Ok(self.value.clone())
    }

    fn emit(&self, usage: Usage, gen: &mut CodeGen) -> Result<(), CloveError> {
        gen.emit_const(self.value.clone());
        gen.finish_usage(usage);
        Ok(())
    }
}
