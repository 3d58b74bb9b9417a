use crate::analyzer::analyze;
use crate::ast::{Form, HostType, Value};
use crate::context::{CompileContext, EvalEnv, Usage};
use crate::error::CloveError;
use crate::expr::{Expr, ExprNode};
use crate::vm::compiler::CodeGen;

/// `(do e1 ... en)`
#[derive(Debug)]
pub struct BodyExpr {
    exprs: Vec<Expr>,
}

impl BodyExpr {
    pub fn parse(ctx: &CompileContext<'_>, form: &Form, usage: Usage) -> Result<Expr, CloveError> {
        let items = form
            .as_list()
            .ok_or_else(|| ctx.parse_error(form.span, "do expects a list form"))?;
        let body = items.get(1..).unwrap_or_default();
        let last = body.len().saturating_sub(1);
        let exprs = body
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let item_usage = if idx == last { usage } else { Usage::Discarded };
                analyze(ctx, item, item_usage)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::Body(BodyExpr { exprs }))
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }
}

impl ExprNode for BodyExpr {
    fn static_type(&self) -> Option<HostType> {
        match self.exprs.last() {
            Some(last) => last.static_type(),
            None => Some(HostType::Nil),
        }
    }

    fn eval(&self, env: &EvalEnv<'_>) -> Result<Value, CloveError> {
        let mut result = Value::Nil;
        for expr in &self.exprs {
            result = expr.eval(env)?;
        }
        Ok(result)
    }

    fn emit(&self, usage: Usage, gen: &mut CodeGen) -> Result<(), CloveError> {
        let Some((last, init)) = self.exprs.split_last() else {
            gen.emit_const(Value::Nil);
            gen.finish_usage(usage);
            return Ok(());
        };
        for expr in init {
            expr.emit(Usage::Discarded, gen)?;
        }
        last.emit(usage, gen)
    }
}
