use std::sync::Arc;

use crate::ast::{HostType, Span, Symbol, Value};
use crate::context::{CompileContext, EvalEnv, Usage};
use crate::error::CloveError;
use crate::expr::{Expr, ExprNode};
use crate::namespaces::lookup_var;
use crate::var::Var;
use crate::vm::bytecode::Instruction;
use crate::vm::compiler::CodeGen;

/// A symbol resolved to a var; evaluates to the var's current value.
#[derive(Debug)]
pub struct VarExpr {
    var: Arc<Var>,
}

impl VarExpr {
    pub fn parse_symbol(
        ctx: &CompileContext<'_>,
        sym: &Symbol,
        span: Span,
    ) -> Result<Expr, CloveError> {
        let var = lookup_var(ctx.registry, &ctx.ns, sym, false)
            .map_err(|err| err.with_span(span).with_file(Some(ctx.source_path().to_string())))?
            .ok_or_else(|| {
                ctx.lookup_error(
                    span,
                    format!("Unable to resolve symbol: {} in this context", sym),
                )
            })?;
        Ok(Expr::Var(VarExpr { var }))
    }

    pub fn var(&self) -> &Arc<Var> {
        &self.var
    }
}

impl ExprNode for VarExpr {
    fn static_type(&self) -> Option<HostType> {
        None
    }

    fn eval(&self, _env: &EvalEnv<'_>) -> Result<Value, CloveError> {
        self.var.deref()
    }

    fn emit(&self, usage: Usage, gen: &mut CodeGen) -> Result<(), CloveError> {
        let span = gen.span();
        let idx = gen.var_index(&self.var);
        gen.emit(Instruction::DerefVar(idx, span));
        gen.finish_usage(usage);
        Ok(())
    }
}
