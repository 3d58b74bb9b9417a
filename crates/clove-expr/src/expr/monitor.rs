use crate::analyzer::analyze;
use crate::ast::{Form, HostType, Value};
use crate::context::{CompileContext, EvalEnv, Usage};
use crate::error::CloveError;
use crate::expr::{Expr, ExprNode};
use crate::vm::bytecode::Instruction;
use crate::vm::compiler::CodeGen;

/// `(monitor-enter target)`: acquires the host monitor of `target`.
#[derive(Debug)]
pub struct MonitorEnterExpr {
    target: Box<Expr>,
}

impl MonitorEnterExpr {
    pub fn parse(ctx: &CompileContext<'_>, form: &Form, _usage: Usage) -> Result<Expr, CloveError> {
        let items = form
            .as_list()
            .ok_or_else(|| ctx.parse_error(form.span, "monitor-enter expects a list form"))?;
        if items.len() != 2 {
            return Err(ctx.parse_error(
                form.span,
                format!(
                    "monitor-enter expects exactly 1 argument, got {}",
                    items.len().saturating_sub(1)
                ),
            ));
        }
        let target = analyze(ctx, &items[1], Usage::Value)?;
        Ok(Expr::MonitorEnter(MonitorEnterExpr {
            target: Box::new(target),
        }))
    }

    pub fn target(&self) -> &Expr {
        &self.target
    }
}

impl ExprNode for MonitorEnterExpr {
    fn static_type(&self) -> Option<HostType> {
        None
    }

    fn eval(&self, env: &EvalEnv<'_>) -> Result<Value, CloveError> {
        let target = self.target.eval(env)?;
        env.monitors.enter(&target)?;
        Ok(Value::Nil)
    }

    fn emit(&self, usage: Usage, gen: &mut CodeGen) -> Result<(), CloveError> {
        self.target.emit(Usage::Value, gen)?;
        let span = gen.span();
        gen.emit(Instruction::MonitorEnter(span));
        gen.emit(Instruction::ConstNil(span));
        gen.finish_usage(usage);
        Ok(())
    }
}
