use crate::analyzer::analyze;
use crate::ast::{Form, HostType, Value};
use crate::context::{CompileContext, EvalEnv, SourcePos, Usage};
use crate::error::CloveError;
use crate::expr::{Expr, ExprNode};
use crate::vm::bytecode::Instruction;
use crate::vm::compiler::CodeGen;

/// `(f args...)`: calls a native function.
#[derive(Debug)]
pub struct InvokeExpr {
    callee: Box<Expr>,
    args: Vec<Expr>,
    pos: SourcePos,
}

impl InvokeExpr {
    pub fn parse(ctx: &CompileContext<'_>, form: &Form, _usage: Usage) -> Result<Expr, CloveError> {
        let items = form
            .as_list()
            .filter(|items| !items.is_empty())
            .ok_or_else(|| ctx.parse_error(form.span, "invocation needs a callee"))?;
        let callee = analyze(ctx, &items[0], Usage::Value)?;
        let args = items[1..]
            .iter()
            .map(|arg| analyze(ctx, arg, Usage::Value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::Invoke(InvokeExpr {
            callee: Box::new(callee),
            args,
            pos: ctx.pos(),
        }))
    }

    pub fn pos(&self) -> &SourcePos {
        &self.pos
    }
}

/// Calls `callee` with `args`. Vars are dereferenced first.
pub(crate) fn apply(callee: &Value, args: &[Value]) -> Result<Value, CloveError> {
    match callee {
        Value::Func(func) => func.call(args),
        Value::Var(var) => apply(&var.deref()?, args),
        other => Err(CloveError::type_mismatch("function", other.type_name())),
    }
}

impl ExprNode for InvokeExpr {
    fn static_type(&self) -> Option<HostType> {
        None
    }

    fn eval(&self, env: &EvalEnv<'_>) -> Result<Value, CloveError> {
        let run = || -> Result<Value, CloveError> {
            let callee = self.callee.eval(env)?;
            let args = self
                .args
                .iter()
                .map(|arg| arg.eval(env))
                .collect::<Result<Vec<_>, _>>()?;
            apply(&callee, &args)
        };
        run().map_err(|err| self.pos.wrap(err))
    }

    fn emit(&self, usage: Usage, gen: &mut CodeGen) -> Result<(), CloveError> {
        gen.with_pos(&self.pos, |gen| {
            self.callee.emit(Usage::Value, gen)?;
            for arg in &self.args {
                arg.emit(Usage::Value, gen)?;
            }
            let span = gen.span();
            gen.emit(Instruction::Call(self.args.len(), span));
            gen.finish_usage(usage);
            Ok(())
        })
    }
}
