//! Analyzed expression nodes.
//!
//! Every node can be evaluated directly against the live registry (`eval`)
//! or lowered into a VM chunk (`emit`). Both paths must agree on the value
//! and on the side effects they perform.

mod body;
mod collection;
mod constant;
mod def;
mod empty;
mod invoke;
mod monitor;
mod var_ref;

pub use body::BodyExpr;
pub(crate) use collection::build_collection;
pub use collection::CollectionExpr;
pub use constant::ConstantExpr;
pub use def::DefExpr;
pub use empty::{canonical_empty, EmptyExpr};
pub(crate) use invoke::apply;
pub use invoke::InvokeExpr;
pub use monitor::MonitorEnterExpr;
pub use var_ref::VarExpr;

use crate::ast::{HostType, Value};
use crate::context::{EvalEnv, Usage};
use crate::error::CloveError;
use crate::vm::compiler::CodeGen;

/// Behavior shared by every node kind.
pub trait ExprNode {
    /// Host type of the result when it is known without evaluating.
    fn static_type(&self) -> Option<HostType>;

    fn eval(&self, env: &EvalEnv<'_>) -> Result<Value, CloveError>;

    /// Appends this node's instructions. The fragment leaves exactly one value
    /// on the stack unless `usage` discards it.
    fn emit(&self, usage: Usage, gen: &mut CodeGen) -> Result<(), CloveError>;
}

#[derive(Debug)]
pub enum Expr {
    Def(DefExpr),
    Empty(EmptyExpr),
    MonitorEnter(MonitorEnterExpr),
    Constant(ConstantExpr),
    Var(VarExpr),
    Collection(CollectionExpr),
    Invoke(InvokeExpr),
    Body(BodyExpr),
}

impl Expr {
    fn node(&self) -> &dyn ExprNode {
        match self {
            Expr::Def(node) => node,
            Expr::Empty(node) => node,
            Expr::MonitorEnter(node) => node,
            Expr::Constant(node) => node,
            Expr::Var(node) => node,
            Expr::Collection(node) => node,
            Expr::Invoke(node) => node,
            Expr::Body(node) => node,
        }
    }

    pub fn has_static_type(&self) -> bool {
        self.static_type().is_some()
    }

    pub fn static_type(&self) -> Option<HostType> {
        self.node().static_type()
    }

    pub fn eval(&self, env: &EvalEnv<'_>) -> Result<Value, CloveError> {
        self.node().eval(env)
    }

    pub fn emit(&self, usage: Usage, gen: &mut CodeGen) -> Result<(), CloveError> {
        self.node().emit(usage, gen)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Def(_) => "def",
            Expr::Empty(_) => "empty",
            Expr::MonitorEnter(_) => "monitor-enter",
            Expr::Constant(_) => "constant",
            Expr::Var(_) => "var",
            Expr::Collection(_) => "collection",
            Expr::Invoke(_) => "invoke",
            Expr::Body(_) => "do",
        }
    }
}
