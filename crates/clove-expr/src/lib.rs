pub mod analyzer;
pub mod ast;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod expr;
pub mod host;
pub mod namespaces;
pub mod options;
pub mod runtime;
pub mod symbols;
pub mod var;
pub mod vm;

pub use analyzer::{analyze, form_to_value, SPECIAL_FORMS};
pub use context::{CompileContext, EvalEnv, Usage};
pub use error::CloveError;
pub use expr::{Expr, ExprNode};
pub use runtime::RuntimeCtx;
