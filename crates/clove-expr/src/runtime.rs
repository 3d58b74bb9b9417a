use std::sync::{Arc, PoisonError, RwLock};

use crate::analyzer::analyze;
use crate::ast::{FnArity, Form, Symbol, Value};
use crate::context::{CompileContext, EvalEnv, Usage};
use crate::diagnostics::{DiagnosticSink, StderrSink};
use crate::error::{CloveError, NO_SOURCE_FILE};
use crate::expr::Expr;
use crate::host::{IntrinsicLocks, Monitors};
use crate::namespaces::{BindingRegistry, NamespaceStore};
use crate::options::CompileOptions;
use crate::var::Var;
use crate::vm::{compile_top_level, run_chunk, CompiledChunk};

/// Owns the registry, host capabilities and options, and runs top-level
/// forms through either the direct evaluator or the VM.
pub struct RuntimeCtx {
    namespaces: Arc<NamespaceStore>,
    monitors: Arc<dyn Monitors>,
    diagnostics: Arc<dyn DiagnosticSink>,
    options: CompileOptions,
    current_ns: RwLock<String>,
}

impl RuntimeCtx {
    pub fn new(options: CompileOptions) -> Self {
        Self::with_host(
            options,
            Arc::new(IntrinsicLocks::new()),
            Arc::new(StderrSink),
        )
    }

    pub fn with_host(
        options: CompileOptions,
        monitors: Arc<dyn Monitors>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let namespaces = Arc::new(NamespaceStore::new());
        namespaces.ensure_ns(&options.namespace);
        let current_ns = RwLock::new(options.namespace.clone());
        Self {
            namespaces,
            monitors,
            diagnostics,
            options,
            current_ns,
        }
    }

    pub fn namespaces(&self) -> &Arc<NamespaceStore> {
        &self.namespaces
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn current_ns(&self) -> String {
        self.current_ns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Switches the namespace new forms are analyzed in, creating it if needed.
    pub fn set_current_ns(&self, ns: &str) {
        self.namespaces.ensure_ns(ns);
        *self
            .current_ns
            .write()
            .unwrap_or_else(PoisonError::into_inner) = ns.to_string();
    }

    /// Interns `name` in the current namespace bound to a native function.
    pub fn define_native(
        &self,
        name: &str,
        arity: FnArity,
        func: impl Fn(&[Value]) -> Result<Value, CloveError> + Send + Sync + 'static,
    ) -> Arc<Var> {
        let var = self
            .namespaces
            .intern(&self.current_ns(), &Symbol::unqualified(name));
        var.bind_root(Value::native_fn(name, arity, func));
        var
    }

    fn compile_context(&self, line: usize) -> CompileContext<'_> {
        let mut ctx = CompileContext::new(
            self.namespaces.as_ref(),
            self.diagnostics.as_ref(),
            self.current_ns(),
        )
        .with_source(self.options.source_name.clone())
        .at_line(line);
        ctx.warn_on_earmuffs = self.options.warn_on_earmuffs;
        ctx
    }

    /// Analyzes a top-level form without running it.
    pub fn analyze(&self, form: &Form) -> Result<Expr, CloveError> {
        let ctx = self.compile_context(form.span.line);
        analyze(&ctx, form, Usage::TailReturn)
    }

    pub fn compile(&self, form: &Form) -> Result<CompiledChunk, CloveError> {
        let expr = self.analyze(form)?;
        compile_top_level(&expr, self.source_path(), form.span)
    }

    pub fn eval_form(&self, form: &Form) -> Result<Value, CloveError> {
        self.eval_form_with(form, self.options.use_vm)
    }

    pub fn eval_form_with(&self, form: &Form, use_vm: bool) -> Result<Value, CloveError> {
        let expr = self.analyze(form)?;
        let env = EvalEnv::new(self.monitors.as_ref());
        log::debug!(
            "evaluating {} form at line {} via {}",
            expr.kind_name(),
            form.span.line,
            if use_vm { "vm" } else { "eval" }
        );
        let result = if use_vm {
            compile_top_level(&expr, self.source_path(), form.span)
                .and_then(|compiled| run_chunk(&compiled, &env))
        } else {
            expr.eval(&env)
        };
        result.map_err(|err| err.wrap_at(self.source_path(), form.span.line))
    }

    /// Evaluates forms in order, stopping at the first failure.
    pub fn eval_forms(&self, forms: &[Form]) -> Result<Value, CloveError> {
        let mut last = Value::Nil;
        for form in forms {
            last = self.eval_form(form)?;
        }
        Ok(last)
    }

    fn source_path(&self) -> &str {
        self.options
            .source_name
            .as_deref()
            .unwrap_or(NO_SOURCE_FILE)
    }
}
