use std::sync::Arc;

use crate::analyzer::{analyze, form_to_value};
use crate::ast::{Form, FormKind, HostType, Key, Span, Symbol, SymbolMeta, Value};
use crate::context::{CompileContext, EvalEnv, SourcePos, Usage};
use crate::diagnostics::Warning;
use crate::error::CloveError;
use crate::expr::{CollectionExpr, Expr, ExprNode};
use crate::namespaces::lookup_var;
use crate::var::Var;
use crate::vm::bytecode::Instruction;
use crate::vm::compiler::CodeGen;

/// `(def sym)`, `(def sym init)` or `(def sym "doc" init)`.
#[derive(Debug)]
pub struct DefExpr {
    var: Arc<Var>,
    init: Option<Box<Expr>>,
    meta: Option<Box<Expr>>,
    is_dynamic: bool,
    pos: SourcePos,
}

impl DefExpr {
    pub fn parse(ctx: &CompileContext<'_>, form: &Form, _usage: Usage) -> Result<Expr, CloveError> {
        let items = form
            .as_list()
            .ok_or_else(|| ctx.parse_error(form.span, "def expects a list form"))?;
        let (items, docstring) = split_docstring(items);
        if items.len() > 3 {
            return Err(ctx.parse_error(form.span, "Too many arguments to def"));
        }
        if items.len() < 2 {
            return Err(ctx.parse_error(form.span, "Too few arguments to def"));
        }
        let target = &items[1];
        let sym = target
            .as_symbol()
            .ok_or_else(|| ctx.parse_error(target.span, "First argument to def must be a Symbol"))?;
        let var = resolve_def_var(ctx, sym, target.span)?;

        let is_dynamic = sym
            .meta_entry("dynamic")
            .is_some_and(Form::is_truthy_literal);
        if is_dynamic {
            var.set_dynamic();
        } else if ctx.warn_on_earmuffs && sym.is_earmuffed() {
            ctx.warn(Warning::not_dynamic(
                &sym.to_string(),
                ctx.source_path(),
                ctx.line,
            ));
        }

        if let Some(arglists) = sym
            .meta_entry("arglists")
            .filter(|form| form.is_truthy_literal())
        {
            let arglists = form_to_value(strip_quote(arglists))?;
            var.alter_meta(|meta| meta.update(Key::keyword("arglists"), arglists));
        }

        let sym_meta = sym.meta().cloned().unwrap_or_default();
        let meta = analyze_meta(ctx, sym_meta, docstring, target.span)?;
        let init = items
            .get(2)
            .map(|init| analyze(ctx, init, Usage::Value).map(Box::new))
            .transpose()?;

        Ok(Expr::Def(DefExpr {
            var,
            init,
            meta,
            is_dynamic,
            pos: ctx.pos(),
        }))
    }

    pub fn var(&self) -> &Arc<Var> {
        &self.var
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    pub fn has_meta(&self) -> bool {
        self.meta.is_some()
    }

    pub fn pos(&self) -> &SourcePos {
        &self.pos
    }

    fn eval_unwrapped(&self, env: &EvalEnv<'_>) -> Result<Value, CloveError> {
        if let Some(init) = &self.init {
            let value = init.eval(env)?;
            self.var.bind_root(value);
        }
        if let Some(meta) = &self.meta {
            match meta.eval(env)? {
                Value::Map(map) => self.var.set_meta(map),
                other => return Err(CloveError::type_mismatch("map", other.type_name())),
            }
        }
        self.var.mark_dynamic(self.is_dynamic);
        Ok(Value::Var(self.var.clone()))
    }
}

impl ExprNode for DefExpr {
    fn static_type(&self) -> Option<HostType> {
        Some(HostType::Var)
    }

    fn eval(&self, env: &EvalEnv<'_>) -> Result<Value, CloveError> {
        self.eval_unwrapped(env).map_err(|err| self.pos.wrap(err))
    }

    fn emit(&self, usage: Usage, gen: &mut CodeGen) -> Result<(), CloveError> {
        gen.with_pos(&self.pos, |gen| {
            let span = gen.span();
            let idx = gen.var_index(&self.var);
            gen.emit(Instruction::PushVar(idx, span));
            if self.is_dynamic {
                gen.emit(Instruction::SetDynamic(span));
            }
            if let Some(meta) = &self.meta {
                gen.emit(Instruction::Dup(span));
                meta.emit(Usage::Value, gen)?;
                gen.emit(Instruction::SetMeta(span));
            }
            if let Some(init) = &self.init {
                gen.emit(Instruction::Dup(span));
                init.emit(Usage::Value, gen)?;
                gen.emit(Instruction::BindRoot(span));
            }
            gen.finish_usage(usage);
            Ok(())
        })
    }
}

/// `(def sym "doc" init)` becomes `(def sym init)` plus the docstring. Any
/// other shape is returned untouched.
fn split_docstring(items: &[Form]) -> (Vec<Form>, Option<String>) {
    if items.len() == 4 {
        if let FormKind::String(doc) = &items[2].kind {
            let normalized = vec![items[0].clone(), items[1].clone(), items[3].clone()];
            return (normalized, Some(doc.clone()));
        }
    }
    (items.to_vec(), None)
}

fn resolve_def_var(
    ctx: &CompileContext<'_>,
    sym: &Symbol,
    span: Span,
) -> Result<Arc<Var>, CloveError> {
    let found = lookup_var(ctx.registry, &ctx.ns, sym, true)
        .map_err(|err| err.with_span(span).with_file(Some(ctx.source_path().to_string())))?;
    let var = found
        .ok_or_else(|| ctx.lookup_error(span, "Can't refer to qualified var that doesn't exist"))?;
    if var.ns() == ctx.ns {
        return Ok(var);
    }
    if sym.is_qualified() {
        return Err(ctx.lookup_error(span, "Can't create defs outside of current namespace"));
    }
    Ok(ctx.registry.intern(&ctx.ns, sym))
}

fn strip_quote(form: &Form) -> &Form {
    match form.as_list() {
        Some([head, quoted])
            if head
                .as_symbol()
                .is_some_and(|sym| !sym.is_qualified() && sym.name() == "quote") =>
        {
            quoted
        }
        _ => form,
    }
}

/// Symbol metadata plus `:line`, `:file` and `:doc`, as a map expression.
fn analyze_meta(
    ctx: &CompileContext<'_>,
    sym_meta: SymbolMeta,
    docstring: Option<String>,
    span: Span,
) -> Result<Option<Box<Expr>>, CloveError> {
    let mut entries = sym_meta;
    entries.insert(Key::keyword("line"), Form::int(ctx.line as i64).at(span));
    entries.insert(Key::keyword("file"), Form::string(ctx.source_path()).at(span));
    if let Some(doc) = docstring {
        entries.insert(Key::keyword("doc"), Form::string(&doc).at(span));
    }
    if entries.is_empty() {
        return Ok(None);
    }
    let meta = CollectionExpr::from_meta(ctx, &entries)?;
    Ok(Some(Box::new(meta)))
}
