use std::sync::Arc;

use crate::ast::Span;
use crate::diagnostics::{DiagnosticSink, Warning};
use crate::error::{CloveError, NO_SOURCE_FILE};
use crate::host::Monitors;
use crate::namespaces::BindingRegistry;

/// How the caller consumes a node's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Usage {
    /// Evaluated for effect; the value is dropped.
    Discarded,
    /// The value feeds an enclosing expression.
    Value,
    /// The value is returned from the enclosing body.
    TailReturn,
}

impl Usage {
    pub fn discards(self) -> bool {
        self == Usage::Discarded
    }
}

/// Source file and line captured when a node was parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcePos {
    pub file: Arc<str>,
    pub line: usize,
}

impl SourcePos {
    pub fn span(&self) -> Span {
        Span::at_line(self.line)
    }

    pub fn wrap(&self, err: CloveError) -> CloveError {
        err.wrap_at(&self.file, self.line)
    }
}

/// State threaded through every parse call of one top-level form.
pub struct CompileContext<'a> {
    pub registry: &'a dyn BindingRegistry,
    pub diagnostics: &'a dyn DiagnosticSink,
    pub ns: String,
    pub source: Option<String>,
    pub line: usize,
    pub warn_on_earmuffs: bool,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        registry: &'a dyn BindingRegistry,
        diagnostics: &'a dyn DiagnosticSink,
        ns: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            diagnostics,
            ns: ns.into(),
            source: None,
            line: 0,
            warn_on_earmuffs: true,
        }
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn source_path(&self) -> &str {
        self.source.as_deref().unwrap_or(NO_SOURCE_FILE)
    }

    pub fn pos(&self) -> SourcePos {
        SourcePos {
            file: Arc::from(self.source_path()),
            line: self.line,
        }
    }

    pub fn warn(&self, warning: Warning) {
        self.diagnostics.warn(warning);
    }

    /// Parse error tagged with the current file and `span`.
    pub fn parse_error(&self, span: Span, message: impl Into<String>) -> CloveError {
        CloveError::parse(message)
            .with_span(span)
            .with_file(Some(self.source_path().to_string()))
    }

    pub fn lookup_error(&self, span: Span, message: impl Into<String>) -> CloveError {
        CloveError::lookup(message)
            .with_span(span)
            .with_file(Some(self.source_path().to_string()))
    }
}

/// Capabilities available to `Expr::eval`.
#[derive(Clone, Copy)]
pub struct EvalEnv<'a> {
    pub monitors: &'a dyn Monitors,
}

impl<'a> EvalEnv<'a> {
    pub fn new(monitors: &'a dyn Monitors) -> Self {
        Self { monitors }
    }
}
