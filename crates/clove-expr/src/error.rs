use std::fmt;

use crate::ast::Span;
use thiserror::Error;

pub const ERROR_TAG: &str = "\x1b[31m[ERROR]\x1b[0m";
pub const WARN_TAG: &str = "\x1b[33m[WARN]\x1b[0m";

/// Source path reported when a form was not read from a file.
pub const NO_SOURCE_FILE: &str = "NO_SOURCE_FILE";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub span: Option<Span>,
    pub file: Option<String>,
}

impl ErrorContext {
    fn set_span(&mut self, span: Span) {
        if self.span.is_none() {
            self.span = Some(span);
        }
    }

    fn set_file(&mut self, file: Option<String>) {
        if self.file.is_none() {
            self.file = file;
        }
    }
}

#[derive(Clone, Debug)]
pub struct RuntimeErrorData {
    pub message: String,
    pub context: ErrorContext,
}

impl RuntimeErrorData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }
}

impl fmt::Display for RuntimeErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Clone, Debug)]
pub struct ParseErrorData {
    pub message: String,
    pub context: ErrorContext,
}

impl ParseErrorData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }
}

impl fmt::Display for ParseErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Error, Debug, Clone)]
pub enum CloveError {
    #[error("Parse error: {0}")]
    Parse(ParseErrorData),

    #[error("Lookup error: {0}")]
    Lookup(RuntimeErrorData),

    /// A node met a value shape its design rules out. Programming error.
    #[error("Internal error: {0}")]
    Internal(RuntimeErrorData),

    #[error("Runtime error: {0}")]
    Runtime(RuntimeErrorData),

    #[error("Arity mismatch: {0}")]
    Arity(RuntimeErrorData),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: String,
        actual: String,
        context: ErrorContext,
    },

    #[error("Thrown: {0}")]
    Thrown(RuntimeErrorData),

    #[error("{cause} ({file}:{line})")]
    Compiler {
        file: String,
        line: usize,
        #[source]
        cause: Box<CloveError>,
    },
}

impl CloveError {
    pub fn parse(message: impl Into<String>) -> Self {
        CloveError::Parse(ParseErrorData::new(message))
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        CloveError::Lookup(RuntimeErrorData::new(message))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CloveError::Internal(RuntimeErrorData::new(message))
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        CloveError::Runtime(RuntimeErrorData::new(message))
    }

    pub fn arity(message: impl Into<String>) -> Self {
        CloveError::Arity(RuntimeErrorData::new(message))
    }

    pub fn thrown(message: impl Into<String>) -> Self {
        CloveError::Thrown(RuntimeErrorData::new(message))
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        CloveError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
            context: ErrorContext::default(),
        }
    }

    /// Tags an execution failure with a source position. Errors that are
    /// already tagged pass through untouched.
    pub fn wrap_at(self, file: &str, line: usize) -> Self {
        if self.is_compiler_exception() {
            return self;
        }
        CloveError::Compiler {
            file: file.to_string(),
            line,
            cause: Box::new(self),
        }
    }

    pub fn is_compiler_exception(&self) -> bool {
        matches!(self, CloveError::Compiler { .. })
    }

    /// The innermost error under any compiler-exception layers.
    pub fn root_cause(&self) -> &CloveError {
        match self {
            CloveError::Compiler { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// `(file, line)` of a compiler exception.
    pub fn position(&self) -> Option<(&str, usize)> {
        match self {
            CloveError::Compiler { file, line, .. } => Some((file.as_str(), *line)),
            _ => None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        if let Some(ctx) = self.context_mut() {
            ctx.set_span(span);
        }
        self
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        if let Some(ctx) = self.context_mut() {
            ctx.set_file(file);
        }
        self
    }

    pub fn span(&self) -> Option<Span> {
        self.context_ref().and_then(|ctx| ctx.span)
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            CloveError::Compiler { file, .. } => Some(file.as_str()),
            _ => self.context_ref().and_then(|ctx| ctx.file.as_deref()),
        }
    }

    fn context_ref(&self) -> Option<&ErrorContext> {
        match self {
            CloveError::Parse(data) => Some(&data.context),
            CloveError::Lookup(data)
            | CloveError::Internal(data)
            | CloveError::Runtime(data)
            | CloveError::Arity(data)
            | CloveError::Thrown(data) => Some(&data.context),
            CloveError::TypeMismatch { context, .. } => Some(context),
            CloveError::Compiler { .. } => None,
        }
    }

    fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            CloveError::Parse(data) => Some(&mut data.context),
            CloveError::Lookup(data)
            | CloveError::Internal(data)
            | CloveError::Runtime(data)
            | CloveError::Arity(data)
            | CloveError::Thrown(data) => Some(&mut data.context),
            CloveError::TypeMismatch { context, .. } => Some(context),
            CloveError::Compiler { .. } => None,
        }
    }
}

pub fn format_error(err: &CloveError) -> Vec<String> {
    let mut lines = Vec::new();
    match err {
        CloveError::Compiler { file, line, cause } => {
            lines.push(format!("{} {}", ERROR_TAG, cause.root_cause()));
            lines.push(format!("  at {}:{}", file, line));
        }
        other => {
            lines.push(format!("{} {}", ERROR_TAG, other));
            if let Some(location) = format_error_location(other.file(), other.span()) {
                lines.push(format!("  at {}", location));
            }
        }
    }
    lines
}

fn format_error_location(file: Option<&str>, span: Option<Span>) -> Option<String> {
    let file_name = file.unwrap_or(NO_SOURCE_FILE);
    match span {
        Some(span) => Some(format!("{}:{}:{}", file_name, span.line, span.col)),
        None => file.map(|f| f.to_string()),
    }
}

impl From<String> for CloveError {
    fn from(s: String) -> Self {
        CloveError::runtime(s)
    }
}

impl From<&str> for CloveError {
    fn from(s: &str) -> Self {
        CloveError::runtime(s.to_string())
    }
}
