use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::WARN_TAG;

/// Non-fatal compiler warning tagged with where it was raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub symbol: String,
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl Warning {
    pub fn not_dynamic(symbol: &str, file: &str, line: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            file: file.to_string(),
            line,
            message: format!(
                "{sym} not declared dynamic and thus is not dynamically rebindable, \
                 but its name suggests otherwise. Please either indicate ^:dynamic {sym} \
                 or change the name.",
                sym = symbol
            ),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.file, self.line)
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn warn(&self, warning: Warning);
}

/// Writes warnings to stderr with the `[WARN]` tag.
#[derive(Debug, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn warn(&self, warning: Warning) {
        log::warn!(target: "clove_expr::diagnostics", "{}", warning);
        eprintln!("{} {}", WARN_TAG, warning);
    }
}

/// Keeps warnings in memory, e.g. for editors or tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    warnings: Mutex<Vec<Warning>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.warnings.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl DiagnosticSink for CollectingSink {
    fn warn(&self, warning: Warning) {
        log::debug!("collected warning for {}", warning.symbol);
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning);
    }
}
