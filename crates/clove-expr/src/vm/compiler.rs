use std::sync::Arc;

use crate::ast::{Span, Value};
use crate::context::{SourcePos, Usage};
use crate::error::CloveError;
use crate::expr::Expr;
use crate::var::Var;
use crate::vm::bytecode::{Chunk, Instruction};

#[derive(Clone, Debug)]
pub struct CompiledChunk {
    pub chunk: Chunk,
}

/// Chunk under construction plus the source span instructions are tagged
/// with. Nodes that record a position push it for their own instructions.
pub struct CodeGen {
    chunk: Chunk,
    spans: Vec<Span>,
}

impl CodeGen {
    pub fn new(source: &str, span: Span) -> Self {
        Self {
            chunk: Chunk::new(source),
            spans: vec![span],
        }
    }

    pub fn span(&self) -> Span {
        self.spans.last().copied().unwrap_or_default()
    }

    pub fn emit(&mut self, instr: Instruction) -> usize {
        self.chunk.push(instr)
    }

    pub fn emit_const(&mut self, value: Value) {
        let span = self.span();
        if matches!(value, Value::Nil) {
            self.emit(Instruction::ConstNil(span));
            return;
        }
        let idx = self.chunk.add_const(value);
        self.emit(Instruction::Const(idx, span));
    }

    pub fn var_index(&mut self, var: &Arc<Var>) -> usize {
        self.chunk.add_var(var)
    }

    /// Drops the value just produced when the caller discards it.
    pub fn finish_usage(&mut self, usage: Usage) {
        if usage.discards() {
            let span = self.span();
            self.emit(Instruction::Pop(span));
        }
    }

    pub fn with_pos<T>(
        &mut self,
        pos: &SourcePos,
        f: impl FnOnce(&mut Self) -> Result<T, CloveError>,
    ) -> Result<T, CloveError> {
        self.spans.push(pos.span());
        let result = f(self);
        self.spans.pop();
        result
    }

    pub fn code(&self) -> &[Instruction] {
        self.chunk.code()
    }

    pub fn finish(self) -> CompiledChunk {
        CompiledChunk { chunk: self.chunk }
    }
}

/// Compiles one analyzed top-level form into a chunk returning its value.
pub fn compile_top_level(
    expr: &Expr,
    source: &str,
    span: Span,
) -> Result<CompiledChunk, CloveError> {
    let mut gen = CodeGen::new(source, span);
    expr.emit(Usage::TailReturn, &mut gen)?;
    gen.emit(Instruction::Return(span));
    let compiled = gen.finish();
    log::debug!(
        "compiled top-level form at {}:{} into {} instructions",
        source,
        span.line,
        compiled.chunk.code().len()
    );
    Ok(compiled)
}
