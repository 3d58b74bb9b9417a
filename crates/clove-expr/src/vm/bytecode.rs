use std::sync::Arc;

use crate::ast::{CollKind, Span, Value};
use crate::var::Var;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Const(usize, Span),
    ConstNil(Span),
    /// Pushes the shared canonical empty collection of the given kind.
    EmptyCollection(CollKind, Span),
    /// Pushes the var handle itself.
    PushVar(usize, Span),
    DerefVar(usize, Span),
    /// Marks the var on top of the stack dynamic, leaving it in place.
    SetDynamic(Span),
    /// Pops a metadata map and a var.
    SetMeta(Span),
    /// Pops a value and a var.
    BindRoot(Span),
    MakeVector(usize, Span),
    MakeSet(usize, Span),
    /// Pops `n` key/value pairs.
    MakeMap(usize, Span),
    /// Pops `n` args and the callee beneath them.
    Call(usize, Span),
    MonitorEnter(Span),
    Dup(Span),
    Pop(Span),
    Return(Span),
}

impl Instruction {
    pub fn span(&self) -> Span {
        match self {
            Instruction::Const(_, span)
            | Instruction::ConstNil(span)
            | Instruction::EmptyCollection(_, span)
            | Instruction::PushVar(_, span)
            | Instruction::DerefVar(_, span)
            | Instruction::SetDynamic(span)
            | Instruction::SetMeta(span)
            | Instruction::BindRoot(span)
            | Instruction::MakeVector(_, span)
            | Instruction::MakeSet(_, span)
            | Instruction::MakeMap(_, span)
            | Instruction::Call(_, span)
            | Instruction::MonitorEnter(span)
            | Instruction::Dup(span)
            | Instruction::Pop(span)
            | Instruction::Return(span) => *span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Chunk {
    code: Vec<Instruction>,
    constants: Vec<Value>,
    vars: Vec<Arc<Var>>,
    source: Arc<str>,
}

impl Chunk {
    pub fn new(source: &str) -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            vars: Vec::new(),
            source: Arc::from(source),
        }
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn vars(&self) -> &[Arc<Var>] {
        &self.vars
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn add_const(&mut self, value: Value) -> usize {
        let idx = self.constants.len();
        self.constants.push(value);
        idx
    }

    /// Index of `var` in the var table, adding it on first use.
    pub fn add_var(&mut self, var: &Arc<Var>) -> usize {
        if let Some(idx) = self.vars.iter().position(|v| Arc::ptr_eq(v, var)) {
            return idx;
        }
        let idx = self.vars.len();
        self.vars.push(var.clone());
        idx
    }

    pub fn push(&mut self, instr: Instruction) -> usize {
        let idx = self.code.len();
        self.code.push(instr);
        idx
    }
}
