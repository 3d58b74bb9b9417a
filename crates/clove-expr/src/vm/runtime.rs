use std::sync::Arc;

use crate::ast::{CollKind, Value};
use crate::context::EvalEnv;
use crate::error::CloveError;
use crate::expr::{apply, build_collection, canonical_empty};
use crate::var::Var;
use crate::vm::bytecode::{Chunk, Instruction};
use crate::vm::compiler::CompiledChunk;

/// Executes a compiled top-level chunk. Failures raised by an instruction are
/// tagged with the chunk source and the instruction's line.
pub fn run_chunk(compiled: &CompiledChunk, env: &EvalEnv<'_>) -> Result<Value, CloveError> {
    let chunk = &compiled.chunk;
    log::debug!(
        "running chunk from {} ({} instructions)",
        chunk.source(),
        chunk.code().len()
    );
    let mut vm = Vm {
        chunk,
        env,
        stack: Vec::new(),
    };
    vm.run()
}

struct Vm<'a, 'e> {
    chunk: &'a Chunk,
    env: &'a EvalEnv<'e>,
    stack: Vec<Value>,
}

impl<'a, 'e> Vm<'a, 'e> {
    fn run(&mut self) -> Result<Value, CloveError> {
        let chunk = self.chunk;
        for instr in chunk.code() {
            log::trace!("vm: {:?} (stack depth {})", instr, self.stack.len());
            let step = self.step(instr);
            match step {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(err) => return Err(err.wrap_at(chunk.source(), instr.span().line)),
            }
        }
        Err(CloveError::internal("chunk ended without Return"))
    }

    fn step(&mut self, instr: &Instruction) -> Result<Option<Value>, CloveError> {
        match instr {
            Instruction::Const(idx, _) => {
                let value = self
                    .chunk
                    .constants()
                    .get(*idx)
                    .cloned()
                    .ok_or_else(|| CloveError::internal("constant index out of range"))?;
                self.stack.push(value);
            }
            Instruction::ConstNil(_) => self.stack.push(Value::Nil),
            Instruction::EmptyCollection(kind, _) => self.stack.push(canonical_empty(*kind).clone()),
            Instruction::PushVar(idx, _) => {
                let var = self.var(*idx)?;
                self.stack.push(Value::Var(var));
            }
            Instruction::DerefVar(idx, _) => {
                let value = self.var(*idx)?.deref()?;
                self.stack.push(value);
            }
            Instruction::SetDynamic(_) => {
                let top = self
                    .stack
                    .last()
                    .ok_or_else(|| CloveError::internal("stack underflow"))?;
                let var = top
                    .as_var()
                    .ok_or_else(|| CloveError::internal("SetDynamic expects a var"))?;
                var.set_dynamic();
            }
            Instruction::SetMeta(_) => {
                let meta = self.pop()?;
                let var = self.pop_var()?;
                match meta {
                    Value::Map(map) => var.set_meta(map),
                    other => return Err(CloveError::type_mismatch("map", other.type_name())),
                }
            }
            Instruction::BindRoot(_) => {
                let value = self.pop()?;
                let var = self.pop_var()?;
                var.bind_root(value);
            }
            Instruction::MakeVector(n, _) => self.make(CollKind::Vector, *n)?,
            Instruction::MakeSet(n, _) => self.make(CollKind::Set, *n)?,
            Instruction::MakeMap(pairs, _) => self.make(CollKind::Map, pairs * 2)?,
            Instruction::Call(argc, _) => {
                let args = self.pop_n(*argc)?;
                let callee = self.pop()?;
                let result = apply(&callee, &args)?;
                self.stack.push(result);
            }
            Instruction::MonitorEnter(_) => {
                let target = self.pop()?;
                self.env.monitors.enter(&target)?;
            }
            Instruction::Dup(_) => {
                let top = self
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| CloveError::internal("stack underflow"))?;
                self.stack.push(top);
            }
            Instruction::Pop(_) => {
                self.pop()?;
            }
            Instruction::Return(_) => {
                return Ok(Some(self.stack.pop().unwrap_or(Value::Nil)));
            }
        }
        Ok(None)
    }

    fn var(&self, idx: usize) -> Result<Arc<Var>, CloveError> {
        self.chunk
            .vars()
            .get(idx)
            .cloned()
            .ok_or_else(|| CloveError::internal("var index out of range"))
    }

    fn pop(&mut self) -> Result<Value, CloveError> {
        self.stack
            .pop()
            .ok_or_else(|| CloveError::internal("stack underflow"))
    }

    fn pop_var(&mut self) -> Result<Arc<Var>, CloveError> {
        match self.pop()? {
            Value::Var(var) => Ok(var),
            other => Err(CloveError::internal(format!(
                "expected var on stack, got {}",
                other.type_name()
            ))),
        }
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, CloveError> {
        if self.stack.len() < n {
            return Err(CloveError::internal("stack underflow"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn make(&mut self, kind: CollKind, n: usize) -> Result<(), CloveError> {
        let items = self.pop_n(n)?;
        let value = build_collection(kind, items)?;
        self.stack.push(value);
        Ok(())
    }
}
