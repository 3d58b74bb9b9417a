pub mod bytecode;
pub mod compiler;
pub mod runtime;

pub use compiler::{compile_top_level, CodeGen, CompiledChunk};
pub use runtime::run_chunk;
