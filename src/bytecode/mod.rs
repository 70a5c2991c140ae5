//! Blue source to stack-machine bytecode.
//!
//! `Compiler` walks a lowered `Program` and emits a flat instruction stream
//! plus a constant pool; function bodies live in the pool as
//! `Constant::Function`.

pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod import;
pub mod ir;
pub mod lower;
pub mod op;
pub mod prelude;
pub mod scope;
pub mod stdlib;
pub mod symbol_table;

pub use compile::{Compiler, CompilerOptions, CompilerState};
pub use compile_error::CompileError;
pub use ir::{Bytecode, Instructions};
pub use op::Opcode;
