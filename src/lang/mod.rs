//! # Blue language model
//!
//! The typed syntax tree produced by the parser and consumed by the bytecode
//! compiler, plus the runtime objects the compiler deposits in the constant
//! pool.
//!
//! ## Conventions
//!
//! - Every statement and expression carries the `Span` it started at.
//! - Sugar (`for x in xs`, `x += 1`, `x++`, `match`) is kept in the tree as
//!   written; lowering happens in `bytecode::lower`.

pub mod node;
pub mod program;
pub mod value;

pub use node::*;
pub use program::Program;
pub use value::{CompiledFunction, Constant, ModuleHandle};
