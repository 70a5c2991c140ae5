//! `bluec`: the bytecode compiler for the Blue scripting language.
//!
//! ```text
//! source ──lexer──► tokens ──parser──► Program ──lower──► Program ──compiler──► Bytecode
//! ```

pub mod bytecode;
pub mod error;
pub mod frontend;
pub mod lang;

pub use bytecode::{Bytecode, CompileError, Compiler, CompilerOptions};
pub use error::Error;

use bytecode::symbol_table::SymbolTable;

/// Parses and compiles one source text with a fresh compiler.
pub fn compile_source(
    source: &str,
    options: CompilerOptions,
) -> Result<(Bytecode, SymbolTable), Error> {
    let program = frontend::parse_source(source)?;
    let mut compiler = Compiler::with_options(options);
    compiler.compile(&program)?;
    let bytecode = compiler.bytecode();
    Ok((bytecode, compiler.into_state().symbol_table))
}
