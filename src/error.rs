use thiserror::Error;

use crate::bytecode::CompileError;
use crate::frontend::{LexerError, ParseErrors};

/// Any failure between source text and serialized bytecode.
#[derive(Debug, Error)]
pub enum Error {
    #[error("LexerError: {0}")]
    Lexer(#[from] LexerError),

    #[error("ParserError: {0}")]
    Parse(#[from] ParseErrors),

    #[error("CompileError: {0}")]
    Compile(#[from] CompileError),

    #[error("failed to encode bytecode: {0}")]
    Serialize(#[from] postcard::Error),
}
