//! Source text to `lang::Program`: lexer, parser and the `--tokens` dumper.

pub mod lexer;
pub mod parser;
pub mod parser_error;
pub mod token;
pub mod token_dumper;

pub use lexer::{Lexer, LexerError, Span, Spanned};
pub use parser::{Parser, parse_source};
pub use parser_error::{ParseErrors, ParserError};
pub use token::Token;
