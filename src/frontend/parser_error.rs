use thiserror::Error;

/// A parsing error with source location.
///
/// `line` and `col` are 1-based positions coming from the lexer spans.
/// For EOF-ish errors (e.g. missing `}` or `)`), the parser uses the last
/// consumed token's span as a fallback so locations are never `0:0`.
#[derive(Debug, Clone, Error)]
#[error("{line}:{col}: {message}")]
pub struct ParserError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

/// Every error collected while parsing one source text.
///
/// The parser resynchronises at statement boundaries, so a single run can
/// report several independent mistakes.
#[derive(Debug, Clone, Error)]
pub struct ParseErrors(pub Vec<ParserError>);

impl ParseErrors {
    pub fn errors(&self) -> &[ParserError] {
        &self.0
    }
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}
