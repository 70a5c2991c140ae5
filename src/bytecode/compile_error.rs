use thiserror::Error;

use crate::frontend::lexer::Span;
use crate::frontend::parser_error::ParseErrors;

/// Errors reported while turning a program into bytecode.
///
/// Compilation stops at the first one. Internal invariant violations (bad
/// operand widths, patching outside the buffer) are panics, not variants.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------
    #[error("{span}: identifier not found: {name}")]
    UnresolvedIdentifier { name: String, span: Span },

    #[error("{span}: cannot assign to immutable binding '{name}'")]
    ImmutableAssignment { name: String, span: Span },

    #[error("{span}: cannot assign to {target}")]
    UnsupportedAssignmentTarget { target: String, span: Span },

    #[error("{span}: index assignment must start from an identifier")]
    IndexRootNotIdentifier { span: Span },

    // -------------------------------------------------------------------------
    // Operators
    // -------------------------------------------------------------------------
    #[error("{span}: unknown operator: {operator}")]
    UnknownOperator { operator: String, span: Span },

    // -------------------------------------------------------------------------
    // Imports
    // -------------------------------------------------------------------------
    #[error("{span}: unknown module: {name}")]
    UnknownModule { name: String, span: Span },

    #[error("{span}: '{name}' is private to module {module}")]
    PrivateMember {
        module: String,
        name: String,
        span: Span,
    },

    #[error("{span}: module {module} has no member '{name}'")]
    UnknownMember {
        module: String,
        name: String,
        span: Span,
    },

    #[error("{span}: import must appear outside of blocks")]
    NestedImport { span: Span },

    #[error("failed to parse module {module}:\n{errors}")]
    ModuleParse { module: String, errors: ParseErrors },

    #[error("failed to parse the core prelude:\n{0}")]
    PreludeParse(ParseErrors),

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------
    #[error("{span}: '{keyword}' outside of a loop")]
    OutsideLoop { keyword: &'static str, span: Span },

    #[error("{span}: '{keyword}' expects a call expression")]
    ExpectedCall { keyword: &'static str, span: Span },

    #[error("{span}: '_' must be the last arm of a match")]
    MisplacedWildcard { span: Span },

    #[error("{span}: invalid big integer literal '{text}'")]
    InvalidBigInteger { text: String, span: Span },

    #[error("{span}: too many {what} ({count}, limit {limit})")]
    TooMany {
        what: &'static str,
        count: usize,
        limit: usize,
        span: Span,
    },
}

impl CompileError {
    pub fn unresolved(name: impl Into<String>, span: Span) -> Self {
        CompileError::UnresolvedIdentifier {
            name: name.into(),
            span,
        }
    }

    pub fn immutable(name: impl Into<String>, span: Span) -> Self {
        CompileError::ImmutableAssignment {
            name: name.into(),
            span,
        }
    }

    pub fn unknown_operator(operator: impl Into<String>, span: Span) -> Self {
        CompileError::UnknownOperator {
            operator: operator.into(),
            span,
        }
    }

    /// Source position, when the error has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::UnresolvedIdentifier { span, .. }
            | CompileError::ImmutableAssignment { span, .. }
            | CompileError::UnsupportedAssignmentTarget { span, .. }
            | CompileError::IndexRootNotIdentifier { span }
            | CompileError::UnknownOperator { span, .. }
            | CompileError::UnknownModule { span, .. }
            | CompileError::PrivateMember { span, .. }
            | CompileError::UnknownMember { span, .. }
            | CompileError::NestedImport { span }
            | CompileError::OutsideLoop { span, .. }
            | CompileError::ExpectedCall { span, .. }
            | CompileError::MisplacedWildcard { span }
            | CompileError::InvalidBigInteger { span, .. }
            | CompileError::TooMany { span, .. } => Some(*span),
            CompileError::ModuleParse { .. } | CompileError::PreludeParse(_) => None,
        }
    }
}
