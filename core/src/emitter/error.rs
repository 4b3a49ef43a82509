//! Emission errors.

use thiserror::Error;

use crate::ast::Span;

/// Why one body's compilation was aborted.
///
/// `Unsupported` and `Unresolved` are user-facing diagnostics with enough
/// context to localize the offending construct. `Internal` marks invariant
/// violations (unpatched jumps, operand shape mismatches, destructuring
/// arity bugs): those are emitter defects, not source problems.
///
/// Note that match non-exhaustiveness is deliberately absent: an
/// inexhaustive match compiles successfully into a `fail` instruction and
/// only fails at run time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("unsupported construct at {span}: {what}")]
    Unsupported { what: String, span: Span },

    #[error("cannot resolve `{name}` at {span}")]
    Unresolved { name: String, span: Span },

    #[error("internal emitter error: {0}")]
    Internal(String),
}

impl EmitError {
    pub fn unsupported(what: impl Into<String>, span: &Span) -> EmitError {
        EmitError::Unsupported {
            what: what.into(),
            span: span.clone(),
        }
    }

    pub fn unresolved(name: impl Into<String>, span: &Span) -> EmitError {
        EmitError::Unresolved {
            name: name.into(),
            span: span.clone(),
        }
    }

    /// The source span this error points at, if it has one.
    pub fn span(&self) -> Option<&Span> {
        match self {
            EmitError::Unsupported { span, .. } | EmitError::Unresolved { span, .. } => Some(span),
            EmitError::Internal(_) => None,
        }
    }
}
