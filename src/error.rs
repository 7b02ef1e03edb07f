//! Fatal conversion errors.
//!
//! Anything that can degrade to a best-effort rewrite is a [`Note`](crate::notes::Note)
//! instead. The variants here abort the current file only.

use crate::notes::NoteCode;

/// Errors that abort conversion of a single file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("Unterminated bracketed identifier starting at byte {offset}")]
    UnterminatedBracket { offset: usize },

    #[error("Malformed literal starting at byte {offset}: {reason}")]
    MalformedLiteral { offset: usize, reason: String },

    #[error("{}", unresolved_message(step.as_deref(), reference))]
    UnresolvedStepReference {
        /// The referencing step; `None` for the name after `in`.
        step: Option<String>,
        reference: String,
        offset: Option<usize>,
    },

    #[error("Cyclic step dependency: {}", cycle.join(" -> "))]
    CyclicStepDependency { cycle: Vec<String> },

    #[error("M syntax error at byte {offset}: {message}")]
    MSyntax { offset: usize, message: String },
}

impl ConvertError {
    /// The stable note code reported for this error.
    pub fn code(&self) -> NoteCode {
        match self {
            ConvertError::UnterminatedBracket { .. } => NoteCode::UnterminatedBracket,
            ConvertError::MalformedLiteral { .. } => NoteCode::MalformedLiteral,
            ConvertError::UnresolvedStepReference { .. } => NoteCode::UnresolvedStepReference,
            ConvertError::CyclicStepDependency { .. } => NoteCode::CyclicStepDependency,
            ConvertError::MSyntax { .. } => NoteCode::MSyntaxError,
        }
    }

    /// Byte offset into the source, when the error has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ConvertError::UnterminatedBracket { offset }
            | ConvertError::MalformedLiteral { offset, .. }
            | ConvertError::MSyntax { offset, .. } => Some(*offset),
            ConvertError::UnresolvedStepReference { offset, .. } => *offset,
            ConvertError::CyclicStepDependency { .. } => None,
        }
    }
}

fn unresolved_message(step: Option<&str>, reference: &str) -> String {
    match step {
        Some(step) => format!("Step '{}' references undeclared step '{}'", step, reference),
        None => format!("Output step '{}' is not declared", reference),
    }
}

pub type ConvertResult<T> = Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ConvertError::UnterminatedBracket { offset: 4 };
        assert_eq!(err.code(), NoteCode::UnterminatedBracket);
        assert_eq!(err.offset(), Some(4));

        let err = ConvertError::CyclicStepDependency {
            cycle: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "Cyclic step dependency: A -> B -> A");
        assert_eq!(err.offset(), None);
    }

    #[test]
    fn test_unresolved_reference_messages() {
        let err = ConvertError::UnresolvedStepReference {
            step: Some("F".into()),
            reference: "Sourse".into(),
            offset: Some(3),
        };
        assert_eq!(err.to_string(), "Step 'F' references undeclared step 'Sourse'");

        let err = ConvertError::UnresolvedStepReference {
            step: None,
            reference: "Z".into(),
            offset: Some(13),
        };
        assert_eq!(err.to_string(), "Output step 'Z' is not declared");
    }
}
