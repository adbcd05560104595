//! Errors raised by predicates
//!
//! Ordinary failure (no more solutions) is never an error; it is an exhausted
//! solution iterator.

use datalog_parser::Term;
use kv_storage::StoreError;
use thiserror::Error;

pub type BuiltinResult<T> = Result<T, BuiltinError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuiltinError {
    /// A required argument is an unbound variable
    #[error("instantiation_error")]
    Instantiation,

    /// A term has the wrong shape for the operation
    #[error("type_error({expected}, {culprit})")]
    Type { expected: &'static str, culprit: Term },

    #[error("existence_error(procedure, {name}/{arity})")]
    UnknownPredicate { name: String, arity: usize },

    /// Store errors pass through unchanged
    #[error("store_error({0})")]
    Store(#[from] StoreError),

    #[error("syntax_error(json, {0:?})")]
    Json(String),
}

impl BuiltinError {
    pub fn type_error(expected: &'static str, culprit: Term) -> Self {
        BuiltinError::Type { expected, culprit }
    }

    /// Distinguishes argument errors from store failures
    pub fn is_store_error(&self) -> bool {
        matches!(self, BuiltinError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(BuiltinError::Instantiation.to_string(), "instantiation_error");
        assert_eq!(
            BuiltinError::type_error("pair", Term::atom("foo")).to_string(),
            "type_error(pair, foo)"
        );
        assert_eq!(
            BuiltinError::UnknownPredicate {
                name: "nope".to_string(),
                arity: 2
            }
            .to_string(),
            "existence_error(procedure, nope/2)"
        );
    }

    #[test]
    fn test_store_error_passes_through() {
        let error: BuiltinError = StoreError::TableNotFound("users".to_string()).into();
        assert!(error.is_store_error());
        assert_eq!(error.to_string(), "store_error(table not found: users)");
    }
}
