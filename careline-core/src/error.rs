//! Error types shared across the Careline crates.

use thiserror::Error;

/// Errors raised while parsing permission rule structures.
///
/// An unknown condition name is a programmer error in the rule files, so it
/// fails loudly here instead of being skipped at query-compile time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("unknown condition name: {0}")]
    Unknown(String),

    #[error("invalid parameter for condition {name}: {value}")]
    InvalidParameter { name: String, value: String },

    #[error("malformed rule value: {0}")]
    MalformedRule(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_condition() {
        let err = ConditionError::Unknown("isAdmin".to_string());
        assert_eq!(err.to_string(), "unknown condition name: isAdmin");
    }
}
