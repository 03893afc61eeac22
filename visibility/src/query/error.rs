//! Errors raised while parsing and converting queries.
//!
//! Both are query-construction errors: they are surfaced to the caller as-is
//! and are never worth retrying.

use super::ast::Operator;
use crate::types::AttributeType;

/// The query text could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Human readable description.
    pub message: String,
    /// Byte offset in the query text where the problem was found.
    pub position: usize,
}

impl ParseError {
    #[must_use]
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at offset {})", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}

/// The parsed query could not be converted into a backend filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// The attribute is not registered.
    UnknownAttribute(String),
    /// The operator cannot be applied to the attribute's type, or the backend
    /// cannot express it.
    UnsupportedOperator {
        attribute: String,
        operator: Operator,
    },
    /// The literal's kind does not match the attribute's type.
    TypeMismatch {
        attribute: String,
        expected: AttributeType,
        found: String,
    },
    /// The ORDER BY clause names an attribute that cannot be sorted on.
    InvalidSort(String),
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAttribute(name) => write!(f, "unknown search attribute: {name}"),
            Self::UnsupportedOperator {
                attribute,
                operator,
            } => write!(
                f,
                "operator {operator} is not supported for search attribute {attribute}"
            ),
            Self::TypeMismatch {
                attribute,
                expected,
                found,
            } => write!(
                f,
                "search attribute {attribute} expects a {expected} value, got {found}"
            ),
            Self::InvalidSort(detail) => write!(f, "invalid ORDER BY: {detail}"),
        }
    }
}

impl std::error::Error for ConvertError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let error = ParseError::new("unexpected token ')'", 7);
        assert_eq!(error.to_string(), "unexpected token ')' (at offset 7)");
    }

    #[test]
    fn test_convert_error_display() {
        let error = ConvertError::UnsupportedOperator {
            attribute: "Flag".to_owned(),
            operator: Operator::Lt,
        };
        assert_eq!(
            error.to_string(),
            "operator < is not supported for search attribute Flag"
        );

        let error = ConvertError::TypeMismatch {
            attribute: "Count".to_owned(),
            expected: AttributeType::Int,
            found: "string \"x\"".to_owned(),
        };
        assert_eq!(
            error.to_string(),
            "search attribute Count expects a Int value, got string \"x\""
        );
    }
}
