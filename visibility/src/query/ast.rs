//! Filter expression tree.
//!
//! This module defines the parsed form of a visibility query:
//! - `Literal` - a constant written in the query text
//! - `Operator` - a comparison operator
//! - `Expr` - a boolean filter expression
//! - `ParsedQuery` - an optional filter plus an ORDER BY clause
//!
//! Trees are immutable once built. The converter only reads them.

use std::fmt;

use crate::types::SortKey;

/// A literal value as written in the query text.
///
/// Literals are untyped with respect to attributes: the converter coerces
/// them against the attribute's registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// A quoted string.
    String(String),
    /// An integer.
    Int(i64),
    /// `true` or `false`.
    Bool(bool),
}

impl Literal {
    /// Create a string literal.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Name of the literal's kind, for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    StartsWith,
}

impl Operator {
    /// The operator with its operands swapped (`a < b` is `b > a`).
    ///
    /// Returns `None` for operators that are not symmetric in that way.
    #[must_use]
    pub const fn flipped(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::Eq),
            Self::NotEq => Some(Self::NotEq),
            Self::Lt => Some(Self::Gt),
            Self::LtEq => Some(Self::GtEq),
            Self::Gt => Some(Self::Lt),
            Self::GtEq => Some(Self::LtEq),
            Self::In | Self::StartsWith => None,
        }
    }

    /// Whether the operator is one of `< <= > >=`.
    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self, Self::Lt | Self::LtEq | Self::Gt | Self::GtEq)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::In => "IN",
            Self::StartsWith => "STARTS_WITH",
        };
        f.write_str(text)
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A single literal.
    Value(Literal),
    /// A parenthesized list, used by `IN`.
    List(Vec<Literal>),
}

/// A boolean filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `attribute <operator> operand`.
    Comparison {
        attribute: String,
        operator: Operator,
        operand: Operand,
    },
    /// `attribute IS NULL`.
    IsNull(String),
    /// `attribute IS NOT NULL`.
    IsNotNull(String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// A comparison between two literals, folded at parse time.
    Constant(bool),
}

impl Expr {
    /// Create a single-valued comparison.
    #[must_use]
    pub fn compare(attribute: impl Into<String>, operator: Operator, value: Literal) -> Self {
        Self::Comparison {
            attribute: attribute.into(),
            operator,
            operand: Operand::Value(value),
        }
    }

    /// Create an `attribute = value` comparison.
    #[must_use]
    pub fn eq(attribute: impl Into<String>, value: Literal) -> Self {
        Self::compare(attribute, Operator::Eq, value)
    }

    /// Create an `attribute IN (values...)` comparison.
    #[must_use]
    pub fn in_list(attribute: impl Into<String>, values: Vec<Literal>) -> Self {
        Self::Comparison {
            attribute: attribute.into(),
            operator: Operator::In,
            operand: Operand::List(values),
        }
    }

    /// Create an `attribute IS NULL` node.
    #[must_use]
    pub fn is_null(attribute: impl Into<String>) -> Self {
        Self::IsNull(attribute.into())
    }

    /// Create an `attribute IS NOT NULL` node.
    #[must_use]
    pub fn is_not_null(attribute: impl Into<String>) -> Self {
        Self::IsNotNull(attribute.into())
    }

    /// Combine two expressions with AND.
    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    /// Combine two expressions with OR.
    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    /// Negate an expression.
    #[must_use]
    pub fn negate(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }
}

/// The result of parsing query text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    /// The filter, absent when the text had no WHERE-style condition.
    pub filter: Option<Expr>,
    /// ORDER BY keys, empty when unspecified.
    pub order_by: Vec<SortKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flipped_operators() {
        assert_eq!(Operator::Lt.flipped(), Some(Operator::Gt));
        assert_eq!(Operator::GtEq.flipped(), Some(Operator::LtEq));
        assert_eq!(Operator::Eq.flipped(), Some(Operator::Eq));
        assert_eq!(Operator::In.flipped(), None);
    }

    #[test]
    fn test_builders() {
        let expr = Expr::and(
            Expr::eq("A", Literal::string("x")),
            Expr::negate(Expr::is_null("B")),
        );
        match expr {
            Expr::And(left, right) => {
                assert!(matches!(*left, Expr::Comparison { operator: Operator::Eq, .. }));
                assert!(matches!(*right, Expr::Not(_)));
            }
            other => panic!("unexpected expression: {other:?}"),
        }
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(Operator::StartsWith.to_string(), "STARTS_WITH");
        assert_eq!(Operator::NotEq.to_string(), "!=");
        assert_eq!(Literal::Int(-3).to_string(), "-3");
    }
}
