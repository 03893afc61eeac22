//! Relational filter rendering.
//!
//! `SqlFilterOps` renders a parameterized WHERE clause for a visibility
//! table in which every registered attribute is a nullable column. Unset
//! attributes are NULL, so presence tests use `IS NULL`/`IS NOT NULL`.
//!
//! # Column Mapping
//!
//! - Reserved attributes map to snake_case columns (`WorkflowId` -> `workflow_id`)
//! - Custom attributes map to back-quoted columns of the same name
//! - Keyword lists are JSON array columns; membership uses `JSON_CONTAINS`
//!
//! # Null Handling
//!
//! A comparison against a NULL column evaluates to NULL, which a WHERE
//! clause treats as false. `NOT` is rendered as `NOT COALESCE(.., FALSE)` so
//! that negation stays two-valued and matches the document adapter.

use std::ops::Bound;

use crate::query::ops::ensure_comparable;
use crate::query::{ConvertError, FilterOps, Operator, RangeBounds};
use crate::types::{Attribute, AttributeType, AttributeValue};

/// Escape character used in `LIKE` patterns.
const LIKE_ESCAPE: char = '!';

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Bool(bool),
    /// Nanoseconds since the Unix epoch.
    Datetime(i64),
}

/// A WHERE clause with `?` placeholders and its parameters in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFilter {
    pub clause: String,
    pub params: Vec<SqlParam>,
}

impl SqlFilter {
    fn literal(clause: &str) -> Self {
        Self {
            clause: clause.to_owned(),
            params: Vec::new(),
        }
    }

    fn is_true(&self) -> bool {
        self.clause == "TRUE" && self.params.is_empty()
    }

    fn combine(self, keyword: &str, other: Self) -> Self {
        let mut params = self.params;
        params.extend(other.params);
        Self {
            clause: format!("({}) {keyword} ({})", self.clause, other.clause),
            params,
        }
    }
}

/// `FilterOps` rendering SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlFilterOps;

impl SqlFilterOps {
    /// Column expression for an attribute.
    #[must_use]
    pub fn column(attribute: &Attribute) -> String {
        if attribute.is_system_reserved {
            snake_case(&attribute.name)
        } else {
            format!("`{}`", attribute.name.replace('`', "``"))
        }
    }

    /// Parameter for a scalar value, or a JSON text parameter for keyword
    /// list membership.
    fn param(attribute: &Attribute, value: &AttributeValue) -> SqlParam {
        match value {
            AttributeValue::Text(s) if attribute.attribute_type == AttributeType::KeywordList => {
                SqlParam::Text(serde_json::Value::from(s.as_str()).to_string())
            }
            AttributeValue::Text(s) => SqlParam::Text(s.as_str().to_owned()),
            AttributeValue::Int(n) => SqlParam::Int(*n),
            AttributeValue::Bool(b) => SqlParam::Bool(*b),
            AttributeValue::Datetime(nanos) => SqlParam::Datetime(*nanos),
            AttributeValue::KeywordList(items) => SqlParam::Text(
                serde_json::Value::from(items.as_slice()).to_string(),
            ),
        }
    }

    fn comparison(
        attribute: &Attribute,
        symbol: &str,
        value: &AttributeValue,
    ) -> Result<SqlFilter, ConvertError> {
        ensure_comparable(attribute, value)?;
        Ok(SqlFilter {
            clause: format!("{} {symbol} ?", Self::column(attribute)),
            params: vec![Self::param(attribute, value)],
        })
    }

    fn contains(attribute: &Attribute, value: &AttributeValue) -> Result<SqlFilter, ConvertError> {
        ensure_comparable(attribute, value)?;
        Ok(SqlFilter {
            clause: format!("JSON_CONTAINS({}, ?)", Self::column(attribute)),
            params: vec![Self::param(attribute, value)],
        })
    }
}

impl FilterOps for SqlFilterOps {
    type Filter = SqlFilter;

    fn match_all(&self) -> SqlFilter {
        SqlFilter::literal("TRUE")
    }

    fn equals(
        &self,
        attribute: &Attribute,
        value: &AttributeValue,
    ) -> Result<SqlFilter, ConvertError> {
        if attribute.attribute_type == AttributeType::KeywordList {
            return Self::contains(attribute, value);
        }
        Self::comparison(attribute, "=", value)
    }

    fn not_equals(
        &self,
        attribute: &Attribute,
        value: &AttributeValue,
    ) -> Result<SqlFilter, ConvertError> {
        if attribute.attribute_type == AttributeType::KeywordList {
            let contains = Self::contains(attribute, value)?;
            return Ok(SqlFilter {
                clause: format!(
                    "({} IS NOT NULL AND NOT {})",
                    Self::column(attribute),
                    contains.clause
                ),
                params: contains.params,
            });
        }
        Self::comparison(attribute, "<>", value)
    }

    fn range(&self, attribute: &Attribute, bounds: RangeBounds) -> Result<SqlFilter, ConvertError> {
        if matches!(
            attribute.attribute_type,
            AttributeType::KeywordList | AttributeType::Bool
        ) {
            return Err(ConvertError::UnsupportedOperator {
                attribute: attribute.name.as_str().to_owned(),
                operator: Operator::Lt,
            });
        }

        let mut parts = Vec::with_capacity(2);
        match &bounds.lower {
            Bound::Included(value) => parts.push(Self::comparison(attribute, ">=", value)?),
            Bound::Excluded(value) => parts.push(Self::comparison(attribute, ">", value)?),
            Bound::Unbounded => {}
        }
        match &bounds.upper {
            Bound::Included(value) => parts.push(Self::comparison(attribute, "<=", value)?),
            Bound::Excluded(value) => parts.push(Self::comparison(attribute, "<", value)?),
            Bound::Unbounded => {}
        }

        let mut parts = parts.into_iter();
        let Some(first) = parts.next() else {
            return Ok(self.exists(attribute));
        };
        Ok(parts.fold(first, |acc, part| acc.combine("AND", part)))
    }

    fn in_list(
        &self,
        attribute: &Attribute,
        values: &[AttributeValue],
    ) -> Result<SqlFilter, ConvertError> {
        if values.is_empty() {
            return Ok(SqlFilter::literal("FALSE"));
        }

        if attribute.attribute_type == AttributeType::KeywordList {
            let mut members = values.iter().map(|value| Self::contains(attribute, value));
            let first = members
                .next()
                .unwrap_or_else(|| Ok(SqlFilter::literal("FALSE")))?;
            return members.try_fold(first, |acc, member| Ok(acc.combine("OR", member?)));
        }

        let mut params = Vec::with_capacity(values.len());
        for value in values {
            ensure_comparable(attribute, value)?;
            params.push(Self::param(attribute, value));
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        Ok(SqlFilter {
            clause: format!("{} IN ({placeholders})", Self::column(attribute)),
            params,
        })
    }

    fn starts_with(&self, attribute: &Attribute, prefix: &str) -> Result<SqlFilter, ConvertError> {
        if attribute.attribute_type != AttributeType::Keyword {
            return Err(ConvertError::UnsupportedOperator {
                attribute: attribute.name.as_str().to_owned(),
                operator: Operator::StartsWith,
            });
        }
        let mut pattern = escape_like(prefix);
        pattern.push('%');
        Ok(SqlFilter {
            clause: format!(
                "{} LIKE ? ESCAPE '{LIKE_ESCAPE}'",
                Self::column(attribute)
            ),
            params: vec![SqlParam::Text(pattern)],
        })
    }

    fn exists(&self, attribute: &Attribute) -> SqlFilter {
        SqlFilter::literal(&format!("{} IS NOT NULL", Self::column(attribute)))
    }

    fn not_exists(&self, attribute: &Attribute) -> SqlFilter {
        SqlFilter::literal(&format!("{} IS NULL", Self::column(attribute)))
    }

    fn and(&self, left: SqlFilter, right: SqlFilter) -> SqlFilter {
        if left.is_true() {
            return right;
        }
        if right.is_true() {
            return left;
        }
        left.combine("AND", right)
    }

    fn or(&self, left: SqlFilter, right: SqlFilter) -> SqlFilter {
        left.combine("OR", right)
    }

    fn not(&self, inner: SqlFilter) -> SqlFilter {
        SqlFilter {
            clause: format!("NOT COALESCE(({}), FALSE)", inner.clause),
            params: inner.params,
        }
    }
}

/// `WorkflowId` -> `workflow_id`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '.' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

/// Escape `LIKE` wildcards and the escape character itself.
fn escape_like(text: &str) -> String {
    text.chars().fold(String::with_capacity(text.len()), |mut acc, c| {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            acc.push(LIKE_ESCAPE);
        }
        acc.push(c);
        acc
    })
}
