//! Document-store adapter.
//!
//! Executions are stored as sparse documents: an attribute that was never
//! set has no key at all. The native filter is a small term/range/exists
//! tree in the style of a search-engine bool query, evaluated in memory by
//! `MemoryStore`.

mod store;
mod token;

pub use store::MemoryStore;
pub use token::{PageCursor, SortPosition};

use std::ops::Bound;

use crate::query::ops::ensure_comparable;
use crate::query::{ConvertError, FilterOps, Operator, RangeBounds};
use crate::types::{Attribute, AttributeType, AttributeValue, ExecutionRecord};

/// Native filter of the document adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    /// Matches every document.
    MatchAll,
    /// Field present and equal to `value` (membership for keyword lists).
    Term { field: String, value: AttributeValue },
    /// Field present and not equal to `value`.
    NotTerm { field: String, value: AttributeValue },
    /// Field present and within `bounds`.
    Range { field: String, bounds: RangeBounds },
    /// Field present and equal to any of `values`.
    Terms {
        field: String,
        values: Vec<AttributeValue>,
    },
    /// Field present and starting with `prefix`.
    Prefix { field: String, prefix: String },
    /// Field present.
    Exists(String),
    /// Field absent.
    NotExists(String),
    And(Vec<DocumentFilter>),
    Or(Vec<DocumentFilter>),
    Not(Box<DocumentFilter>),
}

impl DocumentFilter {
    /// Evaluate the filter against a record.
    #[must_use]
    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        match self {
            Self::MatchAll => true,
            Self::Term { field, value } => record
                .get(field)
                .is_some_and(|stored| stored.matches_term(value)),
            Self::NotTerm { field, value } => record
                .get(field)
                .is_some_and(|stored| !stored.matches_term(value)),
            Self::Range { field, bounds } => record
                .get(field)
                .is_some_and(|stored| within(stored, bounds)),
            Self::Terms { field, values } => record
                .get(field)
                .is_some_and(|stored| values.iter().any(|value| stored.matches_term(value))),
            Self::Prefix { field, prefix } => record
                .get(field)
                .and_then(AttributeValue::as_text)
                .is_some_and(|text| text.starts_with(prefix.as_str())),
            Self::Exists(field) => record.has(field),
            Self::NotExists(field) => !record.has(field),
            Self::And(filters) => filters.iter().all(|filter| filter.matches(record)),
            Self::Or(filters) => filters.iter().any(|filter| filter.matches(record)),
            Self::Not(inner) => !inner.matches(record),
        }
    }
}

fn within(value: &AttributeValue, bounds: &RangeBounds) -> bool {
    let above_lower = match &bounds.lower {
        Bound::Unbounded => true,
        Bound::Included(lower) => value.partial_compare(lower).is_some_and(|o| o.is_ge()),
        Bound::Excluded(lower) => value.partial_compare(lower).is_some_and(|o| o.is_gt()),
    };
    let below_upper = match &bounds.upper {
        Bound::Unbounded => true,
        Bound::Included(upper) => value.partial_compare(upper).is_some_and(|o| o.is_le()),
        Bound::Excluded(upper) => value.partial_compare(upper).is_some_and(|o| o.is_lt()),
    };
    above_lower && below_upper
}

/// `FilterOps` for the document adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentFilterOps;

impl DocumentFilterOps {
    fn check_bound(attribute: &Attribute, bound: &Bound<AttributeValue>) -> Result<(), ConvertError> {
        match bound {
            Bound::Included(value) | Bound::Excluded(value) => ensure_comparable(attribute, value),
            Bound::Unbounded => Ok(()),
        }
    }
}

impl FilterOps for DocumentFilterOps {
    type Filter = DocumentFilter;

    fn match_all(&self) -> DocumentFilter {
        DocumentFilter::MatchAll
    }

    fn equals(
        &self,
        attribute: &Attribute,
        value: &AttributeValue,
    ) -> Result<DocumentFilter, ConvertError> {
        ensure_comparable(attribute, value)?;
        Ok(DocumentFilter::Term {
            field: attribute.name.as_str().to_owned(),
            value: value.clone(),
        })
    }

    fn not_equals(
        &self,
        attribute: &Attribute,
        value: &AttributeValue,
    ) -> Result<DocumentFilter, ConvertError> {
        ensure_comparable(attribute, value)?;
        Ok(DocumentFilter::NotTerm {
            field: attribute.name.as_str().to_owned(),
            value: value.clone(),
        })
    }

    fn range(
        &self,
        attribute: &Attribute,
        bounds: RangeBounds,
    ) -> Result<DocumentFilter, ConvertError> {
        if matches!(
            attribute.attribute_type,
            AttributeType::KeywordList | AttributeType::Bool
        ) {
            return Err(ConvertError::UnsupportedOperator {
                attribute: attribute.name.as_str().to_owned(),
                operator: Operator::Lt,
            });
        }
        Self::check_bound(attribute, &bounds.lower)?;
        Self::check_bound(attribute, &bounds.upper)?;
        Ok(DocumentFilter::Range {
            field: attribute.name.as_str().to_owned(),
            bounds,
        })
    }

    fn in_list(
        &self,
        attribute: &Attribute,
        values: &[AttributeValue],
    ) -> Result<DocumentFilter, ConvertError> {
        for value in values {
            ensure_comparable(attribute, value)?;
        }
        Ok(DocumentFilter::Terms {
            field: attribute.name.as_str().to_owned(),
            values: values.to_vec(),
        })
    }

    fn starts_with(
        &self,
        attribute: &Attribute,
        prefix: &str,
    ) -> Result<DocumentFilter, ConvertError> {
        if !matches!(
            attribute.attribute_type,
            AttributeType::Keyword | AttributeType::String
        ) {
            return Err(ConvertError::UnsupportedOperator {
                attribute: attribute.name.as_str().to_owned(),
                operator: Operator::StartsWith,
            });
        }
        Ok(DocumentFilter::Prefix {
            field: attribute.name.as_str().to_owned(),
            prefix: prefix.to_owned(),
        })
    }

    fn exists(&self, attribute: &Attribute) -> DocumentFilter {
        DocumentFilter::Exists(attribute.name.as_str().to_owned())
    }

    fn not_exists(&self, attribute: &Attribute) -> DocumentFilter {
        DocumentFilter::NotExists(attribute.name.as_str().to_owned())
    }

    fn and(&self, left: DocumentFilter, right: DocumentFilter) -> DocumentFilter {
        let mut clauses = Vec::new();
        for filter in [left, right] {
            match filter {
                DocumentFilter::MatchAll => {}
                DocumentFilter::And(inner) => clauses.extend(inner),
                other => clauses.push(other),
            }
        }
        match clauses.len() {
            0 => DocumentFilter::MatchAll,
            1 => clauses.pop().unwrap_or(DocumentFilter::MatchAll),
            _ => DocumentFilter::And(clauses),
        }
    }

    fn or(&self, left: DocumentFilter, right: DocumentFilter) -> DocumentFilter {
        let mut clauses = Vec::new();
        for filter in [left, right] {
            match filter {
                DocumentFilter::Or(inner) => clauses.extend(inner),
                other => clauses.push(other),
            }
        }
        DocumentFilter::Or(clauses)
    }

    fn not(&self, inner: DocumentFilter) -> DocumentFilter {
        DocumentFilter::Not(Box::new(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword(name: &str) -> Attribute {
        Attribute::custom(name, AttributeType::Keyword)
    }

    fn record() -> ExecutionRecord {
        ExecutionRecord::new("run-1")
            .with("Name", AttributeValue::text("order-42"))
            .with("Count", AttributeValue::Int(7))
            .with("Tags", AttributeValue::keyword_list(["a", "b"]))
    }

    #[test]
    fn test_term_and_membership() {
        let name = DocumentFilter::Term {
            field: "Name".to_owned(),
            value: AttributeValue::text("order-42"),
        };
        assert!(name.matches(&record()));

        let tag = DocumentFilter::Term {
            field: "Tags".to_owned(),
            value: AttributeValue::text("b"),
        };
        assert!(tag.matches(&record()));
    }

    #[test]
    fn test_comparisons_never_match_absent_fields() {
        let missing = ExecutionRecord::new("run-2");
        let filters = [
            DocumentFilter::Term {
                field: "Name".to_owned(),
                value: AttributeValue::text("x"),
            },
            DocumentFilter::NotTerm {
                field: "Name".to_owned(),
                value: AttributeValue::text("x"),
            },
            DocumentFilter::Range {
                field: "Count".to_owned(),
                bounds: RangeBounds::above(AttributeValue::Int(0), true),
            },
            DocumentFilter::Prefix {
                field: "Name".to_owned(),
                prefix: String::new(),
            },
        ];
        for filter in filters {
            assert!(!filter.matches(&missing), "{filter:?} matched an absent field");
        }
        assert!(DocumentFilter::NotExists("Name".to_owned()).matches(&missing));
        assert!(!DocumentFilter::Exists("Name".to_owned()).matches(&missing));
    }

    #[test]
    fn test_range_bounds() {
        let inclusive = DocumentFilter::Range {
            field: "Count".to_owned(),
            bounds: RangeBounds::below(AttributeValue::Int(7), true),
        };
        let exclusive = DocumentFilter::Range {
            field: "Count".to_owned(),
            bounds: RangeBounds::below(AttributeValue::Int(7), false),
        };
        assert!(inclusive.matches(&record()));
        assert!(!exclusive.matches(&record()));
    }

    #[test]
    fn test_prefix() {
        let filter = DocumentFilter::Prefix {
            field: "Name".to_owned(),
            prefix: "order-".to_owned(),
        };
        assert!(filter.matches(&record()));
    }

    #[test]
    fn test_and_flattens_and_drops_match_all() {
        let ops = DocumentFilterOps;
        let a = DocumentFilter::Exists("A".to_owned());
        let b = DocumentFilter::Exists("B".to_owned());
        let c = DocumentFilter::Exists("C".to_owned());

        assert_eq!(ops.and(DocumentFilter::MatchAll, a.clone()), a);
        assert_eq!(
            ops.and(ops.and(a.clone(), b.clone()), c.clone()),
            DocumentFilter::And(vec![a, b, c])
        );
        assert_eq!(
            ops.and(DocumentFilter::MatchAll, DocumentFilter::MatchAll),
            DocumentFilter::MatchAll
        );
    }

    #[test]
    fn test_ops_reject_bad_combinations() {
        let ops = DocumentFilterOps;
        let flag = Attribute::custom("Flag", AttributeType::Bool);
        assert!(matches!(
            ops.range(&flag, RangeBounds::above(AttributeValue::Bool(true), true)),
            Err(ConvertError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            ops.starts_with(&Attribute::custom("N", AttributeType::Int), "1"),
            Err(ConvertError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            ops.equals(&keyword("K"), &AttributeValue::Int(1)),
            Err(ConvertError::TypeMismatch { .. })
        ));
        assert!(
            ops.equals(
                &Attribute::custom("L", AttributeType::KeywordList),
                &AttributeValue::text("x")
            )
            .is_ok()
        );
    }
}
