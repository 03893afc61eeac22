//! Filter capability interface implemented by each backend.
//!
//! The converter never builds backend syntax itself. It composes filters
//! exclusively through `FilterOps`, so supporting a new store means
//! implementing this trait and nothing else.
//!
//! Comparison primitives return `Result`: a backend that cannot express a
//! comparison for some attribute type must reject it here, at conversion
//! time, instead of silently dropping the predicate.

use std::ops::Bound;

use super::error::ConvertError;
use crate::types::{Attribute, AttributeType, AttributeValue};

/// Bounds of a range comparison. At least one side is bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBounds {
    pub lower: Bound<AttributeValue>,
    pub upper: Bound<AttributeValue>,
}

impl RangeBounds {
    /// `value > bound` or `value >= bound`.
    #[must_use]
    pub fn above(bound: AttributeValue, inclusive: bool) -> Self {
        Self {
            lower: if inclusive {
                Bound::Included(bound)
            } else {
                Bound::Excluded(bound)
            },
            upper: Bound::Unbounded,
        }
    }

    /// `value < bound` or `value <= bound`.
    #[must_use]
    pub fn below(bound: AttributeValue, inclusive: bool) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: if inclusive {
                Bound::Included(bound)
            } else {
                Bound::Excluded(bound)
            },
        }
    }
}

/// Check that `value` can be compared against `attribute`.
///
/// Keyword lists are compared against single keywords (membership).
///
/// # Errors
///
/// Returns `TypeMismatch` when the value kind does not fit the attribute.
pub fn ensure_comparable(attribute: &Attribute, value: &AttributeValue) -> Result<(), ConvertError> {
    let comparable = value.fits(attribute.attribute_type)
        || (attribute.attribute_type == AttributeType::KeywordList
            && matches!(value, AttributeValue::Text(_)));
    if comparable {
        Ok(())
    } else {
        Err(ConvertError::TypeMismatch {
            attribute: attribute.name.as_str().to_owned(),
            expected: attribute.attribute_type,
            found: value.to_string(),
        })
    }
}

/// Backend-native filter construction.
///
/// Semantics every implementation must preserve:
/// - a comparison never matches an execution where the attribute is absent
/// - `exists`/`not_exists` test presence, not a stored null marker
/// - `not` is two-valued: it matches exactly what `inner` does not
/// - for `KeywordList` attributes, `equals`/`in_list` test membership
pub trait FilterOps {
    /// The backend's native filter representation.
    type Filter;

    /// A filter matching every execution.
    fn match_all(&self) -> Self::Filter;

    fn equals(
        &self,
        attribute: &Attribute,
        value: &AttributeValue,
    ) -> Result<Self::Filter, ConvertError>;

    fn not_equals(
        &self,
        attribute: &Attribute,
        value: &AttributeValue,
    ) -> Result<Self::Filter, ConvertError>;

    fn range(
        &self,
        attribute: &Attribute,
        bounds: RangeBounds,
    ) -> Result<Self::Filter, ConvertError>;

    fn in_list(
        &self,
        attribute: &Attribute,
        values: &[AttributeValue],
    ) -> Result<Self::Filter, ConvertError>;

    fn starts_with(
        &self,
        attribute: &Attribute,
        prefix: &str,
    ) -> Result<Self::Filter, ConvertError>;

    /// Matches executions where the attribute is present.
    fn exists(&self, attribute: &Attribute) -> Self::Filter;

    /// Matches executions where the attribute is absent.
    fn not_exists(&self, attribute: &Attribute) -> Self::Filter;

    fn and(&self, left: Self::Filter, right: Self::Filter) -> Self::Filter;

    fn or(&self, left: Self::Filter, right: Self::Filter) -> Self::Filter;

    fn not(&self, inner: Self::Filter) -> Self::Filter;
}
