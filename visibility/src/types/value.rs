//! Typed attribute values as stored on execution records.

use std::cmp::Ordering;
use std::fmt;

use super::AttributeType;

/// A stored attribute value.
///
/// `String` and `Keyword` attributes both hold `Text`; the attribute type,
/// not the value, decides which operators apply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    /// Text for `String` and `Keyword` attributes.
    Text(String),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
    /// Nanoseconds since the Unix epoch.
    Datetime(i64),
    /// Keyword list value.
    KeywordList(Vec<String>),
}

impl AttributeValue {
    /// Create a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Create a keyword list value.
    #[must_use]
    pub fn keyword_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::KeywordList(items.into_iter().map(Into::into).collect())
    }

    /// Check whether this value can be stored under an attribute of `ty`.
    #[must_use]
    pub const fn fits(&self, ty: AttributeType) -> bool {
        matches!(
            (self, ty),
            (Self::Text(_), AttributeType::String | AttributeType::Keyword)
                | (Self::Int(_), AttributeType::Int)
                | (Self::Bool(_), AttributeType::Bool)
                | (Self::Datetime(_), AttributeType::Datetime)
                | (Self::KeywordList(_), AttributeType::KeywordList)
        )
    }

    /// Get the text if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Membership test for keyword lists; plain equality otherwise.
    #[must_use]
    pub fn matches_term(&self, term: &Self) -> bool {
        match (self, term) {
            (Self::KeywordList(items), Self::Text(t)) => items.iter().any(|item| item == t),
            _ => self == term,
        }
    }

    /// Compare two values of the same kind.
    ///
    /// Returns `None` for values of different kinds and for keyword lists,
    /// which have no order.
    #[must_use]
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) | (Self::Datetime(a), Self::Datetime(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting result pages.
    ///
    /// Values of the same kind compare naturally; different kinds fall back to
    /// a fixed rank so that sorting never panics on mixed data.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.partial_compare(other).unwrap_or_else(|| match (self, other) {
            (Self::KeywordList(a), Self::KeywordList(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        })
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) => 1,
            Self::Datetime(_) => 2,
            Self::Text(_) => 3,
            Self::KeywordList(_) => 4,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Datetime(nanos) => write!(f, "@{nanos}"),
            Self::KeywordList(items) => write!(f, "{items:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_list_membership() {
        let list = AttributeValue::keyword_list(["a", "b"]);
        assert!(list.matches_term(&AttributeValue::text("b")));
        assert!(!list.matches_term(&AttributeValue::text("c")));
        assert!(AttributeValue::Int(3).matches_term(&AttributeValue::Int(3)));
    }

    #[test]
    fn test_compare_requires_same_kind() {
        assert_eq!(
            AttributeValue::Int(1).partial_compare(&AttributeValue::Int(2)),
            Some(Ordering::Less)
        );
        assert_eq!(
            AttributeValue::Int(1).partial_compare(&AttributeValue::Datetime(2)),
            None
        );
        assert_eq!(
            AttributeValue::Int(5).total_cmp(&AttributeValue::text("a")),
            Ordering::Less
        );
    }

    #[test]
    fn test_fits() {
        assert!(AttributeValue::text("x").fits(AttributeType::Keyword));
        assert!(AttributeValue::text("x").fits(AttributeType::String));
        assert!(!AttributeValue::Int(1).fits(AttributeType::Datetime));
    }
}
