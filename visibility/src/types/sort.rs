//! Sort specifications for listings.

use std::fmt;

use crate::registry::START_TIME;

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => f.write_str("ASC"),
            Self::Descending => f.write_str("DESC"),
        }
    }
}

/// One `(attribute, direction)` pair of an ORDER BY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub attribute: String,
    pub direction: SortDirection,
}

impl SortKey {
    #[must_use]
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: SortDirection::Ascending,
        }
    }

    #[must_use]
    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Ordered sequence of sort keys.
///
/// Never empty: an unspecified order means `StartTime DESC`. Stores break
/// remaining ties on `RunId` so that every ordering is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Build a spec from explicit keys, falling back to the default when empty.
    #[must_use]
    pub fn from_keys(keys: Vec<SortKey>) -> Self {
        if keys.is_empty() {
            return Self::default();
        }
        Self { keys }
    }

    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Attribute names in key order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|key| key.attribute.as_str())
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            keys: vec![SortKey::desc(START_TIME)],
        }
    }
}
