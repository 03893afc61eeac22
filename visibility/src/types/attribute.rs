//! Search attribute definitions.
//!
//! An `Attribute` is the registry's description of a named, typed field that
//! executions may carry. Attributes are immutable once registered.

use std::fmt;

/// Semantic type of a search attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// Free text. Only equality is meaningful.
    String,
    /// Exact-match string, orderable and prefix-searchable.
    Keyword,
    /// Signed 64-bit integer.
    Int,
    /// Boolean.
    Bool,
    /// Point in time, stored as nanoseconds since the Unix epoch.
    Datetime,
    /// Unordered set of keywords. Comparisons test membership.
    KeywordList,
}

impl AttributeType {
    /// Stable name used in config and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Keyword => "Keyword",
            Self::Int => "Int",
            Self::Bool => "Bool",
            Self::Datetime => "Datetime",
            Self::KeywordList => "KeywordList",
        }
    }

    /// Parse a type name, ignoring ASCII case.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        [
            Self::String,
            Self::Keyword,
            Self::Int,
            Self::Bool,
            Self::Datetime,
            Self::KeywordList,
        ]
        .into_iter()
        .find(|ty| ty.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Whether results can be ordered by an attribute of this type.
    #[must_use]
    pub const fn is_sortable(self) -> bool {
        !matches!(self, Self::String | Self::KeywordList)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A registered search attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name, matched case-sensitively.
    pub name: String,
    /// Semantic type.
    pub attribute_type: AttributeType,
    /// True for attributes owned by the system rather than registered by users.
    pub is_system_reserved: bool,
}

impl Attribute {
    /// Create a system-reserved attribute.
    #[must_use]
    pub fn system(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            is_system_reserved: true,
        }
    }

    /// Create a user-registered attribute.
    #[must_use]
    pub fn custom(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            is_system_reserved: false,
        }
    }
}
