//! Conversion context accumulated while walking a filter expression.
//!
//! A `ConversionContext` is created for a single conversion, threaded through
//! the recursive walk by `&mut`, and then handed to the scoping policy. It is
//! never shared between requests.

use std::collections::BTreeSet;

use crate::types::Attribute;

/// What kind of executions a listing is allowed to see.
///
/// Supplied by the caller; never inferred from the filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Ordinary user-visible executions only.
    Standard,
    /// Executions of one internal sub-system, identified by archetype id.
    Scoped(String),
}

impl QueryKind {
    /// Create a scoped query kind.
    #[must_use]
    pub fn scoped(archetype_id: impl Into<String>) -> Self {
        Self::Scoped(archetype_id.into())
    }

    /// The archetype id for scoped queries.
    #[must_use]
    pub fn archetype_id(&self) -> Option<&str> {
        match self {
            Self::Standard => None,
            Self::Scoped(id) => Some(id),
        }
    }
}

/// State gathered during one conversion.
#[derive(Debug)]
pub struct ConversionContext {
    kind: QueryKind,
    partition_attribute: String,
    /// Reserved attributes referenced anywhere in the expression.
    referenced_reserved: BTreeSet<String>,
}

impl ConversionContext {
    /// Create a context for a query of `kind`.
    #[must_use]
    pub fn new(kind: QueryKind, partition_attribute: impl Into<String>) -> Self {
        Self {
            kind,
            partition_attribute: partition_attribute.into(),
            referenced_reserved: BTreeSet::new(),
        }
    }

    /// Record that the expression referenced `attribute`.
    ///
    /// Only reserved attributes are tracked.
    pub fn record_reference(&mut self, attribute: &Attribute) {
        if attribute.is_system_reserved && !self.referenced_reserved.contains(&attribute.name) {
            self.referenced_reserved
                .insert(attribute.name.as_str().to_owned());
        }
    }

    /// The query kind supplied by the caller.
    #[must_use]
    pub const fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// Name of the partition attribute this context tracks.
    #[must_use]
    pub fn partition_attribute(&self) -> &str {
        &self.partition_attribute
    }

    /// Whether the expression referenced the partition attribute.
    #[must_use]
    pub fn partition_referenced(&self) -> bool {
        self.referenced_reserved.contains(&self.partition_attribute)
    }

    /// Whether the expression referenced the reserved attribute `name`.
    #[must_use]
    pub fn references(&self, name: &str) -> bool {
        self.referenced_reserved.contains(name)
    }

    /// Reserved attributes referenced, in name order.
    pub fn referenced_reserved(&self) -> impl Iterator<Item = &str> {
        self.referenced_reserved.iter().map(String::as_str)
    }
}
