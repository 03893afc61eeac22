//! Scoping policy.
//!
//! Appends the implicit partition predicate to every converted filter. The
//! policy runs after *every* conversion, including conversions of an absent
//! expression; there is no input for which it is skipped.
//!
//! | Query kind    | Partition referenced | Appended predicate              |
//! |---------------|----------------------|---------------------------------|
//! | Standard      | no                   | `NotExists(partition)`          |
//! | Standard      | yes                  | none                            |
//! | Scoped(id)    | no                   | `Equals(partition, id)`         |
//! | Scoped(id)    | yes                  | none                            |
//!
//! An explicit constraint written by the caller is never overridden.

use super::context::{ConversionContext, QueryKind};
use super::error::ConvertError;
use super::ops::FilterOps;
use crate::types::{Attribute, AttributeValue};

/// Outcome of the decision table, independent of any backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopingDecision {
    /// Exclude every system execution.
    ExcludeSystem,
    /// Restrict to executions of one archetype.
    RestrictToArchetype(String),
    /// The caller constrained the partition attribute explicitly.
    CallerConstrained,
}

impl ScopingDecision {
    /// Apply the decision table to a finished conversion context.
    #[must_use]
    pub fn decide(ctx: &ConversionContext) -> Self {
        if ctx.partition_referenced() {
            return Self::CallerConstrained;
        }
        match ctx.kind() {
            QueryKind::Standard => Self::ExcludeSystem,
            QueryKind::Scoped(archetype_id) => {
                Self::RestrictToArchetype(archetype_id.as_str().to_owned())
            }
        }
    }
}

/// Applies the decision table using a backend's filter primitives.
pub struct ScopingPolicy<'a, O: FilterOps> {
    ops: &'a O,
    partition: &'a Attribute,
}

impl<'a, O: FilterOps> ScopingPolicy<'a, O> {
    /// Create a policy for `partition`, composing through `ops`.
    pub const fn new(ops: &'a O, partition: &'a Attribute) -> Self {
        Self { ops, partition }
    }

    /// Combine `filter` with the partition predicate the context calls for.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend refuses to express equality on
    /// the partition attribute. The filter is never returned unscoped.
    pub fn apply(
        &self,
        filter: O::Filter,
        ctx: &ConversionContext,
    ) -> Result<O::Filter, ConvertError> {
        let decision = ScopingDecision::decide(ctx);
        tracing::debug!(?decision, "applying visibility scoping");

        let predicate = match decision {
            ScopingDecision::CallerConstrained => return Ok(filter),
            ScopingDecision::ExcludeSystem => self.ops.not_exists(self.partition),
            ScopingDecision::RestrictToArchetype(archetype_id) => self
                .ops
                .equals(self.partition, &AttributeValue::Text(archetype_id))?,
        };
        Ok(self.ops.and(filter, predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::document::{DocumentFilter, DocumentFilterOps};
    use crate::query::converter::QueryConverter;
    use crate::query::parser::parse_query;
    use crate::registry::{AttributeLookup, AttributeRegistry, DEFAULT_PARTITION_ATTRIBUTE};
    use crate::types::AttributeType;

    fn scoped_filter(text: &str, kind: QueryKind) -> DocumentFilter {
        let registry = AttributeRegistry::default()
            .with_custom("CustomAttr", AttributeType::Keyword)
            .expect("registry");
        let ops = DocumentFilterOps;
        let converter = QueryConverter::new(&registry, &ops);
        let parsed = parse_query(text).expect("parse");
        let (filter, ctx) = converter
            .convert(parsed.filter.as_ref(), kind)
            .expect("convert");
        ScopingPolicy::new(&ops, registry.partition_attribute())
            .apply(filter, &ctx)
            .expect("scope")
    }

    fn partition_absent() -> DocumentFilter {
        DocumentFilter::NotExists(DEFAULT_PARTITION_ATTRIBUTE.to_owned())
    }

    fn partition_is(id: &str) -> DocumentFilter {
        DocumentFilter::Term {
            field: DEFAULT_PARTITION_ATTRIBUTE.to_owned(),
            value: AttributeValue::text(id),
        }
    }

    #[test]
    fn test_decision_table() {
        let mut ctx = ConversionContext::new(QueryKind::Standard, "P");
        assert_eq!(ScopingDecision::decide(&ctx), ScopingDecision::ExcludeSystem);
        ctx.record_reference(&Attribute::system("P", AttributeType::Keyword));
        assert_eq!(ScopingDecision::decide(&ctx), ScopingDecision::CallerConstrained);

        let mut ctx = ConversionContext::new(QueryKind::scoped("arch-1"), "P");
        assert_eq!(
            ScopingDecision::decide(&ctx),
            ScopingDecision::RestrictToArchetype("arch-1".to_owned())
        );
        ctx.record_reference(&Attribute::system("P", AttributeType::Keyword));
        assert_eq!(ScopingDecision::decide(&ctx), ScopingDecision::CallerConstrained);
    }

    #[test]
    fn test_standard_absent_expression_is_scoped() {
        assert_eq!(scoped_filter("", QueryKind::Standard), partition_absent());
    }

    #[test]
    fn test_standard_expression_is_scoped() {
        assert_eq!(
            scoped_filter("CustomAttr = 'x'", QueryKind::Standard),
            DocumentFilter::And(vec![
                DocumentFilter::Term {
                    field: "CustomAttr".to_owned(),
                    value: AttributeValue::text("x"),
                },
                partition_absent(),
            ])
        );
    }

    #[test]
    fn test_scoped_absent_expression_is_restricted() {
        assert_eq!(
            scoped_filter("", QueryKind::scoped("chasm-archetype-1")),
            partition_is("chasm-archetype-1")
        );
    }

    #[test]
    fn test_explicit_partition_is_not_overridden() {
        let text = format!("{DEFAULT_PARTITION_ATTRIBUTE} IS NOT NULL");
        assert_eq!(
            scoped_filter(&text, QueryKind::Standard),
            DocumentFilter::Exists(DEFAULT_PARTITION_ATTRIBUTE.to_owned())
        );

        let text = format!("{DEFAULT_PARTITION_ATTRIBUTE} = 'other'");
        assert_eq!(
            scoped_filter(&text, QueryKind::scoped("mine")),
            partition_is("other")
        );
    }

    #[test]
    fn test_constant_true_matches_absent_expression() {
        assert_eq!(
            scoped_filter("1=1", QueryKind::Standard),
            scoped_filter("", QueryKind::Standard)
        );
    }
}
