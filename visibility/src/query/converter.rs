//! Query converter.
//!
//! Walks a filter expression and composes the equivalent backend filter
//! through a `FilterOps` implementation, recording in a `ConversionContext`
//! which reserved attributes the expression touched.
//!
//! The converter is pure: it performs no I/O, never mutates the expression,
//! and has no side effects beyond populating the context it returns.
//!
//! # Null semantics
//!
//! Unset attributes are physically absent from an execution. `IS NULL`
//! therefore means "attribute not present" and always converts to
//! `FilterOps::not_exists`; `IS NOT NULL` converts to `FilterOps::exists`.
//! This choice is fixed here; only the backend's implementation of the two
//! primitives differs.

use super::ast::{Expr, Literal, Operand, Operator};
use super::context::{ConversionContext, QueryKind};
use super::error::ConvertError;
use super::ops::{FilterOps, RangeBounds};
use crate::registry::AttributeLookup;
use crate::types::{Attribute, AttributeType, AttributeValue, SortKey, SortSpec};

/// Converts filter expressions into backend filters.
pub struct QueryConverter<'a, O: FilterOps> {
    registry: &'a dyn AttributeLookup,
    ops: &'a O,
}

impl<'a, O: FilterOps> QueryConverter<'a, O> {
    /// Create a converter reading `registry` and composing through `ops`.
    pub fn new(registry: &'a dyn AttributeLookup, ops: &'a O) -> Self {
        Self { registry, ops }
    }

    /// Convert an optional expression for a query of `kind`.
    ///
    /// An absent expression is a normal input: it converts to the always-true
    /// filter with a context in which nothing was referenced. The caller must
    /// still run the scoping policy on the result.
    ///
    /// # Errors
    ///
    /// Returns the first `UnknownAttribute`, `UnsupportedOperator` or
    /// `TypeMismatch` found, in left-to-right order.
    pub fn convert(
        &self,
        expr: Option<&Expr>,
        kind: QueryKind,
    ) -> Result<(O::Filter, ConversionContext), ConvertError> {
        let mut ctx = ConversionContext::new(kind, self.registry.partition_attribute().name.as_str());

        let filter = match expr {
            Some(expr) => self.convert_expr(expr, &mut ctx)?,
            None => self.ops.match_all(),
        };

        tracing::debug!(
            partition_referenced = ctx.partition_referenced(),
            "converted visibility filter"
        );
        Ok((filter, ctx))
    }

    /// Validate ORDER BY keys against the registry.
    ///
    /// Empty keys produce the default sort.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAttribute` for unregistered names and `InvalidSort` for
    /// unsortable types or repeated attributes.
    pub fn convert_sort(&self, keys: &[SortKey]) -> Result<SortSpec, ConvertError> {
        let mut validated: Vec<SortKey> = Vec::with_capacity(keys.len());
        for key in keys {
            let attribute = self
                .registry
                .get_attribute(&key.attribute)
                .ok_or_else(|| ConvertError::UnknownAttribute(key.attribute.as_str().to_owned()))?;

            if !attribute.attribute_type.is_sortable() {
                return Err(ConvertError::InvalidSort(format!(
                    "cannot sort by {} attribute {}",
                    attribute.attribute_type, attribute.name
                )));
            }
            if validated.iter().any(|k| k.attribute == key.attribute) {
                return Err(ConvertError::InvalidSort(format!(
                    "{} appears more than once",
                    key.attribute
                )));
            }
            validated.push(key.clone());
        }
        Ok(SortSpec::from_keys(validated))
    }

    fn convert_expr(
        &self,
        expr: &Expr,
        ctx: &mut ConversionContext,
    ) -> Result<O::Filter, ConvertError> {
        match expr {
            Expr::Comparison {
                attribute,
                operator,
                operand,
            } => self.convert_comparison(attribute, *operator, operand, ctx),
            Expr::IsNull(name) => {
                let attribute = self.resolve(name, ctx)?;
                Ok(self.ops.not_exists(attribute))
            }
            Expr::IsNotNull(name) => {
                let attribute = self.resolve(name, ctx)?;
                Ok(self.ops.exists(attribute))
            }
            Expr::And(left, right) => {
                let left = self.convert_expr(left, ctx)?;
                let right = self.convert_expr(right, ctx)?;
                Ok(self.ops.and(left, right))
            }
            Expr::Or(left, right) => {
                let left = self.convert_expr(left, ctx)?;
                let right = self.convert_expr(right, ctx)?;
                Ok(self.ops.or(left, right))
            }
            Expr::Not(inner) => {
                let inner = self.convert_expr(inner, ctx)?;
                Ok(self.ops.not(inner))
            }
            Expr::Constant(true) => Ok(self.ops.match_all()),
            Expr::Constant(false) => Ok(self.ops.not(self.ops.match_all())),
        }
    }

    fn convert_comparison(
        &self,
        name: &str,
        operator: Operator,
        operand: &Operand,
        ctx: &mut ConversionContext,
    ) -> Result<O::Filter, ConvertError> {
        let attribute = self.resolve(name, ctx)?;

        if !supports(attribute.attribute_type, operator) {
            return Err(unsupported(attribute, operator));
        }

        let literal = match (operator, operand) {
            (Operator::In, Operand::List(literals)) => {
                let values = literals
                    .iter()
                    .map(|literal| coerce(attribute, literal))
                    .collect::<Result<Vec<_>, _>>()?;
                return self.ops.in_list(attribute, &values);
            }
            (Operator::In, Operand::Value(literal)) => {
                let value = coerce(attribute, literal)?;
                return self.ops.in_list(attribute, std::slice::from_ref(&value));
            }
            (_, Operand::List(_)) => return Err(unsupported(attribute, operator)),
            (_, Operand::Value(literal)) => literal,
        };

        match operator {
            Operator::StartsWith => match literal {
                Literal::String(prefix) => self.ops.starts_with(attribute, prefix),
                other => Err(mismatch(attribute, other)),
            },
            Operator::Eq => self.ops.equals(attribute, &coerce(attribute, literal)?),
            Operator::NotEq => self.ops.not_equals(attribute, &coerce(attribute, literal)?),
            Operator::Lt => self.ops.range(
                attribute,
                RangeBounds::below(coerce(attribute, literal)?, false),
            ),
            Operator::LtEq => self.ops.range(
                attribute,
                RangeBounds::below(coerce(attribute, literal)?, true),
            ),
            Operator::Gt => self.ops.range(
                attribute,
                RangeBounds::above(coerce(attribute, literal)?, false),
            ),
            Operator::GtEq => self.ops.range(
                attribute,
                RangeBounds::above(coerce(attribute, literal)?, true),
            ),
            Operator::In => self
                .ops
                .in_list(attribute, &[coerce(attribute, literal)?]),
        }
    }

    /// Look up an attribute and record the reference.
    fn resolve(
        &self,
        name: &str,
        ctx: &mut ConversionContext,
    ) -> Result<&'a Attribute, ConvertError> {
        let attribute = self
            .registry
            .get_attribute(name)
            .ok_or_else(|| ConvertError::UnknownAttribute(name.to_owned()))?;
        ctx.record_reference(attribute);
        Ok(attribute)
    }
}

/// Operators each attribute type accepts.
const fn supports(attribute_type: AttributeType, operator: Operator) -> bool {
    match attribute_type {
        AttributeType::Keyword => true,
        AttributeType::String | AttributeType::Bool => {
            matches!(operator, Operator::Eq | Operator::NotEq)
        }
        AttributeType::Int | AttributeType::Datetime => !matches!(operator, Operator::StartsWith),
        AttributeType::KeywordList => {
            matches!(operator, Operator::Eq | Operator::NotEq | Operator::In)
        }
    }
}

/// Coerce a literal to the attribute's value type.
fn coerce(attribute: &Attribute, literal: &Literal) -> Result<AttributeValue, ConvertError> {
    let value = match (attribute.attribute_type, literal) {
        (
            AttributeType::String | AttributeType::Keyword | AttributeType::KeywordList,
            Literal::String(s),
        ) => AttributeValue::Text(s.as_str().to_owned()),
        (AttributeType::Int, Literal::Int(n)) => AttributeValue::Int(*n),
        (AttributeType::Bool, Literal::Bool(b)) => AttributeValue::Bool(*b),
        (AttributeType::Datetime, Literal::Int(nanos)) => AttributeValue::Datetime(*nanos),
        (AttributeType::Datetime, Literal::String(s)) => {
            let nanos = parse_datetime(s).ok_or_else(|| mismatch(attribute, literal))?;
            AttributeValue::Datetime(nanos)
        }
        _ => return Err(mismatch(attribute, literal)),
    };
    Ok(value)
}

/// Parse an RFC 3339 timestamp into nanoseconds since the Unix epoch.
fn parse_datetime(text: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()?
        .timestamp_nanos_opt()
}

fn unsupported(attribute: &Attribute, operator: Operator) -> ConvertError {
    ConvertError::UnsupportedOperator {
        attribute: attribute.name.as_str().to_owned(),
        operator,
    }
}

fn mismatch(attribute: &Attribute, literal: &Literal) -> ConvertError {
    ConvertError::TypeMismatch {
        attribute: attribute.name.as_str().to_owned(),
        expected: attribute.attribute_type,
        found: format!("{} {literal}", literal.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::document::{DocumentFilter, DocumentFilterOps};
    use crate::query::parser::parse_query;
    use crate::registry::{AttributeRegistry, DEFAULT_PARTITION_ATTRIBUTE, HISTORY_LENGTH, START_TIME};

    fn registry() -> AttributeRegistry {
        AttributeRegistry::default()
            .with_custom("CustomAttr", AttributeType::Keyword)
            .and_then(|r| r.with_custom("CustomText", AttributeType::String))
            .and_then(|r| r.with_custom("CustomBool", AttributeType::Bool))
            .and_then(|r| r.with_custom("CustomList", AttributeType::KeywordList))
            .expect("registry")
    }

    fn convert(text: &str) -> Result<(DocumentFilter, ConversionContext), ConvertError> {
        let registry = registry();
        let ops = DocumentFilterOps;
        let converter = QueryConverter::new(&registry, &ops);
        let parsed = parse_query(text).expect("parse");
        converter.convert(parsed.filter.as_ref(), QueryKind::Standard)
    }

    #[test]
    fn test_absent_expression_is_match_all() {
        let registry = registry();
        let ops = DocumentFilterOps;
        let converter = QueryConverter::new(&registry, &ops);
        let (filter, ctx) = converter
            .convert(None, QueryKind::Standard)
            .expect("convert");
        assert_eq!(filter, DocumentFilter::MatchAll);
        assert!(!ctx.partition_referenced());
    }

    #[test]
    fn test_equality() {
        let (filter, ctx) = convert("CustomAttr = \"x\"").expect("convert");
        assert_eq!(
            filter,
            DocumentFilter::Term {
                field: "CustomAttr".to_owned(),
                value: AttributeValue::text("x"),
            }
        );
        assert!(!ctx.partition_referenced());
    }

    #[test]
    fn test_null_checks_use_presence() {
        let (filter, _) = convert("CustomAttr IS NULL").expect("convert");
        assert_eq!(filter, DocumentFilter::NotExists("CustomAttr".to_owned()));

        let (filter, _) = convert("CustomAttr IS NOT NULL").expect("convert");
        assert_eq!(filter, DocumentFilter::Exists("CustomAttr".to_owned()));
    }

    #[test]
    fn test_partition_reference_is_tracked_anywhere() {
        let text = format!("CustomAttr = 'x' OR NOT ({DEFAULT_PARTITION_ATTRIBUTE} = 'y')");
        let (_, ctx) = convert(&text).expect("convert");
        assert!(ctx.partition_referenced());

        let text = format!("{DEFAULT_PARTITION_ATTRIBUTE} IS NOT NULL");
        let (_, ctx) = convert(&text).expect("convert");
        assert!(ctx.partition_referenced());
    }

    #[test]
    fn test_ranges() {
        let (filter, _) = convert(&format!("{HISTORY_LENGTH} >= 10")).expect("convert");
        assert_eq!(
            filter,
            DocumentFilter::Range {
                field: HISTORY_LENGTH.to_owned(),
                bounds: RangeBounds::above(AttributeValue::Int(10), true),
            }
        );

        let (filter, _) =
            convert(&format!("{START_TIME} < '2024-01-01T00:00:00Z'")).expect("convert");
        assert_eq!(
            filter,
            DocumentFilter::Range {
                field: START_TIME.to_owned(),
                bounds: RangeBounds::below(
                    AttributeValue::Datetime(1_704_067_200_000_000_000),
                    false
                ),
            }
        );
    }

    #[test]
    fn test_in_list() {
        let (filter, _) = convert("CustomList IN ('a', 'b')").expect("convert");
        assert_eq!(
            filter,
            DocumentFilter::Terms {
                field: "CustomList".to_owned(),
                values: vec![AttributeValue::text("a"), AttributeValue::text("b")],
            }
        );
    }

    #[test]
    fn test_constant_false() {
        let (filter, _) = convert("1 = 2").expect("convert");
        assert_eq!(filter, DocumentFilter::Not(Box::new(DocumentFilter::MatchAll)));
    }

    #[test]
    fn test_unknown_attribute() {
        assert_eq!(
            convert("Missing = 'x'").unwrap_err(),
            ConvertError::UnknownAttribute("Missing".to_owned())
        );
        assert_eq!(
            convert("Missing IS NULL").unwrap_err(),
            ConvertError::UnknownAttribute("Missing".to_owned())
        );
    }

    #[test]
    fn test_unsupported_operator() {
        assert_eq!(
            convert("CustomBool > true").unwrap_err(),
            ConvertError::UnsupportedOperator {
                attribute: "CustomBool".to_owned(),
                operator: Operator::Gt,
            }
        );
        assert!(matches!(
            convert("CustomText STARTS_WITH 'a'"),
            Err(ConvertError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            convert("CustomList < 'a'"),
            Err(ConvertError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let error = convert(&format!("{HISTORY_LENGTH} = 'many'")).unwrap_err();
        assert_eq!(
            error,
            ConvertError::TypeMismatch {
                attribute: HISTORY_LENGTH.to_owned(),
                expected: AttributeType::Int,
                found: "string \"many\"".to_owned(),
            }
        );
        assert!(matches!(
            convert(&format!("{START_TIME} > 'yesterday'")),
            Err(ConvertError::TypeMismatch { .. })
        ));
        assert!(matches!(
            convert("CustomAttr IN ('a', 2)"),
            Err(ConvertError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_convert_sort() {
        let registry = registry();
        let ops = DocumentFilterOps;
        let converter = QueryConverter::new(&registry, &ops);

        assert_eq!(converter.convert_sort(&[]).expect("sort"), SortSpec::default());
        let spec = converter
            .convert_sort(&[SortKey::asc("CustomAttr")])
            .expect("sort");
        assert_eq!(spec.keys(), &[SortKey::asc("CustomAttr")]);

        assert!(matches!(
            converter.convert_sort(&[SortKey::asc("CustomList")]),
            Err(ConvertError::InvalidSort(_))
        ));
        assert!(matches!(
            converter.convert_sort(&[SortKey::asc("Nope")]),
            Err(ConvertError::UnknownAttribute(_))
        ));
        assert!(matches!(
            converter.convert_sort(&[SortKey::asc(START_TIME), SortKey::desc(START_TIME)]),
            Err(ConvertError::InvalidSort(_))
        ));
    }
}
