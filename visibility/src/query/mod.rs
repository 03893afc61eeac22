//! Visibility query pipeline.
//!
//! This module turns query text into a scoped backend filter:
//! - `parser` - query text to `ParsedQuery` (swappable via `QueryParser`)
//! - `converter` - expression tree to backend filter, via `FilterOps`
//! - `scoping` - appends the implicit partition predicate
//!
//! # Example
//!
//! ```ignore
//! use visibility::query::{QueryConverter, QueryKind, ScopingPolicy, parse_query};
//!
//! let parsed = parse_query("CustomAttr = 'x'")?;
//! let converter = QueryConverter::new(&registry, &ops);
//! let (filter, ctx) = converter.convert(parsed.filter.as_ref(), QueryKind::Standard)?;
//! let filter = ScopingPolicy::new(&ops, registry.partition_attribute()).apply(filter, &ctx)?;
//! ```

pub mod ast;
pub mod context;
pub mod converter;
pub mod error;
mod lexer;
pub mod ops;
pub mod parser;
pub mod scoping;

pub use ast::{Expr, Literal, Operand, Operator, ParsedQuery};
pub use context::{ConversionContext, QueryKind};
pub use converter::QueryConverter;
pub use error::{ConvertError, ParseError};
pub use ops::{FilterOps, RangeBounds};
pub use parser::{FilterParser, QueryParser, parse_query};
pub use scoping::{ScopingDecision, ScopingPolicy};
