//! Visibility store adapters.
//!
//! A `VisibilityStore` executes a fully scoped native filter and returns one
//! page of execution records. Stores apply the filter exactly as given: they
//! never add or remove scoping predicates of their own.
//!
//! # Adapters
//!
//! - `document` - sparse-document store; unset attributes are absent keys
//! - `sql` - relational filter rendering; unset attributes are NULL columns
//!
//! # Pagination
//!
//! Pagination is cursor-based on the sort key. A page token encodes the last
//! row returned and is only meaningful to the adapter that produced it.

mod cancel;
pub mod document;
pub mod sql;

pub use cancel::{CancelHandle, CancelSignal};

use futures::future::BoxFuture;

use crate::query::FilterOps;
use crate::types::{ExecutionRecord, SortSpec};

/// The native filter type of a store.
pub type FilterOf<S> = <<S as VisibilityStore>::Ops as FilterOps>::Filter;

/// One page request against a store.
#[derive(Debug)]
pub struct StoreListRequest<F> {
    /// Scoped native filter.
    pub filter: F,
    /// Sort order of the listing.
    pub sort: SortSpec,
    /// Maximum number of records to return. Always at least 1.
    pub page_size: usize,
    /// Token from the previous page, if any.
    pub page_token: Option<Vec<u8>>,
}

/// One page of results.
#[derive(Debug, Default)]
pub struct StorePage {
    pub records: Vec<ExecutionRecord>,
    /// Absent when this is the last page.
    pub next_page_token: Option<Vec<u8>>,
}

/// A backend able to list executions.
///
/// Implementations must be safe to call concurrently; connection and pool
/// ownership belong to the implementation.
pub trait VisibilityStore: Send + Sync {
    /// The filter primitives of this backend.
    type Ops: FilterOps<Filter: Send + 'static> + Send + Sync;

    /// Filter primitives used by the converter and the scoping policy.
    fn filter_ops(&self) -> &Self::Ops;

    /// List one page of executions matching `request.filter`.
    ///
    /// When `cancel` fires before the page is complete the call returns
    /// `StoreError::Cancelled` and no records.
    fn list(
        &self,
        request: StoreListRequest<FilterOf<Self>>,
        cancel: CancelSignal,
    ) -> BoxFuture<'_, Result<StorePage, StoreError>>;

    /// Count executions matching `filter`.
    fn count(
        &self,
        filter: FilterOf<Self>,
        cancel: CancelSignal,
    ) -> BoxFuture<'_, Result<u64, StoreError>>;
}

/// Errors reported by stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or refused the request. Transient.
    BackendUnavailable(String),
    /// The caller cancelled the request.
    Cancelled,
    /// The page token is corrupt or belongs to a different listing.
    InvalidPageToken(String),
    /// An internal lock was poisoned by a panicking thread.
    LockPoisoned,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackendUnavailable(detail) => write!(f, "visibility store unavailable: {detail}"),
            Self::Cancelled => write!(f, "request cancelled"),
            Self::InvalidPageToken(detail) => write!(f, "invalid page token: {detail}"),
            Self::LockPoisoned => write!(f, "visibility store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}
