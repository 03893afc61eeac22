//! Listing orchestrator.
//!
//! Entry point for listing and counting executions. Every request goes
//! through the same fixed pipeline:
//!
//! ```text
//! query text -> parse -> convert -> scope -> store
//! ```
//!
//! # Invariants
//!
//! - Conversion and scoping run for every request, including requests with no
//!   query text; there is no path from a request to the store that skips
//!   scoping
//! - Query-construction errors are returned before the store is called
//! - A cancelled or timed-out request returns an error and never a partial page

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{CancelSignal, FilterOf, StoreError, StoreListRequest, VisibilityStore};
use crate::query::{
    ConvertError, FilterParser, ParseError, ParsedQuery, QueryConverter, QueryKind, QueryParser,
    ScopingPolicy,
};
use crate::registry::AttributeLookup;
use crate::types::{ExecutionRecord, SortSpec};

/// A request to list executions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Query text; `None` or blank means no filter.
    pub query: Option<String>,
    pub kind: QueryKind,
    /// Must be greater than zero.
    pub page_size: usize,
    /// Token from the previous response.
    pub page_token: Option<Vec<u8>>,
}

impl ListRequest {
    /// A first-page request of `kind` with no filter.
    #[must_use]
    pub const fn new(kind: QueryKind, page_size: usize) -> Self {
        Self {
            query: None,
            kind,
            page_size,
            page_token: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn with_page_token(mut self, page_token: Option<Vec<u8>>) -> Self {
        self.page_token = page_token;
        self
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    pub records: Vec<ExecutionRecord>,
    /// Absent on the last page.
    pub next_page_token: Option<Vec<u8>>,
}

/// Limits applied by the listing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingOptions {
    /// Requests above this size are clamped.
    pub max_page_size: usize,
    /// Deadline for each store call.
    pub list_timeout: Duration,
}

impl ListingOptions {
    pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;
    pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(10);
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            max_page_size: Self::DEFAULT_MAX_PAGE_SIZE,
            list_timeout: Self::DEFAULT_LIST_TIMEOUT,
        }
    }
}

/// Errors returned by the listing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    /// The query text could not be parsed.
    InvalidQuery(ParseError),
    /// The requested page size was zero.
    InvalidPageSize(usize),
    /// The query could not be converted for the store.
    Convert(ConvertError),
    /// The store failed.
    Store(StoreError),
    /// The store did not answer within the deadline.
    Timeout(Duration),
}

impl ListError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuery(_) => "invalid_query",
            Self::InvalidPageSize(_) => "invalid_page_size",
            Self::Convert(ConvertError::UnknownAttribute(_)) => "unknown_attribute",
            Self::Convert(ConvertError::UnsupportedOperator { .. }) => "unsupported_operator",
            Self::Convert(ConvertError::TypeMismatch { .. }) => "type_mismatch",
            Self::Convert(ConvertError::InvalidSort(_)) => "invalid_sort",
            Self::Store(StoreError::InvalidPageToken(_)) => "invalid_page_token",
            Self::Store(StoreError::BackendUnavailable(_)) => "backend_unavailable",
            Self::Store(StoreError::Cancelled) => "cancelled",
            Self::Store(StoreError::LockPoisoned) => "internal",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::BackendUnavailable(_)) | Self::Timeout(_)
        )
    }

    /// Whether the error was caused by the request itself.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuery(_)
                | Self::InvalidPageSize(_)
                | Self::Convert(_)
                | Self::Store(StoreError::InvalidPageToken(_))
        )
    }
}

impl std::fmt::Display for ListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery(e) => write!(f, "invalid query: {e}"),
            Self::InvalidPageSize(size) => {
                write!(f, "invalid page size {size}: must be greater than zero")
            }
            Self::Convert(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
            Self::Timeout(after) => {
                write!(f, "visibility store did not respond within {}ms", after.as_millis())
            }
        }
    }
}

impl std::error::Error for ListError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidQuery(e) => Some(e),
            Self::Convert(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::InvalidPageSize(_) | Self::Timeout(_) => None,
        }
    }
}

impl From<ParseError> for ListError {
    fn from(e: ParseError) -> Self {
        Self::InvalidQuery(e)
    }
}

impl From<ConvertError> for ListError {
    fn from(e: ConvertError) -> Self {
        Self::Convert(e)
    }
}

impl From<StoreError> for ListError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Lists and counts executions against one store.
pub struct ListingService<S: VisibilityStore> {
    store: Arc<S>,
    registry: Arc<dyn AttributeLookup>,
    parser: Box<dyn QueryParser>,
    options: ListingOptions,
}

impl<S: VisibilityStore> ListingService<S> {
    /// Create a service using the built-in query parser.
    #[must_use]
    pub fn new(store: Arc<S>, registry: Arc<dyn AttributeLookup>, options: ListingOptions) -> Self {
        Self {
            store,
            registry,
            parser: Box::new(FilterParser),
            options,
        }
    }

    /// Replace the query parser.
    #[must_use]
    pub fn with_parser(mut self, parser: impl QueryParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn registry(&self) -> &dyn AttributeLookup {
        self.registry.as_ref()
    }

    #[must_use]
    pub const fn options(&self) -> &ListingOptions {
        &self.options
    }

    /// List one page of executions.
    ///
    /// # Errors
    ///
    /// - `InvalidPageSize` if `request.page_size` is zero
    /// - `InvalidQuery`, `Convert` for query-construction errors, before any
    ///   store call
    /// - `Store` and `Timeout` for failures of the store call
    pub async fn list_executions(
        &self,
        request: ListRequest,
        cancel: CancelSignal,
    ) -> Result<ListResponse, ListError> {
        if request.page_size == 0 {
            tracing::warn!("rejected list request with page size 0");
            return Err(ListError::InvalidPageSize(0));
        }
        let page_size = request.page_size.min(self.options.max_page_size);

        let (filter, sort) = self
            .compile(request.query.as_deref(), request.kind)
            .inspect_err(|e| tracing::warn!(code = e.code(), "rejected list request: {e}"))?;

        let store_request = StoreListRequest {
            filter,
            sort,
            page_size,
            page_token: request.page_token,
        };
        let page = self
            .bounded(self.store.list(store_request, cancel))
            .await?;

        tracing::debug!(
            returned = page.records.len(),
            has_more = page.next_page_token.is_some(),
            "listed executions"
        );
        Ok(ListResponse {
            records: page.records,
            next_page_token: page.next_page_token,
        })
    }

    /// Count executions matching `query`, scoped like a listing.
    ///
    /// # Errors
    ///
    /// Same as `list_executions`, minus page errors.
    pub async fn count_executions(
        &self,
        query: Option<&str>,
        kind: QueryKind,
        cancel: CancelSignal,
    ) -> Result<u64, ListError> {
        let (filter, _) = self
            .compile(query, kind)
            .inspect_err(|e| tracing::warn!(code = e.code(), "rejected count request: {e}"))?;
        let count = self.bounded(self.store.count(filter, cancel)).await?;
        tracing::debug!(count, "counted executions");
        Ok(count)
    }

    /// Parse, convert and scope a query.
    ///
    /// Runs in full for every request; blank text parses to "no filter" and
    /// still goes through conversion and scoping.
    fn compile(
        &self,
        query: Option<&str>,
        kind: QueryKind,
    ) -> Result<(FilterOf<S>, SortSpec), ListError> {
        let parsed = match query.map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => self.parser.parse(text)?,
            None => ParsedQuery::default(),
        };

        let ops = self.store.filter_ops();
        let converter = QueryConverter::new(self.registry.as_ref(), ops);
        let (filter, ctx) = converter.convert(parsed.filter.as_ref(), kind)?;
        let sort = converter.convert_sort(&parsed.order_by)?;
        let filter =
            ScopingPolicy::new(ops, self.registry.partition_attribute()).apply(filter, &ctx)?;
        Ok((filter, sort))
    }

    /// Bound a store call by the configured deadline.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ListError> {
        let deadline = self.options.list_timeout;
        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result.map_err(|e| {
                tracing::warn!("store call failed: {e}");
                ListError::Store(e)
            }),
            Err(_) => {
                tracing::warn!(timeout_ms = deadline.as_millis(), "store call timed out");
                Err(ListError::Timeout(deadline))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::document::MemoryStore;
    use crate::registry::AttributeRegistry;
    use crate::types::AttributeType;

    fn service() -> ListingService<MemoryStore> {
        let registry = AttributeRegistry::default()
            .with_custom("CustomAttr", AttributeType::Keyword)
            .expect("registry");
        ListingService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(registry),
            ListingOptions::default(),
        )
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ListError::Convert(ConvertError::UnknownAttribute("x".to_owned())).code(),
            "unknown_attribute"
        );
        assert_eq!(ListError::Store(StoreError::Cancelled).code(), "cancelled");
        assert_eq!(ListError::Timeout(Duration::from_secs(1)).code(), "timeout");
        assert!(ListError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ListError::Store(StoreError::BackendUnavailable("down".to_owned())).is_retryable());
        assert!(!ListError::Store(StoreError::Cancelled).is_retryable());
        assert!(!ListError::InvalidPageSize(0).is_retryable());
    }

    #[test]
    fn test_blank_query_compiles_like_absent() {
        let service = service();
        let absent = service.compile(None, QueryKind::Standard).expect("compile");
        let blank = service
            .compile(Some("   "), QueryKind::Standard)
            .expect("compile");
        assert_eq!(absent, blank);
    }

    #[test]
    fn test_order_by_reaches_sort() {
        let service = service();
        let (_, sort) = service
            .compile(Some("ORDER BY CustomAttr ASC"), QueryKind::Standard)
            .expect("compile");
        assert_eq!(sort.attribute_names().collect::<Vec<_>>(), vec!["CustomAttr"]);
    }

    #[tokio::test]
    async fn test_zero_page_size_is_rejected() {
        let service = service();
        let result = service
            .list_executions(ListRequest::new(QueryKind::Standard, 0), CancelSignal::never())
            .await;
        assert_eq!(result.unwrap_err(), ListError::InvalidPageSize(0));
    }

    #[tokio::test]
    async fn test_parse_error_is_invalid_query() {
        let service = service();
        let result = service
            .list_executions(
                ListRequest::new(QueryKind::Standard, 10).with_query("CustomAttr = "),
                CancelSignal::never(),
            )
            .await;
        assert!(matches!(result, Err(ListError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_page_size_is_clamped() {
        let registry = AttributeRegistry::default();
        let store = Arc::new(MemoryStore::new());
        for i in 0..5 {
            store
                .upsert(ExecutionRecord::new(format!("run-{i}")))
                .expect("upsert");
        }
        let service = ListingService::new(
            store,
            Arc::new(registry),
            ListingOptions {
                max_page_size: 2,
                ..ListingOptions::default()
            },
        );
        let response = service
            .list_executions(ListRequest::new(QueryKind::Standard, 50), CancelSignal::never())
            .await
            .expect("list");
        assert_eq!(response.records.len(), 2);
        assert!(response.next_page_token.is_some());
    }
}
