//! Common helpers for end-to-end tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::backend::document::{DocumentFilter, DocumentFilterOps, MemoryStore};
use crate::backend::{CancelSignal, StoreError, StoreListRequest, StorePage, VisibilityStore};
use crate::listing::{ListError, ListRequest, ListResponse, ListingOptions, ListingService};
use crate::query::QueryKind;
use crate::registry::{AttributeRegistry, DEFAULT_PARTITION_ATTRIBUTE, START_TIME};
use crate::types::{AttributeType, AttributeValue, ExecutionRecord};

pub const PARTITION: &str = DEFAULT_PARTITION_ATTRIBUTE;

/// Registry used by every scenario.
pub fn test_registry() -> AttributeRegistry {
    #[allow(clippy::expect_used)]
    let registry = AttributeRegistry::default()
        .with_custom("CustomAttr", AttributeType::Keyword)
        .and_then(|r| r.with_custom("CustomInt", AttributeType::Int))
        .and_then(|r| r.with_custom("CustomText", AttributeType::String))
        .and_then(|r| r.with_custom("CustomList", AttributeType::KeywordList))
        .expect("Failed to build test registry");
    registry
}

/// A listing service on a private runtime.
pub struct TestService<S: VisibilityStore = MemoryStore> {
    pub service: ListingService<S>,
    pub runtime: tokio::runtime::Runtime,
}

impl TestService<MemoryStore> {
    /// Create a service over an empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), ListingOptions::default())
    }

    /// Insert records into the memory store.
    pub fn seed(&self, records: impl IntoIterator<Item = ExecutionRecord>) {
        for record in records {
            #[allow(clippy::expect_used)]
            self.service
                .store()
                .upsert(record)
                .expect("Failed to seed record");
        }
    }
}

impl<S: VisibilityStore> TestService<S> {
    /// Create a service over `store`.
    #[must_use]
    pub fn with_store(store: S, options: ListingOptions) -> Self {
        let service = ListingService::new(Arc::new(store), Arc::new(test_registry()), options);

        #[allow(clippy::expect_used)]
        let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");

        Self { service, runtime }
    }

    /// List one page.
    pub fn list(&self, request: ListRequest) -> Result<ListResponse, ListError> {
        self.runtime.block_on(
            self.service
                .list_executions(request, CancelSignal::never()),
        )
    }

    /// List the first page for `query` with a large page size.
    pub fn query(&self, query: Option<&str>, kind: QueryKind) -> Result<Vec<String>, ListError> {
        let mut request = ListRequest::new(kind, 1000);
        request.query = query.map(str::to_owned);
        self.list(request).map(|response| run_ids(&response))
    }

    /// Follow page tokens until the last page, collecting run ids in order.
    pub fn list_all(
        &self,
        query: Option<&str>,
        kind: &QueryKind,
        page_size: usize,
    ) -> Result<Vec<String>, ListError> {
        let mut collected = Vec::new();
        let mut token = None;
        loop {
            let mut request = ListRequest::new(kind.clone(), page_size).with_page_token(token);
            request.query = query.map(str::to_owned);
            let response = self.list(request)?;
            assert!(response.records.len() <= page_size, "page exceeds page size");
            collected.extend(run_ids(&response));
            match response.next_page_token {
                Some(next) => token = Some(next),
                None => return Ok(collected),
            }
        }
    }

    /// Count matching executions.
    pub fn count(&self, query: Option<&str>, kind: QueryKind) -> Result<u64, ListError> {
        self.runtime.block_on(
            self.service
                .count_executions(query, kind, CancelSignal::never()),
        )
    }
}

pub fn run_ids(response: &ListResponse) -> Vec<String> {
    response
        .records
        .iter()
        .map(|record| record.run_id().to_owned())
        .collect()
}

/// An ordinary user execution.
pub fn user_execution(run_id: &str) -> ExecutionRecord {
    ExecutionRecord::new(run_id)
}

/// A system execution owned by `archetype`.
pub fn system_execution(run_id: &str, archetype: &str) -> ExecutionRecord {
    ExecutionRecord::new(run_id).with(PARTITION, AttributeValue::text(archetype))
}

/// Set the start time, in seconds.
pub fn started_at(record: ExecutionRecord, seconds: i64) -> ExecutionRecord {
    record.with(START_TIME, AttributeValue::Datetime(seconds * 1_000_000_000))
}

pub fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

/// Store wrapper that counts backend invocations.
pub struct SpyStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl SpyStore {
    #[must_use]
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisibilityStore for SpyStore {
    type Ops = DocumentFilterOps;

    fn filter_ops(&self) -> &DocumentFilterOps {
        self.inner.filter_ops()
    }

    fn list(
        &self,
        request: StoreListRequest<DocumentFilter>,
        cancel: CancelSignal,
    ) -> BoxFuture<'_, Result<StorePage, StoreError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list(request, cancel)
    }

    fn count(
        &self,
        filter: DocumentFilter,
        cancel: CancelSignal,
    ) -> BoxFuture<'_, Result<u64, StoreError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count(filter, cancel)
    }
}

/// Options with a short store deadline.
pub fn short_timeout(timeout: Duration) -> ListingOptions {
    ListingOptions {
        list_timeout: timeout,
        ..ListingOptions::default()
    }
}
