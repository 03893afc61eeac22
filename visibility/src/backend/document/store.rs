//! In-memory document store.
//!
//! Keeps executions keyed by run id and evaluates `DocumentFilter` trees
//! against them. Supports two kinds of fault injection for tests: an
//! artificial per-call latency and a switch that makes every call fail as
//! unavailable.
//!
//! # Invariants
//!
//! - No lock is held across an await point
//! - Pages are taken from one consistent snapshot of the records

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::token::{PageCursor, SortPosition};
use super::{DocumentFilter, DocumentFilterOps};
use crate::backend::{CancelSignal, StoreError, StoreListRequest, StorePage, VisibilityStore};
use crate::types::ExecutionRecord;

/// Document store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, ExecutionRecord>>,
    ops: DocumentFilterOps,
    unavailable: AtomicBool,
    latency: Option<Duration>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every list and count call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every subsequent call fail with `BackendUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert or replace an execution.
    ///
    /// # Errors
    ///
    /// Returns `LockPoisoned` if a writer panicked while holding the lock.
    pub fn upsert(&self, record: ExecutionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        tracing::debug!(run_id = record.run_id(), "upserting execution");
        records.insert(record.run_id().to_owned(), record);
        Ok(())
    }

    /// Delete an execution, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `LockPoisoned` if a writer panicked while holding the lock.
    pub fn delete(&self, run_id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.remove(run_id).is_some())
    }

    /// Number of stored executions.
    ///
    /// # Errors
    ///
    /// Returns `LockPoisoned` if a writer panicked while holding the lock.
    pub fn record_count(&self) -> Result<usize, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.len())
    }

    /// Apply injected latency and availability faults.
    async fn simulate_backend(&self) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::BackendUnavailable(
                "memory store is marked unavailable".to_owned(),
            ));
        }
        Ok(())
    }

    fn scan(&self, request: &StoreListRequest<DocumentFilter>) -> Result<StorePage, StoreError> {
        let cursor = request
            .page_token
            .as_deref()
            .map(|token| PageCursor::decode(token, &request.sort))
            .transpose()?;

        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut matched: Vec<(SortPosition, &ExecutionRecord)> = records
            .values()
            .filter(|record| request.filter.matches(record))
            .map(|record| (SortPosition::of(record, &request.sort), record))
            .collect();
        matched.sort_by(|(a, _), (b, _)| a.compare(b, &request.sort));

        let start = cursor.as_ref().map_or(0, |cursor| {
            matched.partition_point(|(position, _)| {
                position.compare(cursor.position(), &request.sort).is_le()
            })
        });
        let page_size = request.page_size.max(1);
        let end = matched.len().min(start.saturating_add(page_size));

        let page: Vec<ExecutionRecord> = matched[start..end]
            .iter()
            .map(|(_, record)| (*record).clone())
            .collect();
        let next_page_token = if end < matched.len() {
            page.last()
                .map(|last| PageCursor::at(last, &request.sort).encode())
        } else {
            None
        };

        tracing::debug!(
            matched = matched.len(),
            returned = page.len(),
            has_more = next_page_token.is_some(),
            "scanned memory store"
        );
        Ok(StorePage {
            records: page,
            next_page_token,
        })
    }

    fn count_matching(&self, filter: &DocumentFilter) -> Result<u64, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        let count = records.values().filter(|record| filter.matches(record)).count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}

impl VisibilityStore for MemoryStore {
    type Ops = DocumentFilterOps;

    fn filter_ops(&self) -> &DocumentFilterOps {
        &self.ops
    }

    fn list(
        &self,
        request: StoreListRequest<DocumentFilter>,
        cancel: CancelSignal,
    ) -> BoxFuture<'_, Result<StorePage, StoreError>> {
        async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(StoreError::Cancelled),
                page = async {
                    self.simulate_backend().await?;
                    self.scan(&request)
                } => page,
            }
        }
        .boxed()
    }

    fn count(
        &self,
        filter: DocumentFilter,
        cancel: CancelSignal,
    ) -> BoxFuture<'_, Result<u64, StoreError>> {
        async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(StoreError::Cancelled),
                count = async {
                    self.simulate_backend().await?;
                    self.count_matching(&filter)
                } => count,
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{HISTORY_LENGTH, START_TIME};
    use crate::types::{AttributeValue, SortKey, SortSpec};

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (run_id, start) in [("r1", 30), ("r2", 10), ("r3", 20), ("r4", 20)] {
            store
                .upsert(
                    ExecutionRecord::new(run_id).with(START_TIME, AttributeValue::Datetime(start)),
                )
                .unwrap();
        }
        store
            .upsert(ExecutionRecord::new("r5").with(HISTORY_LENGTH, AttributeValue::Int(3)))
            .unwrap();
        store
    }

    fn request(page_size: usize, page_token: Option<Vec<u8>>) -> StoreListRequest<DocumentFilter> {
        StoreListRequest {
            filter: DocumentFilter::MatchAll,
            sort: SortSpec::default(),
            page_size,
            page_token,
        }
    }

    fn run_ids(page: &StorePage) -> Vec<&str> {
        page.records.iter().map(ExecutionRecord::run_id).collect()
    }

    #[tokio::test]
    async fn test_default_sort_with_missing_last_and_tie_break() {
        let store = seeded();
        let page = store
            .list(request(10, None), CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(run_ids(&page), vec!["r1", "r3", "r4", "r2", "r5"]);
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_pages_cover_everything_once() {
        let store = seeded();
        let first = store
            .list(request(2, None), CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(run_ids(&first), vec!["r1", "r3"]);

        let second = store
            .list(request(2, first.next_page_token.clone()), CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(run_ids(&second), vec!["r4", "r2"]);

        let third = store
            .list(request(2, second.next_page_token.clone()), CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(run_ids(&third), vec!["r5"]);
        assert!(third.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_exact_fit_has_no_next_token() {
        let store = seeded();
        let page = store
            .list(request(5, None), CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(page.records.len(), 5);
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_cursor_survives_deleted_anchor() {
        let store = seeded();
        let first = store
            .list(request(2, None), CancelSignal::never())
            .await
            .unwrap();
        assert!(store.delete("r3").unwrap());
        let second = store
            .list(request(2, first.next_page_token), CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(run_ids(&second), vec!["r4", "r2"]);
    }

    #[tokio::test]
    async fn test_ascending_sort() {
        let store = seeded();
        let mut req = request(10, None);
        req.sort = SortSpec::from_keys(vec![SortKey::asc(START_TIME)]);
        let page = store.list(req, CancelSignal::never()).await.unwrap();
        assert_eq!(run_ids(&page), vec!["r2", "r3", "r4", "r1", "r5"]);
    }

    #[tokio::test]
    async fn test_filter_and_count() {
        let store = seeded();
        let filter = DocumentFilter::Exists(START_TIME.to_owned());
        let count = store
            .count(filter.clone(), CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(count, 4);

        let mut req = request(10, None);
        req.filter = DocumentFilter::NotExists(START_TIME.to_owned());
        let page = store.list(req, CancelSignal::never()).await.unwrap();
        assert_eq!(run_ids(&page), vec!["r5"]);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = seeded();
        store.set_unavailable(true);
        assert!(matches!(
            store.list(request(1, None), CancelSignal::never()).await,
            Err(StoreError::BackendUnavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.list(request(1, None), CancelSignal::never()).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_slow_call() {
        let store = seeded().with_latency(Duration::from_secs(30));
        let (handle, signal) = CancelSignal::pair();
        let call = store.list(request(1, None), signal);
        handle.cancel();
        assert_eq!(call.await.unwrap_err(), StoreError::Cancelled);
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let store = seeded();
        assert!(matches!(
            store
                .list(request(1, Some(vec![1, 2, 3, 4, 5, 6])), CancelSignal::never())
                .await,
            Err(StoreError::InvalidPageToken(_))
        ));
    }
}
