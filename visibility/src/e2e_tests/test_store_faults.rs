//! Test store failures surfacing through the listing service.

use std::time::Duration;

use crate::backend::CancelSignal;
use crate::backend::document::MemoryStore;
use crate::e2e_tests::helpers::*;
use crate::listing::{ListError, ListRequest, ListingOptions};
use crate::query::QueryKind;

#[test]
fn test_slow_store_times_out() {
    let store = MemoryStore::new().with_latency(Duration::from_millis(500));
    let test = TestService::with_store(store, short_timeout(Duration::from_millis(20)));

    let error = test
        .query(None, QueryKind::Standard)
        .expect_err("store is slower than the deadline");
    assert!(matches!(error, ListError::Timeout(_)));
    assert!(error.is_retryable());

    let error = test
        .count(None, QueryKind::Standard)
        .expect_err("store is slower than the deadline");
    assert!(matches!(error, ListError::Timeout(_)));
}

#[test]
fn test_cancellation_stops_call() {
    let store = MemoryStore::new().with_latency(Duration::from_secs(5));
    let test = TestService::with_store(store, ListingOptions::default());
    let (handle, signal) = CancelSignal::pair();

    let result = test.runtime.block_on(async {
        let (result, ()) = tokio::join!(
            test.service
                .list_executions(ListRequest::new(QueryKind::Standard, 10), signal),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                handle.cancel();
            },
        );
        result
    });

    let error = result.expect_err("cancelled");
    assert_eq!(error.code(), "cancelled");
    assert!(!error.is_retryable());
}

#[test]
fn test_unavailable_store() {
    let test = TestService::new();
    test.seed([user_execution("a")]);
    test.service.store().set_unavailable(true);

    let error = test
        .query(None, QueryKind::Standard)
        .expect_err("store is down");
    assert_eq!(error.code(), "backend_unavailable");
    assert!(error.is_retryable());

    test.service.store().set_unavailable(false);
    let ids = test.query(None, QueryKind::Standard).expect("query");
    assert_eq!(ids, vec!["a"]);
}

#[test]
fn test_corrupt_page_token() {
    let test = TestService::new();
    test.seed([user_execution("a"), user_execution("b")]);

    let first = test
        .list(ListRequest::new(QueryKind::Standard, 1))
        .expect("list");
    let mut token = first.next_page_token.expect("more pages");
    let last = token.len() - 1;
    token[last] ^= 0xff;

    for token in [token, Vec::new(), b"garbage".to_vec()] {
        let error = test
            .list(ListRequest::new(QueryKind::Standard, 1).with_page_token(Some(token)))
            .expect_err("corrupt token");
        assert_eq!(error.code(), "invalid_page_token");
    }
}
