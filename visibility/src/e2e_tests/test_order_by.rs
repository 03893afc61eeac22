//! Test ORDER BY handling through the listing service.

use crate::e2e_tests::helpers::*;
use crate::listing::{ListError, ListRequest};
use crate::query::{ConvertError, QueryKind};
use crate::types::AttributeValue;

fn seeded() -> TestService {
    let test = TestService::new();
    test.seed([
        started_at(user_execution("a"), 3).with("CustomInt", AttributeValue::Int(2)),
        started_at(user_execution("b"), 1).with("CustomInt", AttributeValue::Int(1)),
        started_at(user_execution("c"), 2),
        system_execution("system", "scheduler").with("CustomInt", AttributeValue::Int(0)),
    ]);
    test
}

#[test]
fn test_default_order_is_start_time_descending() {
    let test = seeded();
    let ids = test.query(None, QueryKind::Standard).expect("query");
    assert_eq!(ids, vec!["a", "c", "b"]);
}

#[test]
fn test_explicit_order() {
    let test = seeded();

    let ids = test
        .query(Some("ORDER BY StartTime ASC"), QueryKind::Standard)
        .expect("query");
    assert_eq!(ids, vec!["b", "c", "a"]);

    // Executions without the attribute come last in either direction
    let ids = test
        .query(Some("ORDER BY CustomInt"), QueryKind::Standard)
        .expect("query");
    assert_eq!(ids, vec!["b", "a", "c"]);

    let ids = test
        .query(Some("ORDER BY CustomInt DESC"), QueryKind::Standard)
        .expect("query");
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn test_order_with_filter_pages() {
    let test = seeded();
    let ids = test
        .list_all(
            Some("StartTime >= 0 ORDER BY StartTime ASC"),
            &QueryKind::Standard,
            1,
        )
        .expect("list");
    assert_eq!(ids, vec!["b", "c", "a"]);
}

#[test]
fn test_invalid_sort_is_rejected() {
    let test = seeded();

    let result = test.query(Some("ORDER BY CustomList"), QueryKind::Standard);
    assert!(matches!(
        result,
        Err(ListError::Convert(ConvertError::InvalidSort(_)))
    ));

    let result = test.query(Some("ORDER BY StartTime, StartTime DESC"), QueryKind::Standard);
    assert!(matches!(
        result,
        Err(ListError::Convert(ConvertError::InvalidSort(_)))
    ));

    let result = test.query(Some("ORDER BY Missing"), QueryKind::Standard);
    assert!(matches!(
        result,
        Err(ListError::Convert(ConvertError::UnknownAttribute(name))) if name == "Missing"
    ));
}

#[test]
fn test_token_from_other_order_is_rejected() {
    let test = seeded();
    let first = test
        .list(ListRequest::new(QueryKind::Standard, 1))
        .expect("list");
    assert!(first.next_page_token.is_some());

    let result = test.list(
        ListRequest::new(QueryKind::Standard, 1)
            .with_query("ORDER BY StartTime ASC")
            .with_page_token(first.next_page_token),
    );
    let error = result.expect_err("token bound to another order");
    assert_eq!(error.code(), "invalid_page_token");
    assert!(error.is_client_error());
}
