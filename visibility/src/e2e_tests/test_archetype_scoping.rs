//! Test that scoped queries only see their own archetype.

use crate::e2e_tests::helpers::*;
use crate::query::QueryKind;
use crate::types::AttributeValue;

fn seed(test: &TestService) {
    test.seed([
        system_execution("one-a", "chasm-archetype-1"),
        system_execution("one-b", "chasm-archetype-1").with("CustomInt", AttributeValue::Int(5)),
        system_execution("two", "chasm-archetype-2").with("CustomInt", AttributeValue::Int(5)),
        user_execution("user").with("CustomInt", AttributeValue::Int(5)),
    ]);
}

#[test]
fn test_scoped_query_restricts_to_archetype() {
    let test = TestService::new();
    seed(&test);

    let ids = test
        .query(None, QueryKind::scoped("chasm-archetype-1"))
        .expect("query");
    assert_eq!(sorted(ids), vec!["one-a", "one-b"]);
}

#[test]
fn test_scoped_query_with_filter() {
    let test = TestService::new();
    seed(&test);

    let ids = test
        .query(Some("CustomInt = 5"), QueryKind::scoped("chasm-archetype-1"))
        .expect("query");
    assert_eq!(ids, vec!["one-b"]);

    let ids = test
        .query(Some("CustomInt = 5"), QueryKind::scoped("unknown-archetype"))
        .expect("query");
    assert!(ids.is_empty());
}
