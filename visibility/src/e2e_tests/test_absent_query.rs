//! Test that an absent query is scoped exactly like an always-true one.

use crate::e2e_tests::helpers::*;
use crate::query::QueryKind;

fn seeded() -> TestService {
    let test = TestService::new();
    test.seed([
        user_execution("user-1"),
        user_execution("user-2"),
        system_execution("system-1", "scheduler"),
        system_execution("system-2", "chasm-archetype-1"),
    ]);
    test
}

#[test]
fn test_absent_query_is_scoped() {
    let test = seeded();
    let ids = test.query(None, QueryKind::Standard).expect("query");
    assert_eq!(sorted(ids), vec!["user-1", "user-2"]);
}

#[test]
fn test_absent_blank_and_true_queries_agree() {
    let test = seeded();
    let absent = sorted(test.query(None, QueryKind::Standard).expect("query"));
    let blank = sorted(test.query(Some("  "), QueryKind::Standard).expect("query"));
    let empty = sorted(test.query(Some(""), QueryKind::Standard).expect("query"));
    let always_true = sorted(test.query(Some("1=1"), QueryKind::Standard).expect("query"));

    assert_eq!(absent, blank);
    assert_eq!(absent, empty);
    assert_eq!(absent, always_true);
}

#[test]
fn test_always_false_query_is_empty() {
    let test = seeded();
    let ids = test.query(Some("1 = 2"), QueryKind::Standard).expect("query");
    assert!(ids.is_empty());
}
