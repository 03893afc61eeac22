//! Test that an explicit partition predicate is never overridden.

use crate::e2e_tests::helpers::*;
use crate::query::QueryKind;

fn seeded() -> TestService {
    let test = TestService::new();
    test.seed([
        user_execution("user"),
        system_execution("scheduler", "scheduler"),
        system_execution("archetype", "chasm-archetype-1"),
    ]);
    test
}

#[test]
fn test_is_not_null_returns_system_executions() {
    let test = seeded();
    let query = format!("{PARTITION} IS NOT NULL");
    let ids = test.query(Some(&query), QueryKind::Standard).expect("query");
    assert_eq!(sorted(ids), vec!["archetype", "scheduler"]);
}

#[test]
fn test_explicit_value_wins_over_archetype() {
    let test = seeded();
    let query = format!("{PARTITION} = 'scheduler'");
    let ids = test
        .query(Some(&query), QueryKind::scoped("chasm-archetype-1"))
        .expect("query");
    assert_eq!(ids, vec!["scheduler"]);
}

#[test]
fn test_reference_inside_or_counts() {
    let test = seeded();
    let query = format!("{PARTITION} = 'scheduler' OR {PARTITION} IS NULL");
    let ids = test.query(Some(&query), QueryKind::Standard).expect("query");
    assert_eq!(sorted(ids), vec!["scheduler", "user"]);
}
