//! Test that standard queries never see system executions.

use crate::e2e_tests::helpers::*;
use crate::query::QueryKind;
use crate::types::AttributeValue;

#[test]
fn test_standard_query_excludes_system_executions() {
    let test = TestService::new();
    test.seed([
        system_execution("system", "scheduler").with("CustomAttr", AttributeValue::text("x")),
        user_execution("user").with("CustomAttr", AttributeValue::text("x")),
    ]);

    let ids = test
        .query(Some("CustomAttr = \"x\""), QueryKind::Standard)
        .expect("query");
    assert_eq!(ids, vec!["user"]);
}

#[test]
fn test_standard_scoping_survives_or_and_not() {
    let test = TestService::new();
    test.seed([
        system_execution("system", "scheduler").with("CustomAttr", AttributeValue::text("a")),
        user_execution("user-a").with("CustomAttr", AttributeValue::text("a")),
        user_execution("user-b").with("CustomAttr", AttributeValue::text("b")),
    ]);

    for query in [
        "CustomAttr = 'a' OR CustomAttr = 'b'",
        "NOT CustomAttr = 'c'",
        "CustomAttr IN ('a', 'b')",
        "CustomAttr STARTS_WITH ''",
    ] {
        let ids = test.query(Some(query), QueryKind::Standard).expect("query");
        assert_eq!(sorted(ids), vec!["user-a", "user-b"], "query: {query}");
    }
}
