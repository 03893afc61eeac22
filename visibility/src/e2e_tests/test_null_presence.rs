//! Test that IS NULL and IS NOT NULL test attribute presence.

use crate::e2e_tests::helpers::*;
use crate::query::QueryKind;
use crate::types::AttributeValue;

#[test]
fn test_is_null_matches_absent_attribute() {
    let test = TestService::new();
    test.seed([
        user_execution("without"),
        user_execution("with").with("CustomText", AttributeValue::text("")),
    ]);

    let ids = test
        .query(Some("CustomText IS NULL"), QueryKind::Standard)
        .expect("query");
    assert_eq!(ids, vec!["without"]);

    let ids = test
        .query(Some("CustomText IS NOT NULL"), QueryKind::Standard)
        .expect("query");
    assert_eq!(ids, vec!["with"]);
}

#[test]
fn test_comparisons_skip_absent_attribute() {
    let test = TestService::new();
    test.seed([
        user_execution("without"),
        user_execution("five").with("CustomInt", AttributeValue::Int(5)),
    ]);

    for query in ["CustomInt != 3", "CustomInt < 10", "CustomInt IN (5, 6)"] {
        let ids = test.query(Some(query), QueryKind::Standard).expect("query");
        assert_eq!(ids, vec!["five"], "query: {query}");
    }

    // Negation is two-valued, so the absent attribute matches here
    let ids = test
        .query(Some("NOT CustomInt = 5"), QueryKind::Standard)
        .expect("query");
    assert_eq!(ids, vec!["without"]);
}

#[test]
fn test_keyword_list_membership() {
    let test = TestService::new();
    test.seed([
        user_execution("ab").with("CustomList", AttributeValue::keyword_list(["a", "b"])),
        user_execution("c").with("CustomList", AttributeValue::keyword_list(["c"])),
        user_execution("none"),
    ]);

    let ids = test
        .query(Some("CustomList = 'b'"), QueryKind::Standard)
        .expect("query");
    assert_eq!(ids, vec!["ab"]);

    let ids = test
        .query(Some("CustomList IN ('a', 'c')"), QueryKind::Standard)
        .expect("query");
    assert_eq!(sorted(ids), vec!["ab", "c"]);

    let ids = test
        .query(Some("CustomList != 'a'"), QueryKind::Standard)
        .expect("query");
    assert_eq!(ids, vec!["c"]);
}
