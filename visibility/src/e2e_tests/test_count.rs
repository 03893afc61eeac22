//! Test that counts are scoped exactly like listings.

use crate::e2e_tests::helpers::*;
use crate::query::QueryKind;
use crate::types::AttributeValue;

fn seeded() -> TestService {
    let test = TestService::new();
    test.seed([
        user_execution("user-1").with("CustomAttr", AttributeValue::text("x")),
        user_execution("user-2"),
        system_execution("system-1", "chasm-archetype-1").with("CustomAttr", AttributeValue::text("x")),
        system_execution("system-2", "chasm-archetype-1"),
        system_execution("system-3", "scheduler"),
    ]);
    test
}

#[test]
fn test_count_matches_listing() {
    let test = seeded();
    let queries = [None, Some("CustomAttr = 'x'"), Some("CustomAttr IS NULL")];
    let kinds = [QueryKind::Standard, QueryKind::scoped("chasm-archetype-1")];

    for query in queries {
        for kind in &kinds {
            let listed = test.query(query, kind.clone()).expect("list");
            let counted = test.count(query, kind.clone()).expect("count");
            assert_eq!(
                counted,
                u64::try_from(listed.len()).expect("fits"),
                "query {query:?}, kind {kind:?}"
            );
        }
    }
}

#[test]
fn test_count_values() {
    let test = seeded();
    assert_eq!(test.count(None, QueryKind::Standard).expect("count"), 2);
    assert_eq!(
        test.count(None, QueryKind::scoped("chasm-archetype-1")).expect("count"),
        2
    );
    let query = format!("{PARTITION} IS NOT NULL");
    assert_eq!(
        test.count(Some(&query), QueryKind::Standard).expect("count"),
        3
    );
}

#[test]
fn test_count_ignores_order_by() {
    let test = seeded();
    assert_eq!(
        test.count(Some("ORDER BY StartTime ASC"), QueryKind::Standard)
            .expect("count"),
        2
    );
}
