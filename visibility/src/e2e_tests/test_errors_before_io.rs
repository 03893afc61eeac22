//! Test that malformed queries fail before the store is called.

use crate::backend::document::MemoryStore;
use crate::e2e_tests::helpers::*;
use crate::listing::{ListError, ListRequest, ListingOptions};
use crate::query::{ConvertError, QueryKind};

fn spy() -> TestService<SpyStore> {
    TestService::with_store(SpyStore::new(MemoryStore::new()), ListingOptions::default())
}

#[test]
fn test_unknown_attribute() {
    let test = spy();
    let result = test.query(Some("Nope = 'x'"), QueryKind::Standard);
    assert!(matches!(
        result,
        Err(ListError::Convert(ConvertError::UnknownAttribute(name))) if name == "Nope"
    ));
    assert_eq!(test.service.store().calls(), 0);
}

#[test]
fn test_type_mismatch() {
    let test = spy();
    let result = test.query(Some("CustomInt = 'five'"), QueryKind::Standard);
    assert!(matches!(
        result,
        Err(ListError::Convert(ConvertError::TypeMismatch { .. }))
    ));
    assert_eq!(test.service.store().calls(), 0);
}

#[test]
fn test_unsupported_operator() {
    let test = spy();
    let result = test.count(Some("CustomText STARTS_WITH 'a'"), QueryKind::Standard);
    assert!(matches!(
        result,
        Err(ListError::Convert(ConvertError::UnsupportedOperator { .. }))
    ));
    assert_eq!(test.service.store().calls(), 0);
}

#[test]
fn test_parse_error() {
    let test = spy();
    for query in ["CustomAttr = ", "CustomAttr = 'x' AND", "(CustomAttr = 'x'", "'unterminated"] {
        let result = test.query(Some(query), QueryKind::Standard);
        assert!(
            matches!(result, Err(ListError::InvalidQuery(_))),
            "query: {query}"
        );
    }
    assert_eq!(test.service.store().calls(), 0);
}

#[test]
fn test_long_predicate_chain() {
    let test = spy();
    for op in [" AND ", " OR "] {
        let query = vec!["CustomAttr = 'x'"; 5000].join(op);
        let result = test.query(Some(&query), QueryKind::Standard);
        assert!(matches!(result, Err(ListError::InvalidQuery(_))), "joined by {op}");
    }
    assert_eq!(test.service.store().calls(), 0);
}

#[test]
fn test_zero_page_size() {
    let test = spy();
    let result = test.list(ListRequest::new(QueryKind::Standard, 0));
    assert!(matches!(result, Err(ListError::InvalidPageSize(0))));
    assert_eq!(test.service.store().calls(), 0);
}

#[test]
fn test_valid_query_reaches_store_once() {
    let test = spy();
    test.query(Some("CustomAttr = 'x'"), QueryKind::Standard)
        .expect("query");
    assert_eq!(test.service.store().calls(), 1);
}
