//! Test that following page tokens yields every matching execution exactly
//! once, in sort order, for any page size.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::document::MemoryStore;
use crate::e2e_tests::helpers::*;
use crate::listing::{ListRequest, ListingOptions};
use crate::query::QueryKind;
use crate::types::ExecutionRecord;

/// Seed `count` executions with colliding and missing start times. Roughly a
/// quarter are system executions that a standard query must skip.
fn random_executions(rng: &mut StdRng, count: usize) -> (Vec<ExecutionRecord>, Vec<String>) {
    let mut records = Vec::with_capacity(count);
    let mut visible: Vec<(Option<i64>, String)> = Vec::new();

    for i in 0..count {
        let run_id = format!("run-{i:03}");
        let start = rng.random_bool(0.8).then(|| rng.random_range(0..8_i64));

        let record = if rng.random_bool(0.25) {
            let archetype = format!("archetype-{}", rng.random_range(0..3));
            system_execution(&run_id, &archetype)
        } else {
            visible.push((start, run_id.clone()));
            user_execution(&run_id)
        };
        records.push(match start {
            Some(seconds) => started_at(record, seconds),
            None => record,
        });
    }

    // StartTime descending, missing last, ties by run id
    visible.sort_by(|(a_start, a_id), (b_start, b_id)| {
        match (a_start, b_start) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| a_id.cmp(b_id))
    });
    let expected = visible.into_iter().map(|(_, run_id)| run_id).collect();
    (records, expected)
}

#[test]
fn test_pages_cover_results_exactly_once() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..5 {
        let test = TestService::new();
        let (records, expected) = random_executions(&mut rng, 40);
        test.seed(records);

        for page_size in 1..7 {
            let listed = test
                .list_all(None, &QueryKind::Standard, page_size)
                .expect("list");
            assert_eq!(listed, expected, "round {round}, page size {page_size}");
        }
    }
}

#[test]
fn test_single_page_has_no_token() {
    let test = TestService::new();
    test.seed([
        started_at(user_execution("a"), 1),
        started_at(user_execution("b"), 2),
    ]);

    let response = test
        .list(ListRequest::new(QueryKind::Standard, 2))
        .expect("list");
    assert_eq!(run_ids(&response), vec!["b", "a"]);
    assert!(response.next_page_token.is_none());
}

#[test]
fn test_token_survives_inserts_before_cursor() {
    let test = TestService::new();
    test.seed([
        started_at(user_execution("a"), 30),
        started_at(user_execution("b"), 20),
        started_at(user_execution("c"), 10),
    ]);

    let first = test
        .list(ListRequest::new(QueryKind::Standard, 1))
        .expect("list");
    assert_eq!(run_ids(&first), vec!["a"]);

    // Lands before the cursor, so later pages must not include it
    test.seed([started_at(user_execution("z"), 40)]);

    let rest = test
        .list(ListRequest::new(QueryKind::Standard, 10).with_page_token(first.next_page_token))
        .expect("list");
    assert_eq!(run_ids(&rest), vec!["b", "c"]);
    assert!(rest.next_page_token.is_none());
}

#[test]
fn test_oversized_page_is_clamped() {
    let options = ListingOptions {
        max_page_size: 2,
        ..ListingOptions::default()
    };
    let test = TestService::with_store(MemoryStore::new(), options);
    test.seed([
        user_execution("a"),
        user_execution("b"),
        user_execution("c"),
    ]);

    let response = test
        .list(ListRequest::new(QueryKind::Standard, 500))
        .expect("list");
    assert_eq!(response.records.len(), 2);
    assert!(response.next_page_token.is_some());
}
