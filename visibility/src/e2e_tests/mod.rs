//! End-to-end tests at the listing-service level.
//!
//! Each test file covers a specific scenario, driving the full
//! parse, convert, scope and store pipeline against seeded executions.

#![cfg(test)]

mod helpers;

mod test_absent_query;
mod test_archetype_scoping;
mod test_count;
mod test_errors_before_io;
mod test_explicit_partition;
mod test_null_presence;
mod test_order_by;
mod test_pagination;
mod test_standard_scoping;
mod test_store_faults;
