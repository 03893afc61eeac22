// Life of a request:
// 1. HTTP request comes in (query text, archetype, page size, page token)
// 2. Parse the query text into an expression tree (absent or blank text means no filter)
// 3. Convert the tree into the store's native filter, tracking reserved attributes
// 4. Scope the filter: exclude system executions, or restrict to one archetype,
//    unless the query constrained the partition attribute itself
// 5. Run the scoped filter against the store, bounded by a deadline
// 6. Respond with one page and the token for the next
//
// System components:
//  - Attribute registry
//  - Query parser and converter
//  - Scoping policy
//  - Visibility stores (document, relational filter rendering)

pub mod backend;
pub mod config;
pub mod http;
pub mod listing;
pub mod query;
pub mod registry;
pub mod types;

mod e2e_tests;

pub use listing::{ListError, ListRequest, ListResponse, ListingOptions, ListingService};
