//! Tracking store contract tests
//!
//! Exercises `GraphTrackingStore` end to end against `InMemoryGraph`:
//! experiment and run lifecycles, logging semantics, search pagination,
//! transport faults and concurrent callers.

mod common;

mod concurrency;
mod experiments;
mod logging;
mod runs;
mod search;
