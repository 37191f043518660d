//! Span Store Comprehensive Test Suite
//!
//! End-to-end behavior of `SpanStore` over `MemorySession`.
//!
//! ## Modules
//!
//! - **search**: over-fetch compensation, annotation terms, ordering, windows
//! - **consumer**: span and index rows written by `accept`
//! - **names**: service and span name lookups, search disabled
//! - **calls**: cancellation, retry and diagnostics of store calls
//! - **config**: opening a store from `spanstore.toml`
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test store_comprehensive
//! ```

// Test modules
mod test_utils;

mod calls;
mod config;
mod consumer;
mod names;
mod search;
