//! Query and write layer for spanstore
//!
//! This crate turns store operations into calls over a `Session`:
//! - dependencies: day-bucketed link batches, merged on read
//! - search: index reads with over-fetch, collapsed to distinct traces
//! - trace: span lookup bridging 64-bit and 128-bit trace ids
//! - consumer: span and index row writes
//! - names: service and span name lookups
//! - store: `SpanStore`, the entry point owning every factory

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod consumer;
pub mod dependencies;
pub mod names;
pub mod schema;
pub mod search;
pub mod store;
pub mod trace;

pub use consumer::SpanConsumer;
pub use search::{SearchPlan, TraceHits};
pub use store::SpanStore;
