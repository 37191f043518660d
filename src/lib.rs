//! Spanstore - span and dependency-link storage over a wide-column session
//!
//! Spanstore persists tracing spans and per-day service dependency graphs,
//! and answers trace searches, trace lookups and dependency queries. Every
//! operation is a [`Call`]: executed at most once, cancelable, and retried
//! by cloning.
//!
//! # Quick Start
//!
//! ```ignore
//! use spanstore::prelude::*;
//! use std::sync::Arc;
//!
//! let config = StoreConfig::default();
//! let session = Arc::new(MemorySession::new(schema::keyspace(&config.keyspace)));
//! let store = SpanStore::new(session, config)?;
//!
//! store.accept(&spans)?.run().await?;
//! let links = store.select_dependencies(end_ts, Some(DAY_MILLIS))?.run().await?;
//! ```
//!
//! # Architecture
//!
//! - `spanstore-core`: domain types, dependency merge, config, errors
//! - `spanstore-call`: the call abstraction and its combinators
//! - `spanstore-session`: the database session boundary and `MemorySession`
//! - `spanstore-engine`: queries, writes and the `SpanStore` facade

pub mod prelude;

pub use spanstore_call::{Call, CallState, CancelHandle, Execution, Recipe};
pub use spanstore_core::*;
pub use spanstore_engine::{schema, SearchPlan, SpanConsumer, SpanStore, TraceHits};
pub use spanstore_session::{
    ClusteringOrder, Keyspace, MemorySession, ResultSet, ResultSetCall, Row, Session,
    TableSchema, Value,
};
