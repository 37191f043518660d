//! Common imports
//!
//! ```ignore
//! use spanstore::prelude::*;
//! ```

pub use crate::{
    schema, Call, DayKey, DependencyLink, Error, MemorySession, QueryRequest, Result, Session,
    SessionError, Span, SpanStore, StoreConfig, TraceId, DAY_MILLIS, MAX_LOOKBACK_MS,
};
