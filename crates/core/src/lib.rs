//! Core types for spanstore
//!
//! This crate defines the foundational types used throughout the system:
//! - TraceId: 64/128-bit trace identifiers with zero-padding equivalence
//! - Span, Annotation, SpanKind: the span model and its annotation query text
//! - DependencyLink: service-to-service call counts and their merge
//! - DayKey: UTC day buckets and query-window enumeration
//! - QueryRequest: trace search criteria
//! - StoreConfig: tunables loaded from `spanstore.toml`
//! - Error, SessionError: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod day;
pub mod dependency;
pub mod error;
pub mod request;
pub mod span;
pub mod trace_id;

pub use config::{StoreConfig, CONFIG_FILE_NAME};
pub use day::{DayKey, DAY_MILLIS, MAX_LOOKBACK_MS, MAX_WINDOW_DAYS};
pub use dependency::{decode_batch, encode_batch, DependencyLink};
pub use error::{Error, Result, SessionError, SessionResult};
pub use request::{parse_annotation_query, QueryRequest, QueryRequestBuilder};
pub use span::{annotation_query_pattern, Annotation, Span, SpanKind};
pub use trace_id::TraceId;
