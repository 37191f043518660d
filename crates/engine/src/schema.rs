//! Table and column names
//!
//! ```text
//! span                   PRIMARY KEY (trace_id, ts, id, l_service)
//! trace_by_service_span  PRIMARY KEY ((service, span, day), ts DESC, trace_id)
//! span_by_service        PRIMARY KEY (service, span)
//! dependency             PRIMARY KEY (day)
//! ```
//!
//! `span.trace_id` holds the full identifier when writes are strict and the
//! lower 64 bits otherwise, with the upper 64 bits in `trace_id_high`.
//! Index tables always hold the full identifier.

use spanstore_core::{Result, TraceId};
use spanstore_session::{ClusteringOrder, Keyspace, Row, TableSchema};

/// Spans, one row per span per reporting service
pub const TABLE_SPAN: &str = "span";
/// Trace ids by (service, span name, day); span name `""` means any span
pub const TABLE_TRACE_BY_SERVICE_SPAN: &str = "trace_by_service_span";
/// Span names by service
pub const TABLE_SPAN_BY_SERVICE: &str = "span_by_service";
/// One serialized link batch per day
pub const TABLE_DEPENDENCY: &str = "dependency";

/// Trace id column, partition key of `span`
pub const COL_TRACE_ID: &str = "trace_id";
/// Upper 64 trace id bits, written when trace ids are not strict
pub const COL_TRACE_ID_HIGH: &str = "trace_id_high";
/// Span start, epoch microseconds
pub const COL_TS: &str = "ts";
/// Span id as 16 hex characters
pub const COL_ID: &str = "id";
/// Local service name, `""` when unknown
pub const COL_LOCAL_SERVICE: &str = "l_service";
/// Span name
pub const COL_NAME: &str = "name";
/// Span duration, microseconds
pub const COL_DURATION: &str = "duration";
/// Delimited annotation and tag terms
pub const COL_ANNOTATION_QUERY: &str = "annotation_query";
/// Encoded span
pub const COL_PAYLOAD: &str = "payload";
/// Service name in the index tables
pub const COL_SERVICE: &str = "service";
/// Span name in the index tables
pub const COL_SPAN: &str = "span";
/// UTC day bucket
pub const COL_DAY: &str = "day";
/// Encoded dependency links
pub const COL_LINKS: &str = "links";

/// The store's tables, for sessions that validate against a schema
pub fn keyspace(name: &str) -> Keyspace {
    Keyspace::new(name)
        .with_table(
            TableSchema::new(TABLE_SPAN)
                .partition_key(COL_TRACE_ID)
                .clustering(COL_TS, ClusteringOrder::Asc)
                .clustering(COL_ID, ClusteringOrder::Asc)
                .clustering(COL_LOCAL_SERVICE, ClusteringOrder::Asc)
                .column(COL_TRACE_ID_HIGH)
                .column(COL_PAYLOAD)
                .indexed(COL_NAME)
                .indexed(COL_DURATION)
                .indexed(COL_ANNOTATION_QUERY),
        )
        .with_table(
            TableSchema::new(TABLE_TRACE_BY_SERVICE_SPAN)
                .partition_key(COL_SERVICE)
                .partition_key(COL_SPAN)
                .partition_key(COL_DAY)
                .clustering(COL_TS, ClusteringOrder::Desc)
                .clustering(COL_TRACE_ID, ClusteringOrder::Asc)
                .indexed(COL_DURATION),
        )
        .with_table(
            TableSchema::new(TABLE_SPAN_BY_SERVICE)
                .partition_key(COL_SERVICE)
                .clustering(COL_SPAN, ClusteringOrder::Asc),
        )
        .with_table(
            TableSchema::new(TABLE_DEPENDENCY)
                .partition_key(COL_DAY)
                .column(COL_LINKS),
        )
}

/// Trace id of a `span` row, restoring the upper bits of relaxed writes
pub(crate) fn stored_trace_id(row: &Row) -> Result<TraceId> {
    let id = TraceId::parse(row.get_text(COL_TRACE_ID)?)?;
    match row.get_opt_text(COL_TRACE_ID_HIGH)? {
        Some(high) if !id.is_128_bit() => {
            Ok(TraceId::from_parts(TraceId::parse(high)?.low(), id.low()))
        }
        _ => Ok(id),
    }
}
