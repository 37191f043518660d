//! Span model
//!
//! Spans are stored as opaque blobs; only the fields the indexes need are
//! broken out into columns by the engine. Timestamps and durations are epoch
//! microseconds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::trace_id::TraceId;

/// Delimiter surrounding every term of the annotation query column
pub const ANNOTATION_QUERY_DELIMITER: char = '░';

/// The role a span plays in an RPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanKind {
    /// Outbound request
    Client,
    /// Inbound request
    Server,
    /// Message sent to a broker
    Producer,
    /// Message received from a broker
    Consumer,
}

/// A timestamped event recorded on a span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Epoch microseconds
    pub timestamp: i64,
    /// Event description, e.g. "ws" for wire send
    pub value: String,
}

/// A single operation within a trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Trace this span belongs to
    pub trace_id: TraceId,
    /// Parent span, `None` for a root span
    pub parent_id: Option<u64>,
    /// Span identifier, unique within a trace
    pub id: u64,
    /// Operation name, lowercase by convention
    pub name: Option<String>,
    /// RPC role
    pub kind: Option<SpanKind>,
    /// Start time in epoch microseconds
    pub timestamp: Option<i64>,
    /// Duration in microseconds
    pub duration: Option<i64>,
    /// Service that recorded this span
    pub local_service: Option<String>,
    /// Service on the other side of the RPC
    pub remote_service: Option<String>,
    /// Timestamped events
    pub annotations: Vec<Annotation>,
    /// String key/value pairs
    pub tags: BTreeMap<String, String>,
}

impl Span {
    /// Create a span with only identifiers set
    pub fn new(trace_id: TraceId, id: u64) -> Self {
        Span {
            trace_id,
            parent_id: None,
            id,
            name: None,
            kind: None,
            timestamp: None,
            duration: None,
            local_service: None,
            remote_service: None,
            annotations: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Set the operation name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into().to_lowercase());
        self
    }

    /// Set the local service name
    pub fn with_local_service(mut self, service: impl Into<String>) -> Self {
        self.local_service = Some(service.into().to_lowercase());
        self
    }

    /// Set the remote service name
    pub fn with_remote_service(mut self, service: impl Into<String>) -> Self {
        self.remote_service = Some(service.into().to_lowercase());
        self
    }

    /// Set the parent span
    pub fn with_parent(mut self, parent_id: u64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the RPC role
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set start time and duration, both in microseconds
    pub fn with_timing(mut self, timestamp: i64, duration: i64) -> Self {
        self.timestamp = Some(timestamp);
        self.duration = Some(duration);
        self
    }

    /// Add a timestamped annotation
    pub fn with_annotation(mut self, timestamp: i64, value: impl Into<String>) -> Self {
        self.annotations.push(Annotation {
            timestamp,
            value: value.into(),
        });
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Searchable text for this span's annotations and tags
    ///
    /// Each annotation value contributes `░value░`; each tag contributes
    /// `░key░` and `░key=value░`. Returns `None` when there is nothing to
    /// search. A `LIKE '%░term░%'` predicate then matches whole terms only.
    pub fn annotation_query(&self) -> Option<String> {
        if self.annotations.is_empty() && self.tags.is_empty() {
            return None;
        }

        let mut out = String::new();
        out.push(ANNOTATION_QUERY_DELIMITER);
        for annotation in &self.annotations {
            out.push_str(&annotation.value);
            out.push(ANNOTATION_QUERY_DELIMITER);
        }
        for (key, value) in &self.tags {
            out.push_str(key);
            out.push(ANNOTATION_QUERY_DELIMITER);
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push(ANNOTATION_QUERY_DELIMITER);
        }
        Some(out)
    }

    /// Encode this span for the span table's blob column
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    /// Decode a span from the span table's blob column
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Wrap a search term the way it appears in the annotation query column
pub fn annotation_query_pattern(term: &str) -> String {
    format!(
        "%{d}{term}{d}%",
        d = ANNOTATION_QUERY_DELIMITER,
        term = term
    )
}
