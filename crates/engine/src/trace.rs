//! Trace lookup across 64-bit and 128-bit trace ids
//!
//! Producers may report the same trace with a 64-bit id and with a 128-bit
//! id sharing the lower 64 bits. Depending on how spans were written, they
//! live under the low-64 partition or the full-id partition, so a lookup
//! reads both and then filters on the id decoded from each span:
//!
//! - strict: keep spans whose 128-bit id equals the requested id
//! - relaxed: keep spans whose lower 64 bits equal the requested id's

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use spanstore_call::Call;
use spanstore_core::{Result, SessionResult, Span, TraceId};
use spanstore_session::{
    bind_and_issue, PreparedStatement, ResultSet, ResultSetCall, Select, Session, Value,
};

use crate::schema::{COL_PAYLOAD, COL_TRACE_ID, TABLE_SPAN};

/// Reads every span of one trace
pub struct SelectFromSpan {
    session: Arc<dyn Session>,
    prepared: PreparedStatement,
    trace_id: TraceId,
    strict: bool,
    limit: usize,
}

/// Prepares the span lookup once and creates calls from it
pub struct Factory {
    session: Arc<dyn Session>,
    prepared: PreparedStatement,
    max_trace_cols: usize,
}

impl Factory {
    /// Prepare `SELECT payload FROM span WHERE trace_id IN ? LIMIT ?`
    pub fn new(session: Arc<dyn Session>, max_trace_cols: usize) -> Result<Self> {
        let prepared = session.prepare(
            Select::from(TABLE_SPAN)
                .column(COL_PAYLOAD)
                .where_in(COL_TRACE_ID)
                .limit_marker()
                .into(),
        )?;
        Ok(Factory {
            session,
            prepared,
            max_trace_cols,
        })
    }

    /// Spans of `trace_id` ordered by timestamp; empty if none are stored
    pub fn create(&self, trace_id: TraceId, strict: bool) -> Call<Vec<Span>> {
        SelectFromSpan {
            session: Arc::clone(&self.session),
            prepared: self.prepared.clone(),
            trace_id,
            strict,
            limit: self.max_trace_cols,
        }
        .into_call()
    }
}

impl ResultSetCall for SelectFromSpan {
    type Output = Vec<Span>;

    fn new_future(&self) -> BoxFuture<'static, SessionResult<ResultSet>> {
        let keys = Value::list(self.trace_id.lookup_keys());
        let limit = Value::BigInt(i64::try_from(self.limit).unwrap_or(i64::MAX));
        bind_and_issue(&self.session, &self.prepared, vec![keys, limit])
    }

    fn map(&self, rows: ResultSet) -> Result<Vec<Span>> {
        let read = rows.len();
        let mut spans = Vec::with_capacity(read);
        for row in &rows {
            let span = Span::from_bytes(row.get_blob(COL_PAYLOAD)?)?;
            if self.trace_id.matches(&span.trace_id, self.strict) {
                spans.push(span);
            }
        }
        spans.sort_by_key(|span| (span.timestamp.unwrap_or(0), span.id));

        if spans.len() < read {
            debug!(
                target: "spanstore::trace",
                trace_id = %self.trace_id,
                read,
                kept = spans.len(),
                "Dropped spans of other trace ids sharing the partition"
            );
        }
        Ok(spans)
    }
}

impl fmt::Display for SelectFromSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SelectFromSpan{{trace_id={}, strict={}, limit={}}}",
            self.trace_id, self.strict, self.limit
        )
    }
}
