//! Span writes
//!
//! Every span becomes a `span` row. With search enabled, spans that carry a
//! local service and a timestamp also produce index rows:
//!
//! - `trace_by_service_span` under their span name and under `""`
//! - `span_by_service` for the (service, span name) pair
//!
//! With search disabled no index rows and no annotation query are written.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use spanstore_call::Call;
use spanstore_core::{DayKey, Result, SessionResult, Span};
use spanstore_session::{
    bind_and_issue, Insert, PreparedStatement, ResultSet, ResultSetCall, Session, Value,
};

use crate::schema::{
    COL_ANNOTATION_QUERY, COL_DAY, COL_DURATION, COL_ID, COL_LOCAL_SERVICE, COL_NAME,
    COL_PAYLOAD, COL_SERVICE, COL_SPAN, COL_TRACE_ID, COL_TRACE_ID_HIGH, COL_TS,
    TABLE_SPAN, TABLE_SPAN_BY_SERVICE, TABLE_TRACE_BY_SERVICE_SPAN,
};

/// Writes one row with a prepared insert
pub struct InsertRow {
    session: Arc<dyn Session>,
    prepared: PreparedStatement,
    values: Vec<Value>,
    description: String,
}

impl ResultSetCall for InsertRow {
    type Output = ();

    fn new_future(&self) -> BoxFuture<'static, SessionResult<ResultSet>> {
        bind_and_issue(&self.session, &self.prepared, self.values.clone())
    }

    fn map(&self, _rows: ResultSet) -> Result<()> {
        Ok(())
    }
}

impl fmt::Display for InsertRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Turns spans into insert calls
pub struct SpanConsumer {
    session: Arc<dyn Session>,
    insert_span: PreparedStatement,
    insert_trace_by_service_span: PreparedStatement,
    insert_span_by_service: PreparedStatement,
    strict: bool,
    search_enabled: bool,
}

impl SpanConsumer {
    /// Prepare the span and index inserts
    pub fn new(session: Arc<dyn Session>, strict: bool, search_enabled: bool) -> Result<Self> {
        let insert_span = session.prepare(
            Insert::into(TABLE_SPAN)
                .value(COL_TRACE_ID)
                .value(COL_TRACE_ID_HIGH)
                .value(COL_TS)
                .value(COL_ID)
                .value(COL_LOCAL_SERVICE)
                .value(COL_NAME)
                .value(COL_DURATION)
                .value(COL_ANNOTATION_QUERY)
                .value(COL_PAYLOAD)
                .into(),
        )?;
        let insert_trace_by_service_span = session.prepare(
            Insert::into(TABLE_TRACE_BY_SERVICE_SPAN)
                .value(COL_SERVICE)
                .value(COL_SPAN)
                .value(COL_DAY)
                .value(COL_TS)
                .value(COL_TRACE_ID)
                .value(COL_DURATION)
                .into(),
        )?;
        let insert_span_by_service = session.prepare(
            Insert::into(TABLE_SPAN_BY_SERVICE)
                .value(COL_SERVICE)
                .value(COL_SPAN)
                .into(),
        )?;

        Ok(SpanConsumer {
            session,
            insert_span,
            insert_trace_by_service_span,
            insert_span_by_service,
            strict,
            search_enabled,
        })
    }

    /// A call writing every span and its index rows concurrently
    ///
    /// # Errors
    ///
    /// `Error::Decode` if a span cannot be encoded. Nothing is written in
    /// that case.
    pub fn accept(&self, spans: &[Span]) -> Result<Call<()>> {
        let mut writes = Vec::new();
        for span in spans {
            writes.push(self.span_row(span)?);
            if self.search_enabled {
                self.index_rows(span, &mut writes);
            }
        }
        if writes.is_empty() {
            return Ok(Call::ready(()));
        }

        debug!(
            target: "spanstore::store",
            spans = spans.len(),
            rows = writes.len(),
            "Accepting spans"
        );
        Ok(Call::fan_out(writes).map(|_| ()))
    }

    fn write(&self, prepared: &PreparedStatement, values: Vec<Value>, description: String) -> Call<()> {
        InsertRow {
            session: Arc::clone(&self.session),
            prepared: prepared.clone(),
            values,
            description,
        }
        .into_call()
    }

    fn span_row(&self, span: &Span) -> Result<Call<()>> {
        let trace_id = span.trace_id;
        let high = if self.strict { None } else { trace_id.high_hex() };
        let annotation_query = if self.search_enabled {
            span.annotation_query()
        } else {
            None
        };
        let values = vec![
            Value::from(trace_id.partition_key(self.strict)),
            Value::from(high),
            Value::from(span.timestamp.unwrap_or(0)),
            Value::from(format!("{:016x}", span.id)),
            Value::from(span.local_service.clone().unwrap_or_default()),
            Value::from(span.name.clone()),
            Value::from(span.duration),
            Value::from(annotation_query),
            Value::from(span.to_bytes()?),
        ];
        let description = format!("InsertSpan{{trace_id={}, id={:016x}}}", trace_id, span.id);
        Ok(self.write(&self.insert_span, values, description))
    }

    fn index_rows(&self, span: &Span, writes: &mut Vec<Call<()>>) {
        let (Some(service), Some(ts)) = (span.local_service.as_deref(), span.timestamp) else {
            return;
        };
        if service.is_empty() {
            return;
        }
        let Some(day) = DayKey::containing_micros(ts) else {
            return;
        };
        let name = span.name.as_deref().unwrap_or_default();

        let mut span_names = vec![""];
        if !name.is_empty() {
            span_names.push(name);
        }
        for span_name in span_names {
            let values = vec![
                Value::from(service),
                Value::from(span_name),
                Value::from(day),
                Value::from(ts),
                Value::from(span.trace_id.to_string()),
                Value::from(span.duration),
            ];
            let description = format!(
                "InsertTraceByServiceSpan{{service={}, span={}, day={}, trace_id={}}}",
                service, span_name, day, span.trace_id
            );
            writes.push(self.write(&self.insert_trace_by_service_span, values, description));
        }

        if !name.is_empty() {
            let values = vec![Value::from(service), Value::from(name)];
            let description = format!("InsertSpanByService{{service={}, span={}}}", service, name);
            writes.push(self.write(&self.insert_span_by_service, values, description));
        }
    }
}
