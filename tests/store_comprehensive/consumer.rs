//! Rows written by `SpanStore::accept`

use spanstore::prelude::*;
use spanstore::schema::{TABLE_SPAN, TABLE_SPAN_BY_SERVICE, TABLE_TRACE_BY_SERVICE_SPAN};

use crate::test_utils::*;

#[tokio::test]
async fn test_named_span_writes_span_and_index_rows() {
    let (session, store) = store();
    accept(
        &store,
        &[span(TraceId::from_u64(1), 1, "svc", "get", micros_into(DAY, 1))],
    )
    .await;

    assert_eq!(session.row_count(TABLE_SPAN), 1);
    // Under "" and under the span name
    assert_eq!(session.row_count(TABLE_TRACE_BY_SERVICE_SPAN), 2);
    assert_eq!(session.row_count(TABLE_SPAN_BY_SERVICE), 1);
}

#[tokio::test]
async fn test_unnamed_span_indexed_only_under_any_name() {
    let (session, store) = store();
    let unnamed = Span::new(TraceId::from_u64(1), 1)
        .with_local_service("svc")
        .with_timing(micros_into(DAY, 1), 10);
    accept(&store, &[unnamed]).await;

    assert_eq!(session.row_count(TABLE_SPAN), 1);
    assert_eq!(session.row_count(TABLE_TRACE_BY_SERVICE_SPAN), 1);
    assert_eq!(session.row_count(TABLE_SPAN_BY_SERVICE), 0);
}

#[tokio::test]
async fn test_span_without_service_or_timestamp_is_not_indexed() {
    let (session, store) = store();
    let no_service = Span::new(TraceId::from_u64(1), 1)
        .with_name("get")
        .with_timing(micros_into(DAY, 1), 10);
    let no_timestamp = Span::new(TraceId::from_u64(1), 2)
        .with_local_service("svc")
        .with_name("get");
    accept(&store, &[no_service, no_timestamp]).await;

    assert_eq!(session.row_count(TABLE_SPAN), 2);
    assert_eq!(session.row_count(TABLE_TRACE_BY_SERVICE_SPAN), 0);
    assert_eq!(session.row_count(TABLE_SPAN_BY_SERVICE), 0);

    // Still retrievable by id
    let spans = store.get_trace(TraceId::from_u64(1), true).run().await.unwrap();
    assert_eq!(spans.len(), 2);
}

#[tokio::test]
async fn test_span_by_service_deduplicates_pairs() {
    let (session, store) = store();
    let spans: Vec<Span> = (1..=5u64)
        .map(|i| span(TraceId::from_u64(i), i, "svc", "get", micros_into(DAY, i as i64)))
        .collect();
    accept(&store, &spans).await;

    assert_eq!(session.row_count(TABLE_SPAN), 5);
    assert_eq!(session.row_count(TABLE_TRACE_BY_SERVICE_SPAN), 10);
    assert_eq!(session.row_count(TABLE_SPAN_BY_SERVICE), 1);
}

#[tokio::test]
async fn test_accepting_nothing_touches_nothing() {
    let (session, store) = store();
    let call = store.accept(&[]).unwrap();
    call.run().await.unwrap();
    assert_eq!(session.executed_count(), 0);
}

#[tokio::test]
async fn test_round_trip_preserves_every_field() {
    let (_, store) = store();
    let trace_id = TraceId::from_parts(0x1234, 0x5678);
    let original = Span::new(trace_id, 2)
        .with_parent(1)
        .with_name("get /api")
        .with_kind(spanstore::SpanKind::Server)
        .with_local_service("frontend")
        .with_remote_service("backend")
        .with_timing(micros_into(DAY, 5), 250)
        .with_annotation(micros_into(DAY, 5) + 10, "ws")
        .with_tag("http.path", "/api");
    accept(&store, &[original.clone()]).await;

    let spans = store.get_trace(trace_id, true).run().await.unwrap();
    assert_eq!(spans, vec![original]);
}

#[tokio::test]
async fn test_write_failure_is_upstream() {
    let (session, store) = store();
    session.fail_table(TABLE_SPAN, SessionError::Unavailable("no replicas".to_string()));

    let err = store
        .accept(&[span(TraceId::from_u64(1), 1, "svc", "get", micros_into(DAY, 1))])
        .unwrap()
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Upstream(SessionError::Unavailable(_))));
}

#[tokio::test]
async fn test_relaxed_writes_use_low_partition() {
    let (session, store) = relaxed_store();
    let full = TraceId::from_parts(7, 9);
    accept(&store, &[span(full, 1, "svc", "get", micros_into(DAY, 1))]).await;

    // Lookups always read the low-64 partition
    let spans = store.get_trace(full, true).run().await.unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].trace_id, full);
    assert_eq!(session.row_count(TABLE_SPAN), 1);

    // The 64-bit form reaches it only in relaxed mode
    let spans = store.get_trace(TraceId::from_u64(9), false).run().await.unwrap();
    assert_eq!(spans.len(), 1);
    let spans = store.get_trace(TraceId::from_u64(9), true).run().await.unwrap();
    assert!(spans.is_empty());
}
