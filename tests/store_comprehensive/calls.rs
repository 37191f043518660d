//! Cancellation, retry and diagnostics of store calls

use std::time::{Duration, Instant};

use spanstore::prelude::*;
use spanstore::CallState;

use crate::test_utils::*;

#[tokio::test]
async fn test_cancel_slow_trace_lookup() {
    let (session, store) = store();
    accept(&store, &[span(TraceId::from_u64(1), 1, "svc", "get", micros_into(DAY, 1))]).await;
    session.set_latency(Some(Duration::from_millis(500)));

    let before = session.executed_count();
    let call = store.get_trace(TraceId::from_u64(1), true);
    let execution = call.execute().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    call.cancel();

    let err = execution.await.unwrap_err();
    assert!(matches!(err, Error::Canceled(_)));
    assert_eq!(call.state(), CallState::Canceled);

    // The aborted read never reached the table
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(session.executed_count(), before);
}

#[tokio::test]
async fn test_cancel_from_another_task() {
    let (session, store) = store();
    session.set_latency(Some(Duration::from_millis(500)));

    let call = store.get_service_names();
    let handle = call.cancel_handle();
    let execution = call.execute().unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    });

    let started = Instant::now();
    assert!(matches!(execution.await, Err(Error::Canceled(_))));
    assert!(started.elapsed() < Duration::from_millis(450));
}

#[tokio::test]
async fn test_retry_by_clone_after_fault() {
    let (session, store) = store();
    accept(&store, &[span(TraceId::from_u64(1), 1, "svc", "get", micros_into(DAY, 1))]).await;
    session.fail_table(
        schema::TABLE_SPAN,
        SessionError::Timeout(Duration::from_millis(100)),
    );

    let call = store.get_trace(TraceId::from_u64(1), true);
    let err = call.run().await.unwrap_err();
    assert!(err.is_upstream());
    assert_eq!(call.state(), CallState::Failed);

    session.clear_faults();
    let retry = call.clone();
    assert_eq!(retry.state(), CallState::New);
    let spans = retry.run().await.unwrap();
    assert_eq!(spans.len(), 1);

    // The original instance stays spent
    assert!(matches!(call.run().await, Err(Error::AlreadyExecuted(_))));
}

#[tokio::test]
async fn test_search_clone_reissues_every_day() {
    let (session, store) = store();
    let call = store.search_traces(&request_for("svc", 10).build().unwrap());

    call.run().await.unwrap();
    let first = session.executed_count_for(schema::TABLE_TRACE_BY_SERVICE_SPAN);
    call.clone().run().await.unwrap();
    let second = session.executed_count_for(schema::TABLE_TRACE_BY_SERVICE_SPAN);

    assert_eq!(first, 2);
    assert_eq!(second, 4);
}

#[tokio::test]
async fn test_trace_lookups_run_concurrently() {
    let (session, store) = store();
    let spans: Vec<Span> = (1..=5u64)
        .map(|i| span(TraceId::from_u64(i), i, "svc", "get", micros_into(DAY, i as i64)))
        .collect();
    accept(&store, &spans).await;
    session.set_latency(Some(Duration::from_millis(200)));

    let ids: Vec<TraceId> = (1..=5u64).map(TraceId::from_u64).collect();
    let started = Instant::now();
    let traces = store.get_traces_by_ids(&ids).run().await.unwrap();

    assert_eq!(traces.len(), 5);
    assert!(started.elapsed() < Duration::from_millis(800));
}

#[tokio::test]
async fn test_search_call_describes_its_reads() {
    let (_, store) = store();
    let call = store.search_traces(&request_for("svc", 10).build().unwrap());

    let today = DayKey::from_epoch_day(DAY).unwrap();
    let yesterday = DayKey::from_epoch_day(DAY - 1).unwrap();
    assert_eq!(today.to_string(), "2022-01-08");
    assert_eq!(
        call.to_string(),
        format!(
            "Mapped{{FanOut{{\
             SelectTraceIdsFromServiceSpan{{service=svc, span=, day={}, limit=30}}, \
             SelectTraceIdsFromServiceSpan{{service=svc, span=, day={}, limit=30}}}}}}",
            today, yesterday
        )
    );

    let traces = store.get_traces(&request_for("svc", 10).build().unwrap());
    assert!(traces.to_string().starts_with("FlatMapped{Mapped{FanOut{"));
}

#[tokio::test]
async fn test_trace_call_display() {
    let (_, store) = store();
    let call = store.get_trace(TraceId::from_parts(1, 2), false);
    assert_eq!(
        call.to_string(),
        "SelectFromSpan{trace_id=00000000000000010000000000000002, strict=false, limit=100000}"
    );
}
