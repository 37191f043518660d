//! Service and span name lookups

use spanstore::prelude::*;

use crate::test_utils::*;

async fn seed(store: &SpanStore) {
    let spans = vec![
        span(TraceId::from_u64(1), 1, "web", "get", micros_into(DAY, 1)),
        span(TraceId::from_u64(1), 2, "db", "query", micros_into(DAY, 2)),
        span(TraceId::from_u64(2), 3, "web", "post", micros_into(DAY, 3)),
        span(TraceId::from_u64(2), 4, "web", "get", micros_into(DAY, 4)),
        span(TraceId::from_u64(3), 5, "cache", "", micros_into(DAY, 5)),
    ];
    accept(store, &spans).await;
}

#[tokio::test]
async fn test_service_names_sorted_and_distinct() {
    let (_, store) = store();
    seed(&store).await;

    let names = store.get_service_names().run().await.unwrap();
    // "cache" only reported an unnamed span
    assert_eq!(names, vec!["db".to_string(), "web".to_string()]);
}

#[tokio::test]
async fn test_span_names_for_service() {
    let (_, store) = store();
    seed(&store).await;

    let names = store.get_span_names("web").run().await.unwrap();
    assert_eq!(names, vec!["get".to_string(), "post".to_string()]);

    let names = store.get_span_names(" WEB ").run().await.unwrap();
    assert_eq!(names, vec!["get".to_string(), "post".to_string()]);

    assert!(store.get_span_names("unknown").run().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_service_has_no_span_names() {
    let (session, store) = store();
    seed(&store).await;

    let before = session.executed_count();
    assert!(store.get_span_names("  ").run().await.unwrap().is_empty());
    assert_eq!(session.executed_count(), before);
}

#[tokio::test]
async fn test_search_disabled_writes_and_reads_no_indexes() {
    let (session, store) = unindexed_store();
    seed(&store).await;

    assert_eq!(session.row_count(schema::TABLE_SPAN), 5);
    assert_eq!(session.row_count(schema::TABLE_TRACE_BY_SERVICE_SPAN), 0);
    assert_eq!(session.row_count(schema::TABLE_SPAN_BY_SERVICE), 0);

    let before = session.executed_count();
    let request = request_for("web", 10).build().unwrap();
    assert!(store.search_traces(&request).run().await.unwrap().is_empty());
    assert!(store.get_traces(&request).run().await.unwrap().is_empty());
    assert!(store.get_service_names().run().await.unwrap().is_empty());
    assert!(store.get_span_names("web").run().await.unwrap().is_empty());
    assert_eq!(session.executed_count(), before);

    // Trace lookup by id still works
    let spans = store.get_trace(TraceId::from_u64(1), true).run().await.unwrap();
    assert_eq!(spans.len(), 2);
}
