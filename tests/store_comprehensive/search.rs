//! Trace search: over-fetch, filter-before-limit, intersection and ordering

use proptest::prelude::*;
use spanstore::prelude::*;
use spanstore::schema::{TABLE_SPAN, TABLE_TRACE_BY_SERVICE_SPAN};

use crate::test_utils::*;

/// `count` traces of three spans each, trace `i` newer than trace `i - 1`
async fn seed_three_span_traces(store: &SpanStore, count: u64) {
    let mut spans = Vec::new();
    for i in 1..=count {
        for j in 0..3u64 {
            let ts = micros_into(DAY, (i * 1_000) as i64) + j as i64;
            spans.push(span(TraceId::from_u64(i), i * 10 + j, "svc", "get", ts));
        }
    }
    accept(store, &spans).await;
}

#[tokio::test]
async fn test_multiplier_compensates_for_duplicate_index_rows() {
    let request = request_for("svc", 2).build().unwrap();

    // Two index rows both belong to the newest trace
    let (_, store) = store_with_multiplier(1);
    seed_three_span_traces(&store, 50).await;
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(50)]);

    // Six index rows cover the two newest traces
    let (_, store) = store_with_multiplier(3);
    seed_three_span_traces(&store, 50).await;
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(50), TraceId::from_u64(49)]);
}

#[tokio::test]
async fn test_results_newest_first_and_limited() {
    let (_, store) = store();
    seed_three_span_traces(&store, 5).await;

    let ids = store
        .search_traces(&request_for("svc", 3).build().unwrap())
        .run()
        .await
        .unwrap();
    assert_eq!(
        ids,
        vec![TraceId::from_u64(5), TraceId::from_u64(4), TraceId::from_u64(3)]
    );
}

#[tokio::test]
async fn test_annotation_filter_applies_before_limit() {
    let (_, store) = store();
    let mut spans = Vec::new();
    // Older matching traces
    for i in 1..=2u64 {
        spans.push(
            span(TraceId::from_u64(i), i, "svc", "get", micros_into(DAY, i as i64))
                .with_tag("host.name", "host1"),
        );
    }
    // Newer decoys, more than limit * multiplier of them
    for i in 100..=120u64 {
        spans.push(
            span(TraceId::from_u64(i), i, "svc", "get", micros_into(DAY, i as i64 * 1_000))
                .with_tag("host.name", "host2"),
        );
    }
    accept(&store, &spans).await;

    let request = request_for("svc", 2)
        .annotation("host.name", "host1")
        .build()
        .unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(2), TraceId::from_u64(1)]);
}

#[tokio::test]
async fn test_terms_intersect_across_spans_of_a_trace() {
    let (session, store) = store();
    let both = TraceId::from_u64(1);
    let split = TraceId::from_u64(2);
    let error_only = TraceId::from_u64(3);
    let spans = vec![
        span(both, 1, "svc", "get", micros_into(DAY, 10))
            .with_annotation(micros_into(DAY, 10), "error")
            .with_tag("http.method", "GET"),
        span(split, 2, "svc", "get", micros_into(DAY, 20)).with_annotation(micros_into(DAY, 20), "error"),
        span(split, 3, "svc", "get", micros_into(DAY, 21)).with_tag("http.method", "GET"),
        span(error_only, 4, "svc", "get", micros_into(DAY, 30)).with_annotation(micros_into(DAY, 30), "error"),
    ];
    accept(&store, &spans).await;

    let before = session.executed_count_for(TABLE_SPAN);
    let request = request_for("svc", 10)
        .parse_annotation_query("error and http.method=GET")
        .build()
        .unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![split, both]);

    // Candidate read and check read per term
    assert_eq!(session.executed_count_for(TABLE_SPAN) - before, 4);
}

#[tokio::test]
async fn test_terms_intersect_beyond_per_term_limit() {
    let (_, store) = store();
    let mut spans = Vec::new();
    // Twenty traces carrying only the first term fill its fetch size
    for i in 1..=20u64 {
        let ts = micros_into(DAY, 10_000 + i as i64);
        spans.push(
            span(TraceId::from_u64(i), i, "svc", "get", ts).with_annotation(ts, "error"),
        );
    }
    for i in 100..=101u64 {
        let ts = micros_into(DAY, i as i64);
        spans.push(
            span(TraceId::from_u64(i), i, "svc", "get", ts)
                .with_annotation(ts, "error")
                .with_tag("http.method", "GET"),
        );
    }
    accept(&store, &spans).await;

    let request = request_for("svc", 2)
        .parse_annotation_query("error and http.method=GET")
        .build()
        .unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(101), TraceId::from_u64(100)]);
}

#[tokio::test]
async fn test_terms_without_common_candidates_skip_check_reads() {
    let (session, store) = store();
    let spans = vec![
        span(TraceId::from_u64(1), 1, "svc", "get", micros_into(DAY, 1)).with_tag("http.method", "GET"),
    ];
    accept(&store, &spans).await;

    let before = session.executed_count_for(TABLE_SPAN);
    let request = request_for("svc", 10)
        .parse_annotation_query("error and http.method=POST")
        .build()
        .unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert!(ids.is_empty());
    assert_eq!(session.executed_count_for(TABLE_SPAN) - before, 2);
}

#[tokio::test]
async fn test_window_past_calendar_finds_nothing() {
    let (session, store) = store();
    seed_three_span_traces(&store, 3).await;

    let request = request_for("svc", 10)
        .end_ts(i64::MAX / 2)
        .lookback(MAX_LOOKBACK_MS)
        .build()
        .unwrap();
    let before = session.executed_count_for(TABLE_TRACE_BY_SERVICE_SPAN);
    let ids = store.search_traces(&request).run().await.unwrap();
    assert!(ids.is_empty());
    assert_eq!(session.executed_count_for(TABLE_TRACE_BY_SERVICE_SPAN), before);

    assert!(request_for("svc", 10)
        .end_ts(i64::MAX / 2)
        .lookback(i64::MAX / 2)
        .build()
        .is_err());
}

#[tokio::test]
async fn test_terms_match_whole_values_only() {
    let (_, store) = store();
    let spans = vec![
        span(TraceId::from_u64(1), 1, "svc", "get", micros_into(DAY, 1)).with_tag("http.method", "GETX"),
        span(TraceId::from_u64(2), 2, "svc", "get", micros_into(DAY, 2)).with_tag("http.method", "GET"),
    ];
    accept(&store, &spans).await;

    let request = request_for("svc", 10)
        .annotation("http.method", "GET")
        .build()
        .unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(2)]);
}

#[tokio::test]
async fn test_span_name_restricts_service_index() {
    let (_, store) = store();
    let spans = vec![
        span(TraceId::from_u64(1), 1, "svc", "get", micros_into(DAY, 1)),
        span(TraceId::from_u64(2), 2, "svc", "post", micros_into(DAY, 2)),
        span(TraceId::from_u64(3), 3, "other", "post", micros_into(DAY, 3)),
    ];
    accept(&store, &spans).await;

    let request = request_for("svc", 10).span_name("POST").build().unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(2)]);

    // "all" means any span name
    let request = request_for("svc", 10).span_name("all").build().unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(2), TraceId::from_u64(1)]);
}

#[tokio::test]
async fn test_duration_bounds() {
    let (_, store) = store();
    let spans: Vec<Span> = [(1u64, 100i64), (2, 1_000), (3, 10_000)]
        .iter()
        .map(|(i, duration)| {
            let ts = micros_into(DAY, *i as i64);
            Span::new(TraceId::from_u64(*i), *i)
                .with_local_service("svc")
                .with_name("get")
                .with_timing(ts, *duration)
                .with_tag("env", "prod")
        })
        .collect();
    accept(&store, &spans).await;

    let request = request_for("svc", 10).min_duration(500).build().unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(3), TraceId::from_u64(2)]);

    let request = request_for("svc", 10)
        .min_duration(500)
        .max_duration(5_000)
        .build()
        .unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(2)]);

    // Same bounds through the span table
    let request = request_for("svc", 10)
        .min_duration(500)
        .max_duration(5_000)
        .annotation("env", "prod")
        .build()
        .unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(2)]);
}

#[tokio::test]
async fn test_window_spans_days() {
    let (session, store) = store();
    let spans = vec![
        span(TraceId::from_u64(1), 1, "svc", "get", micros_into(DAY - 1, 1_000)),
        span(TraceId::from_u64(2), 2, "svc", "get", micros_into(DAY, 1_000)),
        span(TraceId::from_u64(3), 3, "svc", "get", micros_into(DAY - 3, 1_000)),
    ];
    accept(&store, &spans).await;

    let request = QueryRequest::builder()
        .service_name("svc")
        .end_ts(end_of_day(DAY))
        .lookback(2 * DAY_MILLIS)
        .limit(10)
        .build()
        .unwrap();
    let before = session.executed_count_for(TABLE_TRACE_BY_SERVICE_SPAN);
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(2), TraceId::from_u64(1)]);

    // One index read per day: DAY-2 (window start), DAY-1 and DAY
    assert_eq!(session.executed_count_for(TABLE_TRACE_BY_SERVICE_SPAN) - before, 3);
}

#[tokio::test]
async fn test_search_without_service_reads_span_table() {
    let (_, store) = store();
    let spans = vec![
        span(TraceId::from_u64(1), 1, "a", "get", micros_into(DAY, 1)),
        span(TraceId::from_u64(2), 2, "b", "get", micros_into(DAY, 2)),
    ];
    accept(&store, &spans).await;

    let request = QueryRequest::builder()
        .end_ts(end_of_day(DAY))
        .lookback(DAY_MILLIS)
        .limit(10)
        .build()
        .unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![TraceId::from_u64(2), TraceId::from_u64(1)]);
}

#[tokio::test]
async fn test_strict_search_distinguishes_128_bit_ids() {
    let (_, store) = store();
    let full = TraceId::from_parts(1, 5);
    let short = TraceId::from_u64(5);
    accept(
        &store,
        &[
            span(full, 1, "svc", "get", micros_into(DAY, 2)),
            span(short, 2, "svc", "get", micros_into(DAY, 1)),
        ],
    )
    .await;

    let ids = store
        .search_traces(&request_for("svc", 10).build().unwrap())
        .run()
        .await
        .unwrap();
    assert_eq!(ids, vec![full, short]);
}

#[tokio::test]
async fn test_relaxed_search_collapses_on_low_bits() {
    let (_, store) = relaxed_store();
    let full = TraceId::from_parts(1, 5);
    let short = TraceId::from_u64(5);
    accept(
        &store,
        &[
            span(full, 1, "svc", "get", micros_into(DAY, 2)).with_tag("env", "prod"),
            span(short, 2, "svc", "get", micros_into(DAY, 1)).with_tag("env", "prod"),
        ],
    )
    .await;

    // Service index path
    let ids = store
        .search_traces(&request_for("svc", 10).build().unwrap())
        .run()
        .await
        .unwrap();
    assert_eq!(ids, vec![short]);

    // Span table path
    let request = request_for("svc", 10).annotation("env", "prod").build().unwrap();
    let ids = store.search_traces(&request).run().await.unwrap();
    assert_eq!(ids, vec![short]);
}

#[tokio::test]
async fn test_get_traces_fetches_matching_traces() {
    let (_, store) = store();
    seed_three_span_traces(&store, 4).await;

    let traces = store
        .get_traces(&request_for("svc", 2).build().unwrap())
        .run()
        .await
        .unwrap();
    assert_eq!(traces.len(), 2);
    assert!(traces[0].iter().all(|s| s.trace_id == TraceId::from_u64(4)));
    assert!(traces[1].iter().all(|s| s.trace_id == TraceId::from_u64(3)));
    assert_eq!(traces[0].len(), 3);
}

#[tokio::test]
async fn test_search_failure_is_upstream() {
    let (session, store) = store();
    session.fail_table(
        TABLE_TRACE_BY_SERVICE_SPAN,
        SessionError::Timeout(std::time::Duration::from_secs(1)),
    );

    let err = store
        .search_traces(&request_for("svc", 10).build().unwrap())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Upstream(SessionError::Timeout(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// With at most `multiplier` spans per trace the newest `limit` traces
    /// are always found
    #[test]
    fn prop_multiplier_covering_span_count_fills_limit(
        counts in prop::collection::vec(1u64..=3, 1..12),
        limit in 1usize..6,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let (_, store) = store_with_multiplier(3);
            let mut spans = Vec::new();
            for (i, count) in counts.iter().enumerate() {
                let trace = i as u64 + 1;
                for j in 0..*count {
                    let ts = micros_into(DAY, trace as i64 * 1_000) + j as i64;
                    spans.push(span(TraceId::from_u64(trace), trace * 10 + j, "svc", "get", ts));
                }
            }
            accept(&store, &spans).await;

            let ids = store
                .search_traces(&request_for("svc", limit).build().unwrap())
                .run()
                .await
                .unwrap();
            let expected: Vec<TraceId> = (1..=counts.len() as u64)
                .rev()
                .take(limit)
                .map(TraceId::from_u64)
                .collect();
            assert_eq!(ids, expected);
        });
    }
}
