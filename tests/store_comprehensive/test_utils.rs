//! Shared helpers for the store test suite

#![allow(dead_code)]

use std::sync::Arc;

use spanstore::prelude::*;

/// Day number the fixtures write into
pub const DAY: i64 = 19_000;

/// Route store logs to the test harness; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Store over a fresh MemorySession
pub fn store_with(config: StoreConfig) -> (Arc<MemorySession>, SpanStore) {
    init_tracing();
    let session = Arc::new(MemorySession::new(schema::keyspace(&config.keyspace)));
    let store = SpanStore::new(session.clone(), config).expect("store over a complete keyspace");
    (session, store)
}

/// Default configuration: strict trace ids, search enabled, multiplier 3
pub fn store() -> (Arc<MemorySession>, SpanStore) {
    store_with(StoreConfig::default())
}

/// Store with a specific index fetch multiplier
pub fn store_with_multiplier(multiplier: usize) -> (Arc<MemorySession>, SpanStore) {
    store_with(StoreConfig {
        index_fetch_multiplier: multiplier,
        ..StoreConfig::default()
    })
}

/// Store matching traces on the lower 64 bits of their ids
pub fn relaxed_store() -> (Arc<MemorySession>, SpanStore) {
    store_with(StoreConfig {
        strict_trace_id: false,
        ..StoreConfig::default()
    })
}

/// Store that writes no search indexes
pub fn unindexed_store() -> (Arc<MemorySession>, SpanStore) {
    store_with(StoreConfig {
        search_enabled: false,
        ..StoreConfig::default()
    })
}

/// Midnight of `day` in epoch milliseconds
pub fn midnight(day: i64) -> i64 {
    DayKey::from_epoch_day(day).unwrap().midnight_millis()
}

/// Last millisecond of `day`
pub fn end_of_day(day: i64) -> i64 {
    midnight(day + 1) - 1
}

/// Microsecond timestamp `offset_ms` milliseconds into `day`
pub fn micros_into(day: i64, offset_ms: i64) -> i64 {
    (midnight(day) + offset_ms) * 1_000
}

/// A server span with service, name and timing
pub fn span(trace_id: TraceId, id: u64, service: &str, name: &str, ts_micros: i64) -> Span {
    Span::new(trace_id, id)
        .with_local_service(service)
        .with_name(name)
        .with_timing(ts_micros, 100)
}

/// Search request over `DAY` for `service`
pub fn request_for(service: &str, limit: usize) -> spanstore::QueryRequestBuilder {
    QueryRequest::builder()
        .service_name(service)
        .end_ts(end_of_day(DAY))
        .lookback(DAY_MILLIS)
        .limit(limit)
}

/// Write spans and wait for every row
pub async fn accept(store: &SpanStore, spans: &[Span]) {
    store.accept(spans).unwrap().run().await.unwrap();
}
