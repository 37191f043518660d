//! Opening a store from configuration

use std::sync::Arc;
use tempfile::TempDir;

use spanstore::prelude::*;
use spanstore::{Keyspace, CONFIG_FILE_NAME};

#[test]
fn test_open_creates_default_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    let session = Arc::new(MemorySession::new(schema::keyspace("zipkin2")));

    let store = SpanStore::open(session, &path).unwrap();
    assert!(path.exists());
    assert_eq!(store.config(), &StoreConfig::default());
}

#[test]
fn test_open_reads_existing_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "strict_trace_id = false\nindex_fetch_multiplier = 5\n").unwrap();
    let session = Arc::new(MemorySession::new(schema::keyspace("zipkin2")));

    let store = SpanStore::open(session, &path).unwrap();
    assert!(!store.config().strict_trace_id);
    assert_eq!(store.config().index_fetch_multiplier, 5);
    assert!(store.config().search_enabled);
}

#[test]
fn test_invalid_config_rejected() {
    let session = Arc::new(MemorySession::new(schema::keyspace("zipkin2")));
    let config = StoreConfig {
        index_fetch_multiplier: 0,
        ..StoreConfig::default()
    };
    assert!(matches!(SpanStore::new(session, config), Err(Error::Config(_))));
}

#[test]
fn test_malformed_config_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "max_trace_cols = \"many\"\n").unwrap();
    let session = Arc::new(MemorySession::new(schema::keyspace("zipkin2")));

    assert!(matches!(SpanStore::open(session, &path), Err(Error::Config(_))));
}

#[test]
fn test_missing_tables_fail_preparation() {
    let session = Arc::new(MemorySession::new(Keyspace::new("zipkin2")));
    let result = SpanStore::new(session, StoreConfig::default());
    assert!(matches!(
        result,
        Err(Error::Upstream(SessionError::UnknownTable(_)))
    ));
}
