//! The span store
//!
//! `SpanStore` owns one factory per query family. Factories prepare their
//! statements once at construction and are shared, read-only, by every call
//! they create. Each operation returns an unexecuted [`Call`]; nothing
//! touches the session until the caller executes it.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use spanstore_call::Call;
use spanstore_core::{
    DayKey, DependencyLink, Error, QueryRequest, Result, Span, StoreConfig, TraceId,
    MAX_LOOKBACK_MS,
};
use spanstore_session::{PreparedStatement, ResultSetCall, Session};

use crate::consumer::SpanConsumer;
use crate::dependencies::{self, InsertDependencies};
use crate::{names, search, trace};

/// Span, trace and dependency storage over a database session
pub struct SpanStore {
    config: StoreConfig,
    session: Arc<dyn Session>,
    dependencies: dependencies::Factory,
    insert_dependencies: PreparedStatement,
    search: search::Factory,
    traces: Arc<trace::Factory>,
    names: names::Factory,
    consumer: SpanConsumer,
}

impl SpanStore {
    /// Validate `config` and prepare every statement
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the config is invalid
    /// - `Error::Upstream` if the session rejects a statement, e.g. because
    ///   the keyspace lacks a table
    pub fn new(session: Arc<dyn Session>, config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let store = SpanStore {
            dependencies: dependencies::Factory::new(Arc::clone(&session))?,
            insert_dependencies: InsertDependencies::prepare(session.as_ref())?,
            search: search::Factory::new(
                Arc::clone(&session),
                config.index_fetch_multiplier,
                config.strict_trace_id,
            )?,
            traces: Arc::new(trace::Factory::new(Arc::clone(&session), config.max_trace_cols)?),
            names: names::Factory::new(Arc::clone(&session))?,
            consumer: SpanConsumer::new(
                Arc::clone(&session),
                config.strict_trace_id,
                config.search_enabled,
            )?,
            session,
            config,
        };

        info!(
            target: "spanstore::store",
            keyspace = %store.config.keyspace,
            strict_trace_id = store.config.strict_trace_id,
            search_enabled = store.config.search_enabled,
            index_fetch_multiplier = store.config.index_fetch_multiplier,
            "Span store ready"
        );
        Ok(store)
    }

    /// Open with the config file at `path`, creating a default one if missing
    pub fn open(session: Arc<dyn Session>, path: &Path) -> Result<Self> {
        StoreConfig::write_default_if_missing(path)?;
        Self::new(session, StoreConfig::from_file(path)?)
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Dependency links observed in `[end_ts - lookback, end_ts]`, merged
    ///
    /// # Arguments
    /// * `end_ts` - window end, epoch milliseconds
    /// * `lookback` - window length in milliseconds; `None` uses
    ///   `default_lookback_ms`
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` if `end_ts` or `lookback` is not positive, or
    /// `lookback` exceeds [`MAX_LOOKBACK_MS`].
    pub fn select_dependencies(
        &self,
        end_ts: i64,
        lookback: Option<i64>,
    ) -> Result<Call<Vec<DependencyLink>>> {
        if end_ts <= 0 {
            return Err(Error::invalid_input("endTs should be positive, in epoch milliseconds"));
        }
        let lookback = lookback.unwrap_or(self.config.default_lookback_ms);
        if lookback <= 0 {
            return Err(Error::invalid_input("lookback should be positive, in milliseconds"));
        }
        if lookback > MAX_LOOKBACK_MS {
            return Err(Error::invalid_input(format!(
                "lookback should be at most {} milliseconds",
                MAX_LOOKBACK_MS
            )));
        }
        Ok(self.dependencies.create(end_ts, lookback))
    }

    /// Store the pre-aggregated links of one day, replacing that day's batch
    pub fn insert_dependencies(&self, day: DayKey, links: &[DependencyLink]) -> Result<Call<()>> {
        let insert = InsertDependencies::new(
            Arc::clone(&self.session),
            self.insert_dependencies.clone(),
            day,
            links,
        )?;
        Ok(insert.into_call())
    }

    /// Ids of traces matching `request`, newest first
    ///
    /// Empty without touching the session when search is disabled.
    pub fn search_traces(&self, request: &QueryRequest) -> Call<Vec<TraceId>> {
        if !self.config.search_enabled {
            return Call::ready(Vec::new());
        }
        self.search.create(request)
    }

    /// Spans of one trace ordered by timestamp
    ///
    /// `strict` requires all 128 bits to match; otherwise spans sharing the
    /// lower 64 bits of `trace_id` are included.
    pub fn get_trace(&self, trace_id: TraceId, strict: bool) -> Call<Vec<Span>> {
        self.traces.create(trace_id, strict)
    }

    /// Traces matching `request`, newest first, omitting traces with no spans
    pub fn get_traces(&self, request: &QueryRequest) -> Call<Vec<Vec<Span>>> {
        if !self.config.search_enabled {
            return Call::ready(Vec::new());
        }
        let traces = Arc::clone(&self.traces);
        let strict = self.config.strict_trace_id;
        self.search
            .create(request)
            .flat_map(move |ids| fetch_traces(&traces, &ids, strict))
    }

    /// Traces for `ids` in request order, omitting unknown ids
    ///
    /// Ids that name the same trace under the configured strictness are
    /// fetched once.
    pub fn get_traces_by_ids(&self, ids: &[TraceId]) -> Call<Vec<Vec<Span>>> {
        let strict = self.config.strict_trace_id;
        let mut seen = BTreeSet::new();
        let unique: Vec<TraceId> = ids
            .iter()
            .copied()
            .filter(|id| seen.insert(id.grouping_key(strict)))
            .collect();
        fetch_traces(&self.traces, &unique, strict)
    }

    /// Sorted names of services that reported spans
    pub fn get_service_names(&self) -> Call<Vec<String>> {
        if !self.config.search_enabled {
            return Call::ready(Vec::new());
        }
        self.names.service_names()
    }

    /// Sorted span names reported by `service`
    pub fn get_span_names(&self, service: &str) -> Call<Vec<String>> {
        if !self.config.search_enabled {
            return Call::ready(Vec::new());
        }
        self.names.span_names(service)
    }

    /// Write spans and, when search is enabled, their index rows
    pub fn accept(&self, spans: &[Span]) -> Result<Call<()>> {
        self.consumer.accept(spans)
    }
}

fn fetch_traces(traces: &trace::Factory, ids: &[TraceId], strict: bool) -> Call<Vec<Vec<Span>>> {
    let calls = ids.iter().map(|id| traces.create(*id, strict)).collect();
    Call::fan_out(calls).map(|traces| traces.into_iter().filter(|t| !t.is_empty()).collect())
}
