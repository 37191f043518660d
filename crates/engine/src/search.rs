//! Trace search over the index tables
//!
//! Index tables hold one row per span, so a trace with many spans occupies
//! many index rows. Reading exactly `limit` rows would often yield fewer than
//! `limit` distinct traces; every index read therefore fetches
//! `limit * index_fetch_multiplier` rows and the distinct traces are
//! collapsed afterwards.
//!
//! Read paths:
//!
//! - service name without annotation terms: one `trace_by_service_span` read
//!   per day in the window, results unioned
//! - at most one annotation term: a single `span` read with every restriction
//!   applied before `LIMIT`
//! - several terms: one `span` read per term yields candidate traces; each
//!   term is then checked again against all candidates with a read bounded
//!   by `trace_id IN ?` instead of `LIMIT`, and those results are intersected
//!
//! Collapsed traces are ordered newest first and cut to `limit`.

use futures::future::BoxFuture;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use spanstore_call::Call;
use spanstore_core::{
    annotation_query_pattern, DayKey, QueryRequest, Result, SessionResult, TraceId,
};
use spanstore_session::{
    bind_and_issue, PreparedStatement, ResultSet, ResultSetCall, Select, Session, Value,
};

use crate::schema::{
    stored_trace_id, COL_ANNOTATION_QUERY, COL_DAY, COL_DURATION, COL_LOCAL_SERVICE, COL_NAME,
    COL_SERVICE, COL_SPAN, COL_TRACE_ID, COL_TRACE_ID_HIGH, COL_TS, TABLE_SPAN,
    TABLE_TRACE_BY_SERVICE_SPAN,
};

/// Stored trace ids returned by one index read, each with its newest
/// timestamp in epoch microseconds
pub type TraceHits = BTreeMap<TraceId, i64>;

// Restriction bits of a span table read
const SERVICE: usize = 1;
const SPAN: usize = 1 << 1;
const TERM: usize = 1 << 2;
const MIN_DURATION: usize = 1 << 3;
const MAX_DURATION: usize = 1 << 4;
const CANDIDATES: usize = 1 << 5;
const SPAN_SHAPES: usize = 1 << 6;

/// A validated request plus the over-fetch policy applied to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    request: QueryRequest,
    fetch_size: usize,
    strict: bool,
}

impl SearchPlan {
    /// Plan `request` reading `limit * multiplier` rows per index read
    pub fn new(request: QueryRequest, multiplier: usize, strict: bool) -> Self {
        let fetch_size = request.limit().saturating_mul(multiplier.max(1));
        SearchPlan {
            request,
            fetch_size,
            strict,
        }
    }

    /// The request being planned
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    /// Rows requested from each index read
    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    /// True if the plan reads `trace_by_service_span` rather than `span`
    pub fn uses_service_index(&self) -> bool {
        self.request.service_name().is_some() && self.request.annotation_query().is_empty()
    }

    fn start_micros(&self) -> i64 {
        self.request.start_ts().saturating_mul(1_000)
    }

    fn end_micros(&self) -> i64 {
        self.request.end_ts().saturating_mul(1_000)
    }

    fn limit_value(&self) -> Value {
        Value::BigInt(i64::try_from(self.fetch_size).unwrap_or(i64::MAX))
    }

    fn duration_values(&self, values: &mut Vec<Value>) {
        if let Some(min) = self.request.min_duration() {
            values.push(min.into());
        }
        if let Some(max) = self.request.max_duration() {
            values.push(max.into());
        }
    }
}

/// Intersect per-read hits, order newest first and keep `limit`
///
/// A trace appears in the result only if every group contains it; its
/// timestamp is the newest seen in any group. Ties order by trace id.
pub fn reconcile(groups: Vec<TraceHits>, limit: usize) -> Vec<TraceId> {
    let mut groups = groups.into_iter();
    let Some(mut survivors) = groups.next() else {
        return Vec::new();
    };
    for group in groups {
        survivors = survivors
            .into_iter()
            .filter_map(|(id, ts)| group.get(&id).map(|other| (id, ts.max(*other))))
            .collect();
    }

    let mut ordered: Vec<(TraceId, i64)> = survivors.into_iter().collect();
    ordered.sort_by(|(a_id, a_ts), (b_id, b_ts)| b_ts.cmp(a_ts).then(a_id.cmp(b_id)));
    ordered.truncate(limit);
    ordered.into_iter().map(|(id, _)| id).collect()
}

/// Merge hits from several reads of the same index
fn union(pages: Vec<TraceHits>) -> TraceHits {
    let mut merged = TraceHits::new();
    for page in pages {
        for (id, ts) in page {
            record(&mut merged, id, ts);
        }
    }
    merged
}

/// Collapse stored ids onto their grouping key
fn regroup(hits: TraceHits, strict: bool) -> TraceHits {
    let mut grouped = TraceHits::new();
    for (id, ts) in hits {
        record(&mut grouped, id.grouping_key(strict), ts);
    }
    grouped
}

fn record(hits: &mut TraceHits, id: TraceId, ts: i64) {
    let newest = hits.entry(id).or_insert(ts);
    if ts > *newest {
        *newest = ts;
    }
}

/// `span` partitions that may hold spans of the given stored ids
fn partition_keys(hits: &TraceHits) -> Vec<String> {
    let keys: BTreeSet<String> = hits.keys().flat_map(TraceId::lookup_keys).collect();
    keys.into_iter().collect()
}

fn select_from_service_span(min_duration: bool, max_duration: bool) -> Select {
    let mut select = Select::from(TABLE_TRACE_BY_SERVICE_SPAN)
        .columns([COL_TRACE_ID, COL_TS])
        .where_eq(COL_SERVICE)
        .where_eq(COL_SPAN)
        .where_eq(COL_DAY)
        .where_gte(COL_TS)
        .where_lte(COL_TS);
    if min_duration {
        select = select.where_gte(COL_DURATION);
    }
    if max_duration {
        select = select.where_lte(COL_DURATION);
    }
    select.limit_marker()
}

fn select_from_span(shape: usize) -> Select {
    let mut select =
        Select::from(TABLE_SPAN).columns([COL_TRACE_ID, COL_TRACE_ID_HIGH, COL_TS]);
    if shape & CANDIDATES != 0 {
        select = select.where_in(COL_TRACE_ID);
    }
    if shape & SERVICE != 0 {
        select = select.where_eq(COL_LOCAL_SERVICE);
    }
    if shape & SPAN != 0 {
        select = select.where_eq(COL_NAME);
    }
    if shape & TERM != 0 {
        select = select.where_like(COL_ANNOTATION_QUERY);
    }
    if shape & MIN_DURATION != 0 {
        select = select.where_gte(COL_DURATION);
    }
    if shape & MAX_DURATION != 0 {
        select = select.where_lte(COL_DURATION);
    }
    select = select.where_gte(COL_TS).where_lte(COL_TS);
    // Candidate reads are bounded by the IN list
    if shape & CANDIDATES == 0 {
        select = select.limit_marker();
    }
    select.allow_filtering()
}

fn duration_shape(request: &QueryRequest) -> usize {
    let mut shape = 0;
    if request.min_duration().is_some() {
        shape |= MIN_DURATION;
    }
    if request.max_duration().is_some() {
        shape |= MAX_DURATION;
    }
    shape
}

/// Prepares every search statement variant once and plans searches
pub struct Factory {
    session: Arc<dyn Session>,
    multiplier: usize,
    strict: bool,
    // Indexed by duration bits shifted down to 0..4
    service_span: Vec<PreparedStatement>,
    // Indexed by restriction bits
    span: Arc<Vec<PreparedStatement>>,
}

impl Factory {
    /// Prepare the index statements
    ///
    /// # Arguments
    /// * `session` - session to prepare and execute on
    /// * `multiplier` - index rows read per requested trace
    /// * `strict` - distinguish traces by all 128 bits of their id
    pub fn new(session: Arc<dyn Session>, multiplier: usize, strict: bool) -> Result<Self> {
        let mut service_span = Vec::with_capacity(4);
        for bits in 0..4usize {
            let select = select_from_service_span(bits & 1 != 0, bits & 2 != 0);
            service_span.push(session.prepare(select.into())?);
        }
        let mut span = Vec::with_capacity(SPAN_SHAPES);
        for shape in 0..SPAN_SHAPES {
            span.push(session.prepare(select_from_span(shape).into())?);
        }

        Ok(Factory {
            session,
            multiplier,
            strict,
            service_span,
            span: Arc::new(span),
        })
    }

    /// Plan a search with this factory's over-fetch policy
    pub fn plan(&self, request: &QueryRequest) -> SearchPlan {
        SearchPlan::new(request.clone(), self.multiplier, self.strict)
    }

    /// Trace ids matching `request`, newest first, at most `limit`
    pub fn create(&self, request: &QueryRequest) -> Call<Vec<TraceId>> {
        let plan = Arc::new(self.plan(request));

        if plan.uses_service_index() {
            let days = DayKey::window(request.end_ts(), Some(request.lookback()));
            let branches: Vec<Call<TraceHits>> = days
                .into_iter()
                .rev()
                .map(|day| self.service_span_read(&plan, day))
                .collect();
            debug!(
                target: "spanstore::search",
                service = request.service_name().unwrap_or_default(),
                days = branches.len(),
                fetch_size = plan.fetch_size(),
                "Searching service index"
            );
            return Call::fan_out(branches).map(move |pages| finish(vec![union(pages)], &plan));
        }

        let reads = SpanReads {
            session: Arc::clone(&self.session),
            statements: Arc::clone(&self.span),
            plan: Arc::clone(&plan),
        };
        let mut terms = request.annotation_terms();
        debug!(
            target: "spanstore::search",
            terms = terms.len(),
            fetch_size = plan.fetch_size(),
            "Searching span table"
        );
        if terms.len() < 2 {
            return reads
                .read(terms.pop(), None)
                .map(move |hits| finish(vec![hits], &plan));
        }

        let candidates: Vec<Call<TraceHits>> = terms
            .iter()
            .map(|term| reads.read(Some(term.clone()), None))
            .collect();
        Call::fan_out(candidates).flat_map(move |groups| {
            let keys = partition_keys(&union(groups));
            if keys.is_empty() {
                return Call::ready(Vec::new());
            }
            debug!(
                target: "spanstore::search",
                partitions = keys.len(),
                terms = terms.len(),
                "Checking every term against candidate traces"
            );
            let keys = Arc::new(keys);
            let checks: Vec<Call<TraceHits>> = terms
                .iter()
                .map(|term| reads.read(Some(term.clone()), Some(Arc::clone(&keys))))
                .collect();
            let plan = Arc::clone(&plan);
            Call::fan_out(checks).map(move |groups| finish(groups, &plan))
        })
    }

    fn service_span_read(&self, plan: &Arc<SearchPlan>, day: DayKey) -> Call<TraceHits> {
        let shape = duration_shape(plan.request()) >> 3;
        SelectTraceIdsFromServiceSpan {
            session: Arc::clone(&self.session),
            prepared: self.service_span[shape].clone(),
            plan: Arc::clone(plan),
            day,
        }
        .into_call()
    }
}

/// Span table reads of one search, shared by both stages of a multi-term
/// search
struct SpanReads {
    session: Arc<dyn Session>,
    statements: Arc<Vec<PreparedStatement>>,
    plan: Arc<SearchPlan>,
}

impl SpanReads {
    fn read(&self, term: Option<String>, candidates: Option<Arc<Vec<String>>>) -> Call<TraceHits> {
        let request = self.plan.request();
        let mut shape = duration_shape(request);
        if request.service_name().is_some() {
            shape |= SERVICE;
        }
        if request.span_name().is_some() {
            shape |= SPAN;
        }
        if term.is_some() {
            shape |= TERM;
        }
        if candidates.is_some() {
            shape |= CANDIDATES;
        }
        SelectTraceIdsFromSpan {
            session: Arc::clone(&self.session),
            prepared: self.statements[shape].clone(),
            plan: Arc::clone(&self.plan),
            term,
            candidates,
        }
        .into_call()
    }
}

fn finish(groups: Vec<TraceHits>, plan: &SearchPlan) -> Vec<TraceId> {
    let limit = plan.request().limit();
    let groups = groups
        .into_iter()
        .map(|group| regroup(group, plan.strict))
        .collect();
    let found = reconcile(groups, limit);
    if found.len() < limit {
        debug!(
            target: "spanstore::search",
            found = found.len(),
            limit,
            "Search returned fewer traces than requested"
        );
    }
    found
}

/// One day of `trace_by_service_span` for a service and span name
pub struct SelectTraceIdsFromServiceSpan {
    session: Arc<dyn Session>,
    prepared: PreparedStatement,
    plan: Arc<SearchPlan>,
    day: DayKey,
}

impl SelectTraceIdsFromServiceSpan {
    fn span_name(&self) -> &str {
        self.plan.request().span_name().unwrap_or_default()
    }
}

impl ResultSetCall for SelectTraceIdsFromServiceSpan {
    type Output = TraceHits;

    fn new_future(&self) -> BoxFuture<'static, SessionResult<ResultSet>> {
        let request = self.plan.request();
        let mut values = vec![
            Value::from(request.service_name().unwrap_or_default()),
            Value::from(self.span_name()),
            Value::from(self.day),
            Value::from(self.plan.start_micros()),
            Value::from(self.plan.end_micros()),
        ];
        self.plan.duration_values(&mut values);
        values.push(self.plan.limit_value());
        bind_and_issue(&self.session, &self.prepared, values)
    }

    fn map(&self, rows: ResultSet) -> Result<TraceHits> {
        let mut hits = TraceHits::new();
        for row in &rows {
            let id = TraceId::parse(row.get_text(COL_TRACE_ID)?)?;
            record(&mut hits, id, row.get_bigint(COL_TS)?);
        }
        Ok(hits)
    }
}

impl fmt::Display for SelectTraceIdsFromServiceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SelectTraceIdsFromServiceSpan{{service={}, span={}, day={}, limit={}}}",
            self.plan.request().service_name().unwrap_or_default(),
            self.span_name(),
            self.day,
            self.plan.fetch_size()
        )
    }
}

/// One read of the `span` table, optionally for a single annotation term
///
/// With `candidates` the read covers only those partitions and carries no
/// `LIMIT`.
pub struct SelectTraceIdsFromSpan {
    session: Arc<dyn Session>,
    prepared: PreparedStatement,
    plan: Arc<SearchPlan>,
    term: Option<String>,
    candidates: Option<Arc<Vec<String>>>,
}

impl ResultSetCall for SelectTraceIdsFromSpan {
    type Output = TraceHits;

    fn new_future(&self) -> BoxFuture<'static, SessionResult<ResultSet>> {
        let request = self.plan.request();
        let mut values = Vec::new();
        if let Some(candidates) = &self.candidates {
            values.push(Value::list(candidates.iter().cloned()));
        }
        if let Some(service) = request.service_name() {
            values.push(Value::from(service));
        }
        if let Some(span) = request.span_name() {
            values.push(Value::from(span));
        }
        if let Some(term) = &self.term {
            values.push(Value::from(annotation_query_pattern(term)));
        }
        self.plan.duration_values(&mut values);
        values.push(Value::from(self.plan.start_micros()));
        values.push(Value::from(self.plan.end_micros()));
        if self.candidates.is_none() {
            values.push(self.plan.limit_value());
        }
        bind_and_issue(&self.session, &self.prepared, values)
    }

    fn map(&self, rows: ResultSet) -> Result<TraceHits> {
        let mut hits = TraceHits::new();
        for row in &rows {
            record(&mut hits, stored_trace_id(row)?, row.get_bigint(COL_TS)?);
        }
        Ok(hits)
    }
}

impl fmt::Display for SelectTraceIdsFromSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request = self.plan.request();
        write!(
            f,
            "SelectTraceIdsFromSpan{{service={}, span={}, term={}, ",
            request.service_name().unwrap_or_default(),
            request.span_name().unwrap_or_default(),
            self.term.as_deref().unwrap_or_default(),
        )?;
        match &self.candidates {
            Some(candidates) => write!(f, "candidates={}}}", candidates.len()),
            None => write!(f, "limit={}}}", self.plan.fetch_size()),
        }
    }
}
