//! In-memory session
//!
//! A [`Session`] over `BTreeMap`s guarded by `parking_lot::RwLock`, used by
//! the test suites and for embedding without a database.
//!
//! # Semantics
//!
//! - Rows are keyed by primary key; inserting an existing key overwrites the
//!   written columns (upsert)
//! - Results are ordered by partition key, then clustering columns in their
//!   declared order, and `LIMIT` applies after every restriction
//! - Restricting a column that is neither a key nor indexed requires
//!   `ALLOW FILTERING`; `LIKE` requires an index
//!
//! # Test hooks
//!
//! - `with_latency` / `set_latency`: delay every statement
//! - `fail_table`: make every statement against a table fail
//! - `executed_count` / `executed_count_for`: statements executed so far

use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::trace;

use spanstore_core::{SessionError, SessionResult};

use crate::query::{Insert, Predicate, Restriction, Select, Statement};
use crate::schema::{ClusteringOrder, Keyspace, TableSchema};
use crate::session::Session;
use crate::statement::{BoundStatement, PreparedStatement};
use crate::value::{ResultSet, Row, Value};

type PrimaryKey = Vec<Value>;
type Table = BTreeMap<PrimaryKey, Row>;

/// Session backed by process memory
#[derive(Debug)]
pub struct MemorySession {
    keyspace: Keyspace,
    tables: RwLock<BTreeMap<String, Table>>,
    latency: Mutex<Option<Duration>>,
    faults: RwLock<BTreeMap<String, SessionError>>,
    executed: AtomicUsize,
    executed_by_table: Mutex<BTreeMap<String, usize>>,
}

impl MemorySession {
    /// Create an empty session over `keyspace`
    pub fn new(keyspace: Keyspace) -> Self {
        MemorySession {
            keyspace,
            tables: RwLock::new(BTreeMap::new()),
            latency: Mutex::new(None),
            faults: RwLock::new(BTreeMap::new()),
            executed: AtomicUsize::new(0),
            executed_by_table: Mutex::new(BTreeMap::new()),
        }
    }

    /// Delay every statement by `latency`
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(Some(latency));
        self
    }

    /// Change or clear the per-statement delay
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Fail every subsequent statement against `table` with `error`
    pub fn fail_table(&self, table: &str, error: SessionError) {
        self.faults.write().insert(table.to_string(), error);
    }

    /// Remove all injected failures
    pub fn clear_faults(&self) {
        self.faults.write().clear();
    }

    /// Statements executed so far, including failed ones
    pub fn executed_count(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    /// Statements executed so far against one table
    pub fn executed_count_for(&self, table: &str) -> usize {
        self.executed_by_table
            .lock()
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    /// Rows currently stored in `table`
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }

    /// The keyspace this session serves
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    fn schema(&self, table: &str) -> SessionResult<&TableSchema> {
        self.keyspace
            .table(table)
            .ok_or_else(|| SessionError::UnknownTable(format!("{}.{}", self.keyspace.name(), table)))
    }

    fn validate(&self, statement: &Statement) -> SessionResult<()> {
        let schema = self.schema(statement.table())?;
        let unknown = |column: &str| {
            SessionError::InvalidQuery(format!(
                "undefined column '{}' in table {}",
                column,
                schema.name()
            ))
        };

        match statement {
            Statement::Select(select) => {
                if let Some(column) = select.projection().iter().find(|c| !schema.has_column(c)) {
                    return Err(unknown(column));
                }
                for Predicate { column, restriction } in select.predicates() {
                    if !schema.has_column(column) {
                        return Err(unknown(column));
                    }
                    if *restriction == Restriction::Like && !schema.is_indexed(column) {
                        return Err(SessionError::InvalidQuery(format!(
                            "LIKE restriction on '{}' requires an index",
                            column
                        )));
                    }
                    let served = schema.is_key(column) || schema.is_indexed(column);
                    if !served && !select.filtering_allowed() {
                        return Err(SessionError::InvalidQuery(format!(
                            "restriction on '{}' requires ALLOW FILTERING",
                            column
                        )));
                    }
                }
            }
            Statement::Insert(insert) => {
                if let Some(column) = insert.columns().iter().find(|c| !schema.has_column(c)) {
                    return Err(unknown(column));
                }
                if let Some(key) = schema
                    .primary_key()
                    .find(|key| !insert.columns().iter().any(|c| c.as_str() == *key))
                {
                    return Err(SessionError::InvalidQuery(format!(
                        "missing primary key column '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn select(&self, select: &Select, values: &[Value]) -> SessionResult<ResultSet> {
        let schema = self.schema(select.table())?;
        let predicates = select.predicates();
        for (predicate, value) in predicates.iter().zip(values) {
            check_bound_value(predicate, value)?;
        }
        let limit = if select.has_limit() {
            bound_limit(values.last())?
        } else {
            usize::MAX
        };

        let tables = self.tables.read();
        let mut matched: Vec<&Row> = tables
            .get(select.table())
            .map(|table| {
                table
                    .values()
                    .filter(|row| {
                        predicates
                            .iter()
                            .zip(values)
                            .all(|(predicate, value)| matches(row, predicate, value))
                    })
                    .collect()
            })
            .unwrap_or_default();
        matched.sort_by(|a, b| compare_rows(schema, a, b));

        let rows = matched
            .into_iter()
            .take(limit)
            .map(|row| {
                if select.projection().is_empty() {
                    row.clone()
                } else {
                    row.project(select.projection())
                }
            })
            .collect();
        Ok(ResultSet::new(rows))
    }

    fn insert(&self, insert: &Insert, values: &[Value]) -> SessionResult<ResultSet> {
        let schema = self.schema(insert.table())?;
        let mut row = Row::new();
        for (column, value) in insert.columns().iter().zip(values) {
            row.set(column.clone(), value.clone());
        }

        let key: PrimaryKey = schema.primary_key().map(|c| row.value(c).clone()).collect();
        if key.iter().any(Value::is_null) {
            return Err(SessionError::InvalidQuery(format!(
                "null primary key value in {}",
                insert.table()
            )));
        }

        self.tables
            .write()
            .entry(insert.table().to_string())
            .or_default()
            .entry(key)
            .or_default()
            .merge(row);
        Ok(ResultSet::empty())
    }
}

fn check_bound_value(predicate: &Predicate, value: &Value) -> SessionResult<()> {
    match (predicate.restriction, value) {
        (Restriction::In, Value::List(_)) | (Restriction::Like, Value::Text(_)) => Ok(()),
        (Restriction::In, other) => Err(SessionError::InvalidQuery(format!(
            "IN on '{}' expects a list, got {}",
            predicate.column,
            other.type_name()
        ))),
        (Restriction::Like, other) => Err(SessionError::InvalidQuery(format!(
            "LIKE on '{}' expects text, got {}",
            predicate.column,
            other.type_name()
        ))),
        _ => Ok(()),
    }
}

fn bound_limit(value: Option<&Value>) -> SessionResult<usize> {
    match value {
        Some(Value::BigInt(n)) if *n > 0 => usize::try_from(*n)
            .map_err(|_| SessionError::InvalidQuery(format!("LIMIT {} out of range", n))),
        Some(other) => Err(SessionError::InvalidQuery(format!(
            "LIMIT must be a positive bigint, got {:?}",
            other
        ))),
        None => Err(SessionError::InvalidQuery("LIMIT is not bound".to_string())),
    }
}

fn matches(row: &Row, predicate: &Predicate, bound: &Value) -> bool {
    let stored = row.value(&predicate.column);
    match (predicate.restriction, bound) {
        (Restriction::Eq, _) => stored == bound,
        (Restriction::In, Value::List(items)) => items.contains(stored),
        (Restriction::Gte, _) => !stored.is_null() && stored >= bound,
        (Restriction::Lte, _) => !stored.is_null() && stored <= bound,
        (Restriction::Like, Value::Text(pattern)) => match stored {
            Value::Text(text) => like_matches(text, pattern),
            _ => false,
        },
        _ => false,
    }
}

/// `%` at either end of `pattern` matches any run of characters
fn like_matches(text: &str, pattern: &str) -> bool {
    let (leading, rest) = match pattern.strip_prefix('%') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let (trailing, needle) = match rest.strip_suffix('%') {
        Some(needle) => (true, needle),
        None => (false, rest),
    };
    match (leading, trailing) {
        (true, true) => text.contains(needle),
        (true, false) => text.ends_with(needle),
        (false, true) => text.starts_with(needle),
        (false, false) => text == needle,
    }
}

fn compare_rows(schema: &TableSchema, a: &Row, b: &Row) -> CmpOrdering {
    for column in schema.partition_columns() {
        let ordering = a.value(column).cmp(b.value(column));
        if ordering != CmpOrdering::Equal {
            return ordering;
        }
    }
    for (column, order) in schema.clustering_columns() {
        let ordering = a.value(column).cmp(b.value(column));
        let ordering = match order {
            ClusteringOrder::Asc => ordering,
            ClusteringOrder::Desc => ordering.reverse(),
        };
        if ordering != CmpOrdering::Equal {
            return ordering;
        }
    }
    CmpOrdering::Equal
}

#[async_trait::async_trait]
impl Session for MemorySession {
    fn prepare(&self, statement: Statement) -> SessionResult<PreparedStatement> {
        self.validate(&statement)?;
        Ok(PreparedStatement::new(statement))
    }

    async fn execute(&self, statement: BoundStatement) -> SessionResult<ResultSet> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let table = statement.statement().table().to_string();
        self.executed.fetch_add(1, Ordering::SeqCst);
        *self.executed_by_table.lock().entry(table.clone()).or_insert(0) += 1;
        trace!(target: "spanstore::session", statement = %statement, "Executing statement");

        if let Some(error) = self.faults.read().get(&table).cloned() {
            return Err(error);
        }

        self.validate(statement.statement())?;
        match statement.statement() {
            Statement::Select(select) => self.select(select, statement.values()),
            Statement::Insert(insert) => self.insert(insert, statement.values()),
        }
    }
}
