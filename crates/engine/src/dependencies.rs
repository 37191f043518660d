//! Dependency link reads and writes
//!
//! Links are aggregated per UTC day elsewhere and stored as one encoded
//! batch per day. Reading a window selects every day's batch in a single
//! statement, decodes each batch inside the call and merges the links by
//! `(parent, child)`, summing call and error counts.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use spanstore_call::Call;
use spanstore_core::{decode_batch, encode_batch, DayKey, DependencyLink, Result, SessionResult};
use spanstore_session::{
    bind_and_issue, Insert, PreparedStatement, ResultSet, ResultSetCall, Select, Session, Value,
};

use crate::schema::{COL_DAY, COL_LINKS, TABLE_DEPENDENCY};

/// Reads and merges the link batches of a set of days
pub struct SelectDependencies {
    session: Arc<dyn Session>,
    prepared: PreparedStatement,
    days: Vec<DayKey>,
}

/// Prepares the dependency select once and creates calls from it
pub struct Factory {
    session: Arc<dyn Session>,
    prepared: PreparedStatement,
}

impl Factory {
    /// Prepare `SELECT links FROM dependency WHERE day IN ?`
    ///
    /// # Errors
    ///
    /// `Error::Upstream` if the session rejects the statement.
    pub fn new(session: Arc<dyn Session>) -> Result<Self> {
        let prepared = session.prepare(
            Select::from(TABLE_DEPENDENCY)
                .column(COL_LINKS)
                .where_in(COL_DAY)
                .into(),
        )?;
        Ok(Factory { session, prepared })
    }

    /// Links observed in `[end_ts - lookback, end_ts]`, merged
    ///
    /// # Arguments
    /// * `end_ts` - window end, epoch milliseconds
    /// * `lookback` - window length in milliseconds
    pub fn create(&self, end_ts: i64, lookback: i64) -> Call<Vec<DependencyLink>> {
        let days = DayKey::window(end_ts, Some(lookback));
        if days.is_empty() {
            return Call::ready(Vec::new());
        }
        SelectDependencies {
            session: Arc::clone(&self.session),
            prepared: self.prepared.clone(),
            days,
        }
        .into_call()
    }
}

impl ResultSetCall for SelectDependencies {
    type Output = Vec<DependencyLink>;

    fn new_future(&self) -> BoxFuture<'static, SessionResult<ResultSet>> {
        let days = Value::list(self.days.iter().copied());
        bind_and_issue(&self.session, &self.prepared, vec![days])
    }

    fn map(&self, rows: ResultSet) -> Result<Vec<DependencyLink>> {
        let mut unmerged = Vec::new();
        for row in &rows {
            unmerged.extend(decode_batch(row.get_blob(COL_LINKS)?)?);
        }
        let merged = DependencyLink::merge(unmerged);
        debug!(
            target: "spanstore::deps",
            days = self.days.len(),
            batches = rows.len(),
            links = merged.len(),
            "Dependencies merged"
        );
        Ok(merged)
    }
}

impl fmt::Display for SelectDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SelectDependencies{days=[")?;
        for (i, day) in self.days.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", day)?;
        }
        f.write_str("]}")
    }
}

/// Writes one day's link batch, replacing any batch already stored
pub struct InsertDependencies {
    session: Arc<dyn Session>,
    prepared: PreparedStatement,
    day: DayKey,
    links: Vec<u8>,
    count: usize,
}

impl InsertDependencies {
    /// Prepare `INSERT INTO dependency (day,links) VALUES (?,?)`
    pub fn prepare(session: &dyn Session) -> Result<PreparedStatement> {
        Ok(session.prepare(Insert::into(TABLE_DEPENDENCY).value(COL_DAY).value(COL_LINKS).into())?)
    }

    /// Encode `links` for `day`
    ///
    /// # Errors
    ///
    /// `Error::Decode` if the batch cannot be encoded.
    pub fn new(
        session: Arc<dyn Session>,
        prepared: PreparedStatement,
        day: DayKey,
        links: &[DependencyLink],
    ) -> Result<Self> {
        Ok(InsertDependencies {
            session,
            prepared,
            day,
            links: encode_batch(links)?,
            count: links.len(),
        })
    }
}

impl ResultSetCall for InsertDependencies {
    type Output = ();

    fn new_future(&self) -> BoxFuture<'static, SessionResult<ResultSet>> {
        let values: Vec<Value> = vec![self.day.into(), self.links.clone().into()];
        bind_and_issue(&self.session, &self.prepared, values)
    }

    fn map(&self, _rows: ResultSet) -> Result<()> {
        Ok(())
    }
}

impl fmt::Display for InsertDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InsertDependencies{{day={}, links={}}}",
            self.day, self.count
        )
    }
}
