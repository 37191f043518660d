//! Service and span name lookups from `span_by_service`

use futures::future::BoxFuture;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use spanstore_call::Call;
use spanstore_core::{Result, SessionResult};
use spanstore_session::{
    bind_and_issue, PreparedStatement, ResultSet, ResultSetCall, Select, Session, Value,
};

use crate::schema::{COL_SERVICE, COL_SPAN, TABLE_SPAN_BY_SERVICE};

/// Distinct non-empty values of `column`, sorted
fn distinct(rows: &ResultSet, column: &str) -> Result<Vec<String>> {
    let mut names = BTreeSet::new();
    for row in rows {
        let name = row.get_text(column)?;
        if !name.is_empty() {
            names.insert(name.to_string());
        }
    }
    Ok(names.into_iter().collect())
}

/// Every service that reported a named span
pub struct SelectServiceNames {
    session: Arc<dyn Session>,
    prepared: PreparedStatement,
}

impl ResultSetCall for SelectServiceNames {
    type Output = Vec<String>;

    fn new_future(&self) -> BoxFuture<'static, SessionResult<ResultSet>> {
        bind_and_issue(&self.session, &self.prepared, Vec::new())
    }

    fn map(&self, rows: ResultSet) -> Result<Vec<String>> {
        distinct(&rows, COL_SERVICE)
    }
}

impl fmt::Display for SelectServiceNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SelectServiceNames{}")
    }
}

/// Span names reported by one service
pub struct SelectSpanNames {
    session: Arc<dyn Session>,
    prepared: PreparedStatement,
    service: String,
}

impl ResultSetCall for SelectSpanNames {
    type Output = Vec<String>;

    fn new_future(&self) -> BoxFuture<'static, SessionResult<ResultSet>> {
        bind_and_issue(
            &self.session,
            &self.prepared,
            vec![Value::from(self.service.as_str())],
        )
    }

    fn map(&self, rows: ResultSet) -> Result<Vec<String>> {
        distinct(&rows, COL_SPAN)
    }
}

impl fmt::Display for SelectSpanNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SelectSpanNames{{service={}}}", self.service)
    }
}

/// Prepares the name lookups once and creates calls from them
pub struct Factory {
    session: Arc<dyn Session>,
    service_names: PreparedStatement,
    span_names: PreparedStatement,
}

impl Factory {
    /// Prepare both lookups
    pub fn new(session: Arc<dyn Session>) -> Result<Self> {
        let service_names =
            session.prepare(Select::from(TABLE_SPAN_BY_SERVICE).column(COL_SERVICE).into())?;
        let span_names = session.prepare(
            Select::from(TABLE_SPAN_BY_SERVICE)
                .column(COL_SPAN)
                .where_eq(COL_SERVICE)
                .into(),
        )?;
        Ok(Factory {
            session,
            service_names,
            span_names,
        })
    }

    /// Sorted service names
    pub fn service_names(&self) -> Call<Vec<String>> {
        SelectServiceNames {
            session: Arc::clone(&self.session),
            prepared: self.service_names.clone(),
        }
        .into_call()
    }

    /// Sorted span names of `service`; empty for a blank service name
    pub fn span_names(&self, service: &str) -> Call<Vec<String>> {
        let service = service.trim().to_lowercase();
        if service.is_empty() {
            return Call::ready(Vec::new());
        }
        SelectSpanNames {
            session: Arc::clone(&self.session),
            prepared: self.span_names.clone(),
            service,
        }
        .into_call()
    }
}
