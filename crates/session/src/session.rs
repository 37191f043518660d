//! The database session boundary
//!
//! Everything the store reads or writes goes through a [`Session`]. A real
//! deployment wraps a wide-column database driver; tests use
//! [`MemorySession`](crate::MemorySession).

use futures::future::BoxFuture;
use std::sync::Arc;

use spanstore_core::SessionResult;

use crate::query::Statement;
use crate::statement::{BoundStatement, PreparedStatement};
use crate::value::{ResultSet, Value};

/// Prepares statements and executes bound statements
#[async_trait::async_trait]
pub trait Session: Send + Sync {
    /// Validate a statement against the keyspace
    ///
    /// Fails with `SessionError::UnknownTable` or
    /// `SessionError::InvalidQuery` when the statement cannot be served.
    fn prepare(&self, statement: Statement) -> SessionResult<PreparedStatement>;

    /// Run a bound statement
    ///
    /// Writes return an empty result set.
    async fn execute(&self, statement: BoundStatement) -> SessionResult<ResultSet>;
}

/// Issue `statement` on a shared session as an owned future
pub fn issue(
    session: &Arc<dyn Session>,
    statement: BoundStatement,
) -> BoxFuture<'static, SessionResult<ResultSet>> {
    let session = Arc::clone(session);
    Box::pin(async move { session.execute(statement).await })
}

/// Bind `values` to `prepared` and issue it; a binding failure resolves
/// immediately to that failure
pub fn bind_and_issue(
    session: &Arc<dyn Session>,
    prepared: &PreparedStatement,
    values: Vec<Value>,
) -> BoxFuture<'static, SessionResult<ResultSet>> {
    match prepared.bind(values) {
        Ok(bound) => issue(session, bound),
        Err(e) => Box::pin(futures::future::ready(Err(e))),
    }
}
