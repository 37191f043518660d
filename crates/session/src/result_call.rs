//! Calls that execute one statement and map its rows
//!
//! Implementors describe how to issue the statement (`new_future`) and how
//! to turn rows into a domain value (`map`). Mapping runs inside the call,
//! so a fan-out of these calls merges domain values, never raw rows.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use spanstore_call::{Call, Recipe};
use spanstore_core::{Result, SessionResult};

use crate::value::ResultSet;

/// One statement plus its row mapping
pub trait ResultSetCall: fmt::Display + Send + Sync + 'static {
    /// Domain value produced from the rows
    type Output: Send + 'static;

    /// Bind and issue the statement
    fn new_future(&self) -> BoxFuture<'static, SessionResult<ResultSet>>;

    /// Decode the rows
    fn map(&self, rows: ResultSet) -> Result<Self::Output>;

    /// Wrap into an executable call
    fn into_call(self) -> Call<Self::Output>
    where
        Self: Sized,
    {
        Call::new(ResultSetRecipe(Arc::new(self)))
    }
}

struct ResultSetRecipe<C>(Arc<C>);

impl<C: ResultSetCall> Recipe for ResultSetRecipe<C> {
    type Output = C::Output;

    fn dispatch(&self) -> BoxFuture<'static, Result<C::Output>> {
        let pending = self.0.new_future();
        let call = Arc::clone(&self.0);
        Box::pin(async move {
            let rows = pending.await?;
            call.map(rows)
        })
    }
}

impl<C: ResultSetCall> fmt::Display for ResultSetRecipe<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}
