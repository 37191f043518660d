//! Prepared and bound statements

use std::fmt;
use std::sync::Arc;

use spanstore_core::{SessionError, SessionResult};

use crate::query::Statement;
use crate::value::Value;

/// A statement accepted by a session, ready to bind
///
/// Cheap to clone; factories keep these for their whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    statement: Arc<Statement>,
}

impl PreparedStatement {
    /// Wrap a statement the session has validated
    pub fn new(statement: Statement) -> Self {
        PreparedStatement {
            statement: Arc::new(statement),
        }
    }

    /// The underlying statement
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Bind values to the markers, in marker order
    ///
    /// # Errors
    ///
    /// `SessionError::InvalidQuery` if the number of values differs from the
    /// number of markers.
    pub fn bind(&self, values: Vec<Value>) -> SessionResult<BoundStatement> {
        let expected = self.statement.bind_markers();
        if values.len() != expected {
            return Err(SessionError::InvalidQuery(format!(
                "{} expects {} values, got {}",
                self.statement,
                expected,
                values.len()
            )));
        }
        Ok(BoundStatement {
            statement: Arc::clone(&self.statement),
            values,
        })
    }
}

impl fmt::Display for PreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.statement, f)
    }
}

/// A prepared statement with every marker bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundStatement {
    statement: Arc<Statement>,
    values: Vec<Value>,
}

impl BoundStatement {
    /// The underlying statement
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Bound values, in marker order
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl fmt::Display for BoundStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.statement, f)
    }
}
