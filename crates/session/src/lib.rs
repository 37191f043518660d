//! Database session boundary for spanstore
//!
//! This crate defines how the store talks to a wide-column database:
//! - Statement building (`Select`, `Insert`) with positional bind markers
//! - `Session`: prepare statements, execute bound statements
//! - `Value`, `Row`, `ResultSet`: typed access to returned rows
//! - `Keyspace`, `TableSchema`: table layouts the session validates against
//! - `ResultSetCall`: a statement plus row mapping, executable as a `Call`
//! - `MemorySession`: in-memory session with latency and fault injection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod query;
pub mod result_call;
pub mod schema;
pub mod session;
pub mod statement;
pub mod value;

pub use memory::MemorySession;
pub use query::{Insert, Predicate, Restriction, Select, Statement};
pub use result_call::ResultSetCall;
pub use schema::{ClusteringOrder, Keyspace, TableSchema};
pub use session::{bind_and_issue, issue, Session};
pub use statement::{BoundStatement, PreparedStatement};
pub use value::{ResultSet, Row, Value};
