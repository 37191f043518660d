//! Asynchronous call layer for spanstore
//!
//! Every read and write the store issues is a [`Call`]:
//! - executable at most once per instance
//! - cancelable from any thread, with late results suppressed
//! - cloneable into a fresh instance for caller-driven retry
//! - composable with `map`, `try_map`, `flat_map` and `Call::fan_out`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call;
pub mod combinators;
pub mod state;

pub use call::{Call, CancelHandle, Execution, Recipe};
pub use state::CallState;
