//! Dependency links and their reconciliation
//!
//! Links arrive pre-aggregated, one batch per day. A query window usually
//! spans several days, so the same `(parent, child)` edge shows up once per
//! batch and has to be summed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Aggregated calls from one service to another
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyLink {
    /// Calling service
    pub parent: String,
    /// Called service
    pub child: String,
    /// Number of calls observed
    pub call_count: u64,
    /// Number of those calls that failed
    pub error_count: u64,
}

impl DependencyLink {
    /// Create a link with no errors
    pub fn new(parent: impl Into<String>, child: impl Into<String>, call_count: u64) -> Self {
        DependencyLink {
            parent: parent.into(),
            child: child.into(),
            call_count,
            error_count: 0,
        }
    }

    /// Set the error count
    pub fn with_errors(mut self, error_count: u64) -> Self {
        self.error_count = error_count;
        self
    }

    /// Merge links that share the same `(parent, child)` pair
    ///
    /// Call and error counts are summed (saturating). The result is ordered
    /// by `(parent, child)`, so any permutation or grouping of the input
    /// produces the same output.
    pub fn merge<I>(links: I) -> Vec<DependencyLink>
    where
        I: IntoIterator<Item = DependencyLink>,
    {
        let mut merged: BTreeMap<(String, String), (u64, u64)> = BTreeMap::new();
        for link in links {
            let counts = merged.entry((link.parent, link.child)).or_insert((0, 0));
            counts.0 = counts.0.saturating_add(link.call_count);
            counts.1 = counts.1.saturating_add(link.error_count);
        }

        merged
            .into_iter()
            .map(|((parent, child), (call_count, error_count))| DependencyLink {
                parent,
                child,
                call_count,
                error_count,
            })
            .collect()
    }
}

/// Encode one day's links for the dependency table
pub fn encode_batch(links: &[DependencyLink]) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(links)?)
}

/// Decode one day's links from the dependency table
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<DependencyLink>> {
    Ok(rmp_serde::from_slice(bytes)?)
}
