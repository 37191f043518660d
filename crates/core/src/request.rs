//! Trace search requests
//!
//! A [`QueryRequest`] is what a caller asks for. How many index rows are
//! actually read to answer it is store policy and never part of the request.

use std::collections::BTreeMap;

use crate::day::MAX_LOOKBACK_MS;
use crate::error::{Error, Result};

/// Criteria for a trace search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    service_name: Option<String>,
    span_name: Option<String>,
    annotation_query: BTreeMap<String, String>,
    min_duration: Option<i64>,
    max_duration: Option<i64>,
    end_ts: i64,
    lookback: i64,
    limit: usize,
}

impl QueryRequest {
    /// Start building a request
    pub fn builder() -> QueryRequestBuilder {
        QueryRequestBuilder::default()
    }

    /// Local service that recorded a matching span
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Operation name of a matching span
    pub fn span_name(&self) -> Option<&str> {
        self.span_name.as_deref()
    }

    /// Annotation values (empty value) and tag key/value pairs that must match
    pub fn annotation_query(&self) -> &BTreeMap<String, String> {
        &self.annotation_query
    }

    /// Minimum span duration in microseconds
    pub fn min_duration(&self) -> Option<i64> {
        self.min_duration
    }

    /// Maximum span duration in microseconds
    pub fn max_duration(&self) -> Option<i64> {
        self.max_duration
    }

    /// End of the window in epoch milliseconds
    pub fn end_ts(&self) -> i64 {
        self.end_ts
    }

    /// Window length in milliseconds
    pub fn lookback(&self) -> i64 {
        self.lookback
    }

    /// Maximum number of traces to return
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Start of the window in epoch milliseconds, clamped at the epoch
    pub fn start_ts(&self) -> i64 {
        self.end_ts.saturating_sub(self.lookback).max(0)
    }

    /// Terms as they appear in the annotation query column
    ///
    /// An annotation value or bare tag key is a term on its own; a tag
    /// constraint becomes `key=value`.
    pub fn annotation_terms(&self) -> Vec<String> {
        self.annotation_query
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    key.clone()
                } else {
                    format!("{}={}", key, value)
                }
            })
            .collect()
    }
}

/// Parse `"error and http.method=GET"` into `{error: "", http.method: "GET"}`
///
/// Terms are separated by ` and `; a term without `=` is an annotation value
/// or bare tag key. Blank terms are ignored.
pub fn parse_annotation_query(query: &str) -> BTreeMap<String, String> {
    let mut parsed = BTreeMap::new();
    for term in query.split(" and ") {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        match term.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                if !key.is_empty() {
                    parsed.insert(key.to_string(), value.trim().to_string());
                }
            }
            None => {
                parsed.insert(term.to_string(), String::new());
            }
        }
    }
    parsed
}

/// Builder for [`QueryRequest`]
#[derive(Debug, Clone, Default)]
pub struct QueryRequestBuilder {
    service_name: Option<String>,
    span_name: Option<String>,
    annotation_query: BTreeMap<String, String>,
    min_duration: Option<i64>,
    max_duration: Option<i64>,
    end_ts: Option<i64>,
    lookback: Option<i64>,
    limit: Option<usize>,
}

impl QueryRequestBuilder {
    /// Restrict to spans recorded by this service
    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Restrict to spans with this name
    pub fn span_name(mut self, span_name: impl Into<String>) -> Self {
        self.span_name = Some(span_name.into());
        self
    }

    /// Require an annotation value, or a tag (`value` empty means any value)
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotation_query.insert(key.into(), value.into());
        self
    }

    /// Add every term of a textual annotation query
    pub fn parse_annotation_query(mut self, query: &str) -> Self {
        self.annotation_query.extend(parse_annotation_query(query));
        self
    }

    /// Minimum duration in microseconds
    pub fn min_duration(mut self, micros: i64) -> Self {
        self.min_duration = Some(micros);
        self
    }

    /// Maximum duration in microseconds
    pub fn max_duration(mut self, micros: i64) -> Self {
        self.max_duration = Some(micros);
        self
    }

    /// End of the window in epoch milliseconds
    pub fn end_ts(mut self, end_ts: i64) -> Self {
        self.end_ts = Some(end_ts);
        self
    }

    /// Window length in milliseconds
    pub fn lookback(mut self, lookback: i64) -> Self {
        self.lookback = Some(lookback);
        self
    }

    /// Maximum traces to return
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Validate and build
    ///
    /// Service and span names are lowercased; a span name of `"all"` or an
    /// empty name means no span restriction.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` when `end_ts`, `lookback` or `limit` is
    /// missing or not positive, when `lookback` exceeds [`MAX_LOOKBACK_MS`],
    /// when a duration is not positive, or when `max_duration` is set without
    /// a smaller-or-equal `min_duration`.
    pub fn build(self) -> Result<QueryRequest> {
        let end_ts = self
            .end_ts
            .ok_or_else(|| Error::invalid_input("endTs is required"))?;
        if end_ts <= 0 {
            return Err(Error::invalid_input("endTs should be positive, in epoch milliseconds"));
        }
        let lookback = self
            .lookback
            .ok_or_else(|| Error::invalid_input("lookback is required"))?;
        if lookback <= 0 {
            return Err(Error::invalid_input("lookback should be positive, in milliseconds"));
        }
        if lookback > MAX_LOOKBACK_MS {
            return Err(Error::invalid_input(format!(
                "lookback should be at most {} milliseconds",
                MAX_LOOKBACK_MS
            )));
        }
        let limit = self
            .limit
            .ok_or_else(|| Error::invalid_input("limit is required"))?;
        if limit == 0 {
            return Err(Error::invalid_input("limit should be positive"));
        }

        match (self.min_duration, self.max_duration) {
            (Some(min), _) if min <= 0 => {
                return Err(Error::invalid_input("minDuration should be positive"));
            }
            (None, Some(_)) => {
                return Err(Error::invalid_input(
                    "maxDuration is only valid with minDuration",
                ));
            }
            (Some(min), Some(max)) if max < min => {
                return Err(Error::invalid_input(
                    "maxDuration should be >= minDuration",
                ));
            }
            _ => {}
        }

        let service_name = self
            .service_name
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let span_name = self
            .span_name
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty() && s != "all");

        Ok(QueryRequest {
            service_name,
            span_name,
            annotation_query: self.annotation_query,
            min_duration: self.min_duration,
            max_duration: self.max_duration,
            end_ts,
            lookback,
            limit,
        })
    }
}
