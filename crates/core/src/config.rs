//! Store configuration via `spanstore.toml`
//!
//! Tunables the storage component hands to the query layer. The same
//! defaults apply whether the config comes from a file or `Default`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::day::MAX_LOOKBACK_MS;
use crate::error::{Error, Result};

/// Config file name used by the storage component
pub const CONFIG_FILE_NAME: &str = "spanstore.toml";

/// Store configuration loaded from `spanstore.toml`.
///
/// # Example
///
/// ```toml
/// keyspace = "zipkin2"
/// strict_trace_id = true
/// search_enabled = true
/// index_fetch_multiplier = 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Keyspace holding the span, index and dependency tables.
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
    /// Require exact 128-bit trace ID matches on reads and write full IDs.
    #[serde(default = "default_true")]
    pub strict_trace_id: bool,
    /// Write and read the search indexes.
    #[serde(default = "default_true")]
    pub search_enabled: bool,
    /// Index rows read per requested trace, compensating for duplicate
    /// index entries of the same trace.
    #[serde(default = "default_index_fetch_multiplier")]
    pub index_fetch_multiplier: usize,
    /// Upper bound on spans returned for one trace.
    #[serde(default = "default_max_trace_cols")]
    pub max_trace_cols: usize,
    /// Lookback used when a caller does not supply one, in milliseconds.
    #[serde(default = "default_lookback_ms")]
    pub default_lookback_ms: i64,
}

fn default_keyspace() -> String {
    "zipkin2".to_string()
}

fn default_true() -> bool {
    true
}

fn default_index_fetch_multiplier() -> usize {
    3
}

fn default_max_trace_cols() -> usize {
    100_000
}

fn default_lookback_ms() -> i64 {
    86_400_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            keyspace: default_keyspace(),
            strict_trace_id: true,
            search_enabled: true,
            index_fetch_multiplier: default_index_fetch_multiplier(),
            max_trace_cols: default_max_trace_cols(),
            default_lookback_ms: default_lookback_ms(),
        }
    }
}

impl StoreConfig {
    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an empty keyspace, a zero multiplier,
    /// a zero `max_trace_cols` or a default lookback outside
    /// `1..=MAX_LOOKBACK_MS`.
    pub fn validate(&self) -> Result<()> {
        if self.keyspace.trim().is_empty() {
            return Err(Error::Config("keyspace must not be empty".to_string()));
        }
        if self.index_fetch_multiplier == 0 {
            return Err(Error::Config(
                "index_fetch_multiplier must be at least 1".to_string(),
            ));
        }
        if self.max_trace_cols == 0 {
            return Err(Error::Config("max_trace_cols must be at least 1".to_string()));
        }
        if self.default_lookback_ms <= 0 || self.default_lookback_ms > MAX_LOOKBACK_MS {
            return Err(Error::Config(format!(
                "default_lookback_ms must be between 1 and {}",
                MAX_LOOKBACK_MS
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Spanstore configuration
#
# Keyspace holding the span, index and dependency tables
keyspace = "zipkin2"

# true  = trace IDs must match on all 128 bits, full IDs are written
# false = lookups also match on the lower 64 bits (mixed 64/128-bit producers)
strict_trace_id = true

# Write and query the service/span and annotation indexes
search_enabled = true

# Index rows fetched per requested trace. Index rows are not de-duplicated
# server-side, so a search for N traces reads N * index_fetch_multiplier rows.
index_fetch_multiplier = 3

# Maximum spans returned for one trace
max_trace_cols = 100000

# Lookback used when none is given, in milliseconds (default: 1 day)
default_lookback_ms = 86400000
"#
    }

    /// Parse and validate config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
