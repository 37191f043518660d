//! Trace identifiers
//!
//! A trace identifier is either 64 or 128 bits wide and travels as lowercase
//! hex. Identifiers that differ only by leading zero padding name the same
//! trace: `"000000000000000000000000000004d2"`, `"00000000000004d2"` and
//! `"4d2"` all parse to the same [`TraceId`].
//!
//! ## Storage keys
//!
//! Spans are partitioned by [`TraceId::partition_key`], which depends on
//! whether strict trace IDs are enabled. Readers query both forms (see
//! [`TraceId::lookup_keys`]) so data written under either convention stays
//! retrievable after the setting changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A 64- or 128-bit trace identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraceId {
    high: u64,
    low: u64,
}

impl TraceId {
    /// Create a 64-bit identifier
    pub const fn from_u64(low: u64) -> Self {
        TraceId { high: 0, low }
    }

    /// Create a 128-bit identifier from its two halves
    pub const fn from_parts(high: u64, low: u64) -> Self {
        TraceId { high, low }
    }

    /// Parse 1 to 32 hex characters
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for empty input, more than 32 characters
    /// or non-hex characters.
    pub fn parse(hex: &str) -> Result<Self> {
        if hex.is_empty() || hex.len() > 32 {
            return Err(Error::invalid_input(format!(
                "trace ID must be 1-32 hex characters: {:?}",
                hex
            )));
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::invalid_input(format!(
                "trace ID contains non-hex characters: {:?}",
                hex
            )));
        }

        let split = hex.len().saturating_sub(16);
        let (high_hex, low_hex) = hex.split_at(split);
        let parse_half = |s: &str| -> Result<u64> {
            if s.is_empty() {
                return Ok(0);
            }
            u64::from_str_radix(s, 16)
                .map_err(|e| Error::invalid_input(format!("trace ID {:?}: {}", hex, e)))
        };

        Ok(TraceId {
            high: parse_half(high_hex)?,
            low: parse_half(low_hex)?,
        })
    }

    /// Upper 64 bits, zero for 64-bit identifiers
    #[inline]
    pub const fn high(&self) -> u64 {
        self.high
    }

    /// Lower 64 bits
    #[inline]
    pub const fn low(&self) -> u64 {
        self.low
    }

    /// True if the upper 64 bits are set
    #[inline]
    pub const fn is_128_bit(&self) -> bool {
        self.high != 0
    }

    /// This identifier truncated to its lower 64 bits
    #[inline]
    pub const fn to_low_64(&self) -> Self {
        TraceId::from_u64(self.low)
    }

    /// Lower 64 bits as 16 hex characters
    pub fn low_hex(&self) -> String {
        format!("{:016x}", self.low)
    }

    /// Upper 64 bits as 16 hex characters, or `None` for a 64-bit identifier
    pub fn high_hex(&self) -> Option<String> {
        self.is_128_bit().then(|| format!("{:016x}", self.high))
    }

    /// Grouping key for search results and trace lookups
    ///
    /// Strict mode distinguishes every 128-bit identifier; relaxed mode
    /// groups by the lower 64 bits.
    pub const fn grouping_key(&self, strict: bool) -> Self {
        if strict {
            *self
        } else {
            self.to_low_64()
        }
    }

    /// Partition key under which spans with this identifier are written
    pub fn partition_key(&self, strict: bool) -> String {
        if strict {
            self.to_string()
        } else {
            self.low_hex()
        }
    }

    /// Every partition key that may hold spans for this identifier
    ///
    /// Always the low 64 bits, plus the full identifier when it is 128-bit.
    pub fn lookup_keys(&self) -> Vec<String> {
        let mut keys = vec![self.low_hex()];
        if self.is_128_bit() {
            keys.push(self.to_string());
        }
        keys
    }

    /// Whether a stored span identifier satisfies a lookup for `self`
    pub const fn matches(&self, stored: &TraceId, strict: bool) -> bool {
        if strict {
            self.high == stored.high && self.low == stored.low
        } else {
            self.low == stored.low
        }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == 0 {
            write!(f, "{:016x}", self.low)
        } else {
            write!(f, "{:016x}{:016x}", self.high, self.low)
        }
    }
}

impl FromStr for TraceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TraceId::parse(s)
    }
}
