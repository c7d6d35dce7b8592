// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory budget values and parsing.
//!
//! A [`MemoryBudget`] is the byte capacity of one memory zone. It parses
//! human-readable strings so availability tables stay readable, and it
//! serialises back to the same form.

use crate::MemZoneError;
use std::fmt;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Byte capacity of one memory zone.
///
/// # Parsing
/// - `"512M"` or `"512MB"` → 512 × 1024² bytes
/// - `"16G"` or `"16GB"` → 16 × 1024³ bytes
/// - `"2048K"` or `"2048KB"` → 2048 × 1024 bytes
/// - `"1000"` or `"1000B"` → raw byte count
///
/// # Examples
/// ```
/// use memory_zone::MemoryBudget;
///
/// let b = MemoryBudget::parse("1G").unwrap();
/// assert_eq!(b.as_mb(), 1024);
/// assert_eq!(b.to_string(), "1 GB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryBudget {
    bytes: u64,
}

impl MemoryBudget {
    /// Creates a budget from a byte count.
    pub fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    /// Creates a budget from megabytes.
    pub fn from_mb(mb: u64) -> Self {
        Self { bytes: mb * MB }
    }

    /// Creates a budget from gigabytes.
    pub fn from_gb(gb: u64) -> Self {
        Self { bytes: gb * GB }
    }

    /// Returns the budget in bytes.
    pub fn as_bytes(&self) -> u64 {
        self.bytes
    }

    /// Returns the budget in megabytes (truncated).
    pub fn as_mb(&self) -> u64 {
        self.bytes / MB
    }

    /// Parses a human-readable budget string. Case-insensitive; a zero
    /// budget is allowed and describes a zone that holds nothing.
    pub fn parse(s: &str) -> Result<Self, MemZoneError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(MemZoneError::InvalidBudget {
                input: s.to_string(),
                detail: "empty string".into(),
            });
        }

        let upper = trimmed.to_uppercase();
        let (num_str, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
            (n, GB)
        } else if let Some(n) = upper.strip_suffix('G') {
            (n, GB)
        } else if let Some(n) = upper.strip_suffix("MB") {
            (n, MB)
        } else if let Some(n) = upper.strip_suffix('M') {
            (n, MB)
        } else if let Some(n) = upper.strip_suffix("KB") {
            (n, KB)
        } else if let Some(n) = upper.strip_suffix('K') {
            (n, KB)
        } else if let Some(n) = upper.strip_suffix('B') {
            (n, 1)
        } else {
            (upper.as_str(), 1)
        };

        let value: u64 = num_str.trim().parse().map_err(|_| MemZoneError::InvalidBudget {
            input: s.to_string(),
            detail: "expected a number followed by an optional suffix (K, M, G)".into(),
        })?;

        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| MemZoneError::InvalidBudget {
                input: s.to_string(),
                detail: "value overflows 64 bits".into(),
            })?;

        Ok(Self { bytes })
    }
}

impl TryFrom<String> for MemoryBudget {
    type Error = MemZoneError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MemoryBudget> for String {
    fn from(b: MemoryBudget) -> Self {
        b.to_string()
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes >= GB && self.bytes % GB == 0 {
            write!(f, "{} GB", self.bytes / GB)
        } else if self.bytes >= MB && self.bytes % MB == 0 {
            write!(f, "{} MB", self.bytes / MB)
        } else if self.bytes >= KB && self.bytes % KB == 0 {
            write!(f, "{} KB", self.bytes / KB)
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}
