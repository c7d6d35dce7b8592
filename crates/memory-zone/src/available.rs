// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The availability table: byte capacity of every memory zone in the
//! cluster, read once and never mutated.
//!
//! # TOML Format
//! ```toml
//! [[machine]]
//! zones = ["16G", "16G", "64G"]   # device 0, device 1, host
//!
//! [[machine]]
//! zones = ["16G", "16G", "64G"]
//! ```
//!
//! Machine ids are positions in the `machine` array; zone ids are
//! positions in `zones`.

use crate::{MemZoneError, MemoryBudget};
use std::fmt;
use std::path::Path;

/// Identifies one memory zone in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct MemZoneKey {
    pub machine_id: i64,
    pub zone_id: i64,
}

impl MemZoneKey {
    pub fn new(machine_id: i64, zone_id: i64) -> Self {
        Self {
            machine_id,
            zone_id,
        }
    }
}

impl fmt::Display for MemZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "machine {} zone {}", self.machine_id, self.zone_id)
    }
}

/// Zone budgets of one machine.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MachineMemDesc {
    pub zones: Vec<MemoryBudget>,
}

/// Byte capacity per (machine, zone).
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct AvailableMemDesc {
    #[serde(rename = "machine", default)]
    pub machines: Vec<MachineMemDesc>,
}

impl AvailableMemDesc {
    /// Builds a table from per-machine zone budgets.
    pub fn new(machines: Vec<Vec<MemoryBudget>>) -> Self {
        Self {
            machines: machines
                .into_iter()
                .map(|zones| MachineMemDesc { zones })
                .collect(),
        }
    }

    /// Loads the table from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, MemZoneError> {
        let content = std::fs::read_to_string(path).map_err(|source| MemZoneError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let amd = Self::from_toml(&content)?;
        tracing::info!(
            "availability table: {} machines, {} zones",
            amd.machines.len(),
            amd.num_zones(),
        );
        Ok(amd)
    }

    /// Parses the table from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, MemZoneError> {
        toml::from_str(toml_str)
            .map_err(|e| MemZoneError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises the table to TOML.
    pub fn to_toml(&self) -> Result<String, MemZoneError> {
        toml::to_string_pretty(self)
            .map_err(|e| MemZoneError::Config(format!("TOML serialise error: {e}")))
    }

    /// Returns the capacity of a zone, or `None` if the table has no entry.
    pub fn available_bytes(&self, key: MemZoneKey) -> Option<u64> {
        let machine = usize::try_from(key.machine_id).ok()?;
        let zone = usize::try_from(key.zone_id).ok()?;
        self.machines
            .get(machine)?
            .zones
            .get(zone)
            .map(MemoryBudget::as_bytes)
    }

    /// Total number of zones across all machines.
    pub fn num_zones(&self) -> usize {
        self.machines.iter().map(|m| m.zones.len()).sum()
    }

    /// Iterates over every zone with its capacity.
    pub fn iter_zones(&self) -> impl Iterator<Item = (MemZoneKey, u64)> + '_ {
        self.machines.iter().enumerate().flat_map(|(m, machine)| {
            machine
                .zones
                .iter()
                .enumerate()
                .map(move |(z, budget)| (MemZoneKey::new(m as i64, z as i64), budget.as_bytes()))
        })
    }
}
