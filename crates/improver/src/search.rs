// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pipeline interval search.
//!
//! # Memory Model
//!
//! A register of descriptor `d` lives for `duration(d)` on average and a
//! new one is needed every `ii / reuse_ratio(d)`. Keeping the pipeline fed
//! at interval `ii` therefore takes
//!
//! ```text
//! regst_num(d, ii) = clamp(ceil(duration(d) / ii × reuse_ratio(d)), min, max)
//! ```
//!
//! registers, and a zone holds `Σ regst_num × byte_size` bytes. Counts only
//! shrink as `ii` grows, so feasibility is monotone in `ii` and the smallest
//! feasible interval can be bisected.
//!
//! # Bounds
//!
//! - lower: the observed initiation interval of the trace (no schedule can
//!   beat the busiest actor);
//! - upper: `max(lower, max_d duration(d) × reuse_ratio(d))`, where every
//!   count has dropped to its minimum.

use crate::{ImproverConfig, ImproverError};
use memory_zone::MemZoneKey;
use plan_ir::RegstDescId;
use rayon::prelude::*;

/// What one descriptor asks of its zone.
#[derive(Debug, Clone, PartialEq)]
pub struct RegstDemand {
    pub regst_desc_id: RegstDescId,
    pub byte_size: u64,
    pub duration: f64,
    pub reuse_ratio: f64,
    pub min_register_num: u64,
    pub max_register_num: Option<u64>,
}

impl RegstDemand {
    /// Register count needed at `ii`.
    pub fn regst_num(&self, ii: f64) -> u64 {
        if self.duration <= 0.0 {
            return self.min_register_num;
        }
        let wanted = (self.duration * self.reuse_ratio / ii).ceil();
        if !(ii > 0.0 && wanted.is_finite()) {
            return self.max_register_num.unwrap_or(self.min_register_num);
        }
        let raw = wanted as u64;
        let n = raw.max(self.min_register_num);
        match self.max_register_num {
            Some(max) => n.min(max),
            None => n,
        }
    }

    /// Largest interval at which more than the minimum count is wanted.
    pub fn saturation_ii(&self) -> f64 {
        (self.duration * self.reuse_ratio).max(0.0)
    }
}

/// All descriptors placed in one memory zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneDemand {
    pub key: MemZoneKey,
    pub available_bytes: u64,
    pub regsts: Vec<RegstDemand>,
}

impl ZoneDemand {
    /// Bytes the zone holds at `ii`.
    pub fn usage_at(&self, ii: f64) -> u64 {
        self.regsts.iter().fold(0u64, |acc, r| {
            acc.saturating_add(r.regst_num(ii).saturating_mul(r.byte_size))
        })
    }

    /// `true` if the zone overflows at `ii`. Filling it exactly is fine.
    pub fn is_out_of_memory(&self, ii: f64) -> bool {
        self.usage_at(ii) > self.available_bytes
    }
}

/// Returns the first zone (in key order) that overflows at `ii`.
pub fn find_out_of_memory_zone(zones: &[ZoneDemand], ii: f64) -> Option<&ZoneDemand> {
    zones
        .par_iter()
        .filter(|z| z.is_out_of_memory(ii))
        .min_by_key(|z| z.key)
}

/// `true` if any zone overflows at `ii`.
pub fn is_any_zone_out_of_memory(zones: &[ZoneDemand], ii: f64) -> bool {
    zones.par_iter().any(|z| z.is_out_of_memory(ii))
}

/// Finds the smallest feasible interval not below `base_ii`, within
/// `config.tolerance`. The interval is never below `config.tolerance`, so
/// it is always positive.
pub fn binary_search_ii(
    zones: &[ZoneDemand],
    base_ii: f64,
    config: &ImproverConfig,
) -> Result<f64, ImproverError> {
    let mut lower = base_ii.max(config.tolerance);
    let mut upper = zones
        .iter()
        .flat_map(|z| z.regsts.iter())
        .map(RegstDemand::saturation_ii)
        .fold(lower, f64::max);

    if let Some(zone) = find_out_of_memory_zone(zones, upper) {
        return Err(ImproverError::NoFeasibleInterval {
            zone: zone.key,
            required: zone.usage_at(upper),
            available: zone.available_bytes,
        });
    }
    if !is_any_zone_out_of_memory(zones, lower) {
        tracing::debug!("lower bound {lower:.4} already feasible");
        return Ok(lower);
    }

    let mut iterations = 0;
    while upper - lower > config.tolerance && iterations < config.max_iterations {
        let mid = (lower + upper) / 2.0;
        if is_any_zone_out_of_memory(zones, mid) {
            lower = mid;
        } else {
            upper = mid;
        }
        iterations += 1;
    }
    tracing::debug!(
        "bisection stopped after {iterations} steps: ii in [{lower:.4}, {upper:.4}]"
    );
    Ok(upper)
}
