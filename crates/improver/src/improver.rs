// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The improver: turns a naive plan and an execution trace into a plan
//! whose register counts sustain the smallest pipeline interval that fits
//! every memory zone.

use crate::mem_zone::bucket_by_zone;
use crate::search::{binary_search_ii, RegstDemand, ZoneDemand};
use crate::{ImproverConfig, ImproverError};
use act_graph::{ActEventLog, ActGraph};
use memory_zone::{AvailableMemDesc, MemZoneKey};
use plan_ir::plan::Validated;
use plan_ir::{Plan, RegstDescId};
use std::collections::BTreeMap;

/// Bytes held in one zone by the emitted plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ZoneUsage {
    pub key: MemZoneKey,
    pub used_bytes: u64,
    pub available_bytes: u64,
}

impl ZoneUsage {
    /// Fraction of the zone in use (`0.0` for an empty zone).
    pub fn utilization(&self) -> f64 {
        if self.available_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.available_bytes as f64
        }
    }
}

/// The result of improving a plan.
#[derive(Debug, Clone)]
pub struct Improvement {
    /// The input plan with every register count replaced.
    pub plan: Plan<Validated>,
    /// The pipeline interval the counts sustain.
    pub ii: f64,
    /// The observed initiation interval, the search's lower bound.
    pub base_ii: f64,
    /// Register count chosen per descriptor.
    pub register_nums: BTreeMap<RegstDescId, u64>,
    /// Zone usage of the emitted plan, in key order.
    pub zone_usage: Vec<ZoneUsage>,
}

impl Improvement {
    /// Rechecks that the emitted plan fits every zone it uses.
    pub fn validate(&self) -> Result<(), ImproverError> {
        for usage in &self.zone_usage {
            if usage.used_bytes > usage.available_bytes {
                return Err(ImproverError::BudgetExceeded {
                    zone: usage.key,
                    used: usage.used_bytes,
                    available: usage.available_bytes,
                });
            }
        }
        Ok(())
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let peak = self
            .zone_usage
            .iter()
            .map(ZoneUsage::utilization)
            .fold(0.0, f64::max);
        format!(
            "Improvement '{}': ii {:.4} (base {:.4}), {} descriptors, {} zones, \
             {:.2} MB of registers, peak zone utilization {:.0}%",
            self.plan.name,
            self.ii,
            self.base_ii,
            self.register_nums.len(),
            self.zone_usage.len(),
            self.plan.total_regst_bytes() as f64 / (1024.0 * 1024.0),
            peak * 100.0,
        )
    }
}

/// Memory-limited pipeline interval optimizer.
#[derive(Debug, Clone)]
pub struct Improver {
    available: AvailableMemDesc,
    config: ImproverConfig,
}

impl Improver {
    pub fn new(available: AvailableMemDesc, config: ImproverConfig) -> Self {
        Self { available, config }
    }

    pub fn config(&self) -> &ImproverConfig {
        &self.config
    }

    pub fn available(&self) -> &AvailableMemDesc {
        &self.available
    }

    /// Builds the act graph from `log` and improves `plan` with it.
    pub fn improve(
        &self,
        plan: &Plan<Validated>,
        log: &ActEventLog,
    ) -> Result<Improvement, ImproverError> {
        let graph = ActGraph::new(plan, log)?;
        self.improve_with_graph(plan, &graph)
    }

    /// Improves `plan` using an already built act graph.
    pub fn improve_with_graph(
        &self,
        plan: &Plan<Validated>,
        graph: &ActGraph,
    ) -> Result<Improvement, ImproverError> {
        self.config.validate()?;
        let dev_num = self.config.device_num_per_machine;
        let buckets = bucket_by_zone(plan, &self.available, dev_num)?;

        let zones: Vec<ZoneDemand> = buckets
            .iter()
            .map(|(&key, descs)| ZoneDemand {
                key,
                available_bytes: self.available.available_bytes(key).unwrap_or(0),
                regsts: descs
                    .iter()
                    .map(|d| RegstDemand {
                        regst_desc_id: d.regst_desc_id,
                        byte_size: d.byte_size_per_register(),
                        duration: graph.duration(d.regst_desc_id),
                        reuse_ratio: graph.reuse_ratio(d.regst_desc_id),
                        min_register_num: d.min_register_num,
                        max_register_num: d.max_register_num,
                    })
                    .collect(),
            })
            .collect();

        let base_ii = graph.initiation_interval();
        let ii = binary_search_ii(&zones, base_ii, &self.config)?;

        let register_nums: BTreeMap<RegstDescId, u64> = zones
            .iter()
            .flat_map(|z| z.regsts.iter())
            .map(|r| (r.regst_desc_id, r.regst_num(ii)))
            .collect();
        let improved = plan.with_register_nums(&register_nums);
        let zone_usage = self.zone_usage(&improved)?;

        let improvement = Improvement {
            plan: improved,
            ii,
            base_ii,
            register_nums,
            zone_usage,
        };
        improvement.validate()?;
        tracing::info!("{}", improvement.summary());
        Ok(improvement)
    }

    /// Bytes each zone holds under the plan's current register counts.
    pub fn zone_usage(&self, plan: &Plan<Validated>) -> Result<Vec<ZoneUsage>, ImproverError> {
        let dev_num = self.config.device_num_per_machine;
        let buckets = bucket_by_zone(plan, &self.available, dev_num)?;
        Ok(buckets
            .into_iter()
            .map(|(key, descs)| ZoneUsage {
                key,
                used_bytes: descs.iter().map(|d| d.total_byte_size()).sum(),
                available_bytes: self.available.available_bytes(key).unwrap_or(0),
            })
            .collect())
    }
}
