// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Placement of register descriptors into memory zones.

use crate::ImproverError;
use memory_zone::{AvailableMemDesc, MemZoneKey};
use plan_ir::plan::Validated;
use plan_ir::{Plan, PlanError, RegstDescProto};
use std::collections::BTreeMap;

/// Descriptors grouped by the zone their registers are allocated in.
pub type ZoneBuckets<'a> = BTreeMap<MemZoneKey, Vec<&'a RegstDescProto>>;

/// The zone a descriptor's registers live in: the producer's machine and
/// the zone id of its memory case.
pub fn zone_of(
    plan: &Plan<Validated>,
    desc: &RegstDescProto,
    device_num_per_machine: i64,
) -> Result<MemZoneKey, ImproverError> {
    let machine_id = plan.machine_of(desc).ok_or_else(|| {
        PlanError::InvalidPlan(format!(
            "producer {} of regst_desc {} is not in the plan",
            desc.producer_task_id, desc.regst_desc_id,
        ))
    })?;
    Ok(MemZoneKey::new(
        machine_id,
        desc.mem_case.memory_zone_id(device_num_per_machine),
    ))
}

/// Buckets every descriptor of `plan` by zone, checking that the
/// availability table lists each zone used.
pub fn bucket_by_zone<'a>(
    plan: &'a Plan<Validated>,
    available: &AvailableMemDesc,
    device_num_per_machine: i64,
) -> Result<ZoneBuckets<'a>, ImproverError> {
    let mut buckets = ZoneBuckets::new();
    for desc in plan.iter_regst_descs() {
        let key = zone_of(plan, desc, device_num_per_machine)?;
        if available.available_bytes(key).is_none() {
            return Err(ImproverError::MissingMemZone {
                regst_desc_id: desc.regst_desc_id,
                machine_id: key.machine_id,
                zone_id: key.zone_id,
            });
        }
        buckets.entry(key).or_default().push(desc);
    }
    Ok(buckets)
}
