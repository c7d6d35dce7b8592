// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: plan + trace + availability table → improved plan.

use act_graph::{ActEvent, ActEventLog};
use improver::{Improver, ImproverConfig, ImproverError};
use memory_zone::{AvailableMemDesc, MemoryBudget};
use plan_ir::{plan::Validated, BlobDesc, MemoryCase, Plan, PlanLoader, RegstDescProto, TaskProto, TaskType};

// ── Helpers ────────────────────────────────────────────────────

/// Producer 0 emits two 100-byte descriptors (1 and 2) read by consumer 1.
fn two_desc_plan() -> Plan<Validated> {
    let desc = |id| {
        RegstDescProto::new(
            id,
            0,
            vec![1],
            MemoryCase::HostMem,
            vec![BlobDesc::new(format!("blob_{id}"), vec![25])],
        )
    };
    Plan::new(
        "two_desc".into(),
        vec![
            TaskProto::new(0, TaskType::Source, 0)
                .with_produced("a", desc(1))
                .with_produced("b", desc(2)),
            TaskProto::new(1, TaskType::NormalForward, 0)
                .with_consumed("in", 1)
                .with_consumed("in_b", 2),
        ],
    )
    .validate()
    .unwrap()
}

/// Every register lives exactly 50 units; the busiest actor needs 5 per piece.
fn trace() -> ActEventLog {
    (0..6i64)
        .flat_map(|p| {
            let t = 60.0 * p as f64;
            [ActEvent::new(0, p, t, t + 1.0), ActEvent::new(1, p, t + 45.0, t + 50.0)]
        })
        .collect()
}

fn improver(bytes: u64) -> Improver {
    Improver::new(
        AvailableMemDesc::new(vec![vec![MemoryBudget::from_bytes(bytes)]]),
        ImproverConfig::default(),
    )
}

// ── Tests ──────────────────────────────────────────────────────

#[test]
fn thousand_byte_zone_converges_to_ten() {
    let imp = improver(1000).improve(&two_desc_plan(), &trace()).unwrap();
    let tol = ImproverConfig::default().tolerance;
    assert_eq!(imp.base_ii, 5.0);
    assert!(imp.ii >= 10.0 && imp.ii <= 10.0 + tol, "ii = {}", imp.ii);
    assert_eq!(imp.register_nums[&1], 5);
    assert_eq!(imp.register_nums[&2], 5);
    assert_eq!(imp.zone_usage[0].used_bytes, 1000);
}

#[test]
fn smaller_budget_never_lowers_ii() {
    let mut last_ii = 0.0;
    for bytes in [4000, 2000, 1000, 600, 400, 200] {
        let imp = improver(bytes).improve(&two_desc_plan(), &trace()).unwrap();
        assert!(
            imp.ii >= last_ii,
            "budget {bytes}: ii {} dropped below {last_ii}",
            imp.ii,
        );
        last_ii = imp.ii;
    }
}

#[test]
fn emitted_counts_fit_every_budget() {
    for bytes in [200, 350, 999, 1000, 1001, 5000] {
        let imp = improver(bytes).improve(&two_desc_plan(), &trace()).unwrap();
        let used: u64 = imp.plan.iter_regst_descs().map(|d| d.total_byte_size()).sum();
        assert!(used <= bytes, "budget {bytes}: {used} bytes used");
        imp.validate().unwrap();
    }
}

#[test]
fn improving_twice_is_stable() {
    let improver = improver(1000);
    let first = improver.improve(&two_desc_plan(), &trace()).unwrap();
    let second = improver.improve(&first.plan, &trace()).unwrap();
    assert_eq!(first.ii, second.ii);
    assert_eq!(first.register_nums, second.register_nums);
}

#[test]
fn below_minimum_footprint_fails_fast() {
    let err = improver(150).improve(&two_desc_plan(), &trace()).unwrap_err();
    match err {
        ImproverError::NoFeasibleInterval {
            required,
            available,
            ..
        } => assert_eq!((required, available), (200, 150)),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn max_register_num_caps_the_count() {
    let mut plan = two_desc_plan().to_manifest();
    for task in &mut plan.tasks {
        for desc in task.produced_regst_descs.values_mut() {
            desc.max_register_num = Some(3);
        }
    }
    let plan = Plan::from_manifest(plan).validate().unwrap();
    let imp = improver(1 << 20).improve(&plan, &trace()).unwrap();
    // Ample memory: ii stays at the observed interval, counts hit the cap.
    assert_eq!(imp.ii, 5.0);
    assert_eq!(imp.register_nums[&1], 3);
}

#[test]
fn improved_plan_survives_save_and_load() {
    let imp = improver(1000).improve(&two_desc_plan(), &trace()).unwrap();
    let path = std::env::temp_dir().join("flowrt_improver_roundtrip.json");
    PlanLoader::save(&imp.plan, &path).unwrap();
    let loaded = PlanLoader::load(&path).unwrap();
    assert_eq!(loaded.regst_desc(1).unwrap().register_num, 5);
    assert_eq!(loaded.regst_desc(2).unwrap().register_num, 5);
    std::fs::remove_file(&path).ok();
}
