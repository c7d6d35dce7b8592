// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `flowrt improve` command: rewrite register counts from a recorded trace.

use super::fmt_bytes;
use act_graph::{ActEventLog, ActGraph};
use improver::{Improvement, Improver, ImproverConfig};
use memory_zone::AvailableMemDesc;
use plan_ir::plan::Validated;
use plan_ir::{Plan, PlanLoader};
use std::path::PathBuf;

pub async fn execute(
    plan: PathBuf,
    acts: PathBuf,
    mem: PathBuf,
    improver_config: Option<PathBuf>,
    device_num: Option<i64>,
    output: PathBuf,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║               flowrt · Plan Improver                ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let naive = PlanLoader::load(&plan)
        .map_err(|e| anyhow::anyhow!("failed to load plan from '{}': {e}", plan.display()))?;
    let log = ActEventLog::from_file(&acts)?;
    let available = AvailableMemDesc::from_file(&mem)?;
    let mut config = match &improver_config {
        Some(path) => ImproverConfig::from_file(path)?,
        None => ImproverConfig::default(),
    };
    if let Some(n) = device_num {
        config.device_num_per_machine = n;
    }

    println!("  Plan:   {}", naive.summary());
    println!("  Trace:  {} acts over {} pieces", log.len(), log.num_pieces());
    println!("  Zones:  {}", available.num_zones());
    println!();

    let graph = ActGraph::new(&naive, &log)?;
    println!("  {}", graph.summary());
    println!();

    let improvement = Improver::new(available, config).improve_with_graph(&naive, &graph)?;
    print_improvement(&naive, &improvement);

    PlanLoader::save(&improvement.plan, &output)?;
    println!("  Improved plan written to {}", output.display());
    println!();
    Ok(())
}

/// Prints the interval, per-descriptor counts and zone usage.
pub fn print_improvement(naive: &Plan<Validated>, improvement: &Improvement) {
    println!("  Interval: {:.3} µs (observed {:.3} µs)", improvement.ii, improvement.base_ii);
    println!();

    println!(
        "  {:<8} {:<10} {:<10} {:>12} {:>8} {:>8}",
        "Desc", "Producer", "Memory", "Bytes/reg", "Before", "After",
    );
    println!("  {}", "-".repeat(62));
    for desc in naive.iter_regst_descs() {
        let after = improvement
            .register_nums
            .get(&desc.regst_desc_id)
            .copied()
            .unwrap_or(desc.register_num);
        println!(
            "  {:<8} {:<10} {:<10} {:>12} {:>8} {:>8}",
            desc.regst_desc_id,
            desc.producer_task_id,
            desc.mem_case.label(),
            fmt_bytes(desc.byte_size_per_register()),
            desc.register_num,
            after,
        );
    }
    println!();

    println!("  Zone usage:");
    for usage in &improvement.zone_usage {
        println!(
            "   {:<20} {:>12} / {:>12}  ({:.0}%)",
            usage.key.to_string(),
            fmt_bytes(usage.used_bytes),
            fmt_bytes(usage.available_bytes),
            usage.utilization() * 100.0,
        );
    }
    println!();
}
