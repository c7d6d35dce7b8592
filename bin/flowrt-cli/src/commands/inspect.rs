// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `flowrt inspect` command: display a plan's tasks and descriptors.
//!
//! With an act log, also prints the per-descriptor lifetime and reuse
//! ratio the improver would work from.

use super::fmt_bytes;
use act_graph::{ActEventLog, ActGraph};
use plan_ir::PlanLoader;
use std::path::PathBuf;

pub async fn execute(plan: PathBuf, acts: Option<PathBuf>) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║               flowrt · Plan Inspector               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let plan = PlanLoader::load(&plan)
        .map_err(|e| anyhow::anyhow!("failed to load plan from '{}': {e}", plan.display()))?;

    // ── Summary ────────────────────────────────────────────────
    println!("  {}", plan.summary());
    println!();

    // ── Tasks ──────────────────────────────────────────────────
    println!(
        "  {:<6} {:<22} {:>7} {:>6}  {:<28} {}",
        "Task", "Type", "Machine", "Seed", "Consumes", "Kernels",
    );
    println!("  {}", "-".repeat(88));
    for task in plan.iter_tasks() {
        let consumes = task
            .consumed_regst_desc_ids
            .iter()
            .map(|(name, id)| format!("{name}={id}"))
            .collect::<Vec<_>>()
            .join(",");
        let kernels = task
            .exec_sequence
            .iter()
            .map(|k| k.op_type.as_str())
            .collect::<Vec<_>>()
            .join("→");
        println!(
            "  {:<6} {:<22} {:>7} {:>6}  {:<28} {}",
            task.task_id,
            task.task_type.as_str(),
            task.machine_id,
            task.random_seed.map_or_else(|| "-".to_string(), |s| s.to_string()),
            consumes,
            kernels,
        );
    }
    println!();

    // ── Register descriptors ───────────────────────────────────
    println!(
        "  {:<6} {:<9} {:<12} {:<10} {:>11} {:>5} {:>11}",
        "Desc", "Producer", "Consumers", "Memory", "Bytes/reg", "Regs", "Total",
    );
    println!("  {}", "-".repeat(72));
    for desc in plan.iter_regst_descs() {
        let consumers = desc
            .consumer_task_ids
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "  {:<6} {:<9} {:<12} {:<10} {:>11} {:>5} {:>11}",
            desc.regst_desc_id,
            desc.producer_task_id,
            if consumers.is_empty() { "-".to_string() } else { consumers },
            desc.mem_case.label(),
            fmt_bytes(desc.byte_size_per_register()),
            desc.register_num,
            fmt_bytes(desc.total_byte_size()),
        );
    }
    println!();

    // ── Trace ──────────────────────────────────────────────────
    if let Some(acts) = acts {
        let log = ActEventLog::from_file(&acts)?;
        let graph = ActGraph::new(&plan, &log)?;
        println!("  {}", graph.summary());
        println!();
        println!("  {:<6} {:>14} {:>8} {:>8}", "Desc", "Lifetime (µs)", "Reuse", "Regs@ii");
        println!("  {}", "-".repeat(40));
        let ii = graph.initiation_interval();
        for desc in plan.iter_regst_descs() {
            let duration = graph.duration(desc.regst_desc_id);
            let ratio = graph.reuse_ratio(desc.regst_desc_id);
            let at_ii = if ii > 0.0 {
                format!("{:.1}", duration * ratio / ii)
            } else {
                "-".to_string()
            };
            println!(
                "  {:<6} {:>14.3} {:>8.2} {:>8}",
                desc.regst_desc_id, duration, ratio, at_ii,
            );
        }
        println!();
    }

    Ok(())
}
