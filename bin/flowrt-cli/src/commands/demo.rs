// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `flowrt demo` command: the whole loop on a synthetic plan.
//!
//! ```text
//! naive plan ──ActorSystem──► act trace ──Improver──► improved plan
//! ```
//!
//! The plan is `source → fc → relu → loss`, with `fc` reading its weights
//! from a model-update task that this command plays itself.

use super::fmt_bytes;
use actor_runtime::{
    alloc_blobs, ActorEnv, ActorError, ActorMsg, ActorRegistry, ActorSystem, Endpoint, JobConf,
    Regst, SafeTensorsSnapshot,
};
use improver::{Improver, ImproverConfig};
use memory_zone::{AvailableMemDesc, MemoryBudget};
use plan_ir::plan::Validated;
use plan_ir::{
    BlobDesc, KernelConf, MemoryCase, Plan, PlanLoader, RegstDescId, RegstDescProto, TaskId,
    TaskProto, TaskType,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const SOURCE: TaskId = 0;
const FC: TaskId = 1;
const RELU: TaskId = 2;
const LOSS: TaskId = 3;
const MODEL_UPDATE: TaskId = 4;

const DATA: RegstDescId = 10;
const FC_OUT: RegstDescId = 11;
const RELU_OUT: RegstDescId = 12;
const LOSS_OUT: RegstDescId = 13;
const MODEL: RegstDescId = 20;

const INIT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DemoArgs {
    pub batches: i64,
    pub pieces_per_batch: i64,
    pub train: bool,
    pub elems: usize,
    pub memory: String,
    pub job: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

pub async fn execute(args: DemoArgs) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                flowrt · Pipeline Demo               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let job = match &args.job {
        Some(path) => JobConf::from_file(path)?,
        None => {
            let job = JobConf {
                is_train: args.train,
                pieces_per_batch: args.pieces_per_batch,
                total_batch_num: args.batches,
                ..Default::default()
            };
            job.validate()?;
            job
        }
    };
    let budget = MemoryBudget::parse(&args.memory)
        .map_err(|e| anyhow::anyhow!("invalid memory budget: {e}"))?;
    let plan = synthetic_plan(args.elems)?;

    println!("  Config:");
    println!("   Mode:     {}", if job.is_train { "training" } else { "inference" });
    println!("   Pieces:   {} ({} per batch)", job.total_piece_num(), job.pieces_per_batch);
    println!("   Memory:   {budget}");
    println!("   Plan:     {}", plan.summary());
    println!();

    // ── [1/3] Run ──────────────────────────────────────────────
    println!("  [1/3] Running the naive plan...");
    let mut env = ActorEnv::new(job.clone());
    if let Some(path) = &args.snapshot {
        env = env.with_snapshot(Arc::new(SafeTensorsSnapshot::open(path)?));
        println!("        Weights from {}", path.display());
    }

    let mut system = ActorSystem::spawn(&plan, &ActorRegistry::with_defaults(), &env)?;
    let mut endpoint = system
        .take_endpoint(MODEL_UPDATE)
        .ok_or_else(|| anyhow::anyhow!("model update task {MODEL_UPDATE} has an actor"))?;
    let model_desc = plan
        .regst_desc(MODEL)
        .ok_or_else(|| anyhow::anyhow!("plan has no model descriptor"))?;

    // fc is seeded, so it initialises the model before reading any input.
    let model = Regst::new(MODEL, 0, MODEL_UPDATE, alloc_blobs(model_desc));
    endpoint.send(FC, ActorMsg::Regst(model))?;
    let initialised = match tokio::time::timeout(INIT_TIMEOUT, endpoint.recv()).await {
        Ok(Some(ActorMsg::Regst(model))) => model,
        Ok(other) => anyhow::bail!(
            "expected the initialised model back from fc, got {}",
            other.as_ref().map_or("nothing", ActorMsg::kind),
        ),
        Err(_) => anyhow::bail!("fc did not initialise its model within {INIT_TIMEOUT:?}"),
    };
    endpoint.send(FC, ActorMsg::Regst(initialised.with_model_version_id(Some(0))))?;
    system.start()?;
    let driver = tokio::spawn(drive_model_update(endpoint, job.clone()));

    let report = system.join().await?;
    let versions = driver.await??;
    println!("        {}", report.summary());
    println!("        Model versions served: {versions:?}");
    println!();

    println!(
        "  {:<6} {:<22} {:>6} {:>14} {:>8}",
        "Actor", "Type", "Acts", "Mean act (µs)", "Msgs",
    );
    println!("  {}", "-".repeat(60));
    for m in &report.actor_metrics {
        println!(
            "  {:<6} {:<22} {:>6} {:>14.2} {:>8}",
            m.actor_id,
            m.task_type.as_str(),
            m.acts,
            m.mean_act_duration().as_secs_f64() * 1e6,
            m.msgs_processed,
        );
    }
    println!();

    if report.act_events.is_empty() {
        tracing::warn!("no act events recorded; skipping the improver");
        println!("  No act events recorded (record_acts = false); nothing to improve.");
        return Ok(());
    }

    // ── [2/3] Improve ──────────────────────────────────────────
    println!("  [2/3] Improving register counts for {budget} of host memory...");
    println!();
    let available = AvailableMemDesc::new(vec![vec![budget]]);
    let improvement = Improver::new(available.clone(), ImproverConfig::default())
        .improve(&plan, &report.act_events)?;
    super::improve::print_improvement(&plan, &improvement);
    println!(
        "  Registers: {} naive → {} improved",
        fmt_bytes(plan.total_regst_bytes()),
        fmt_bytes(improvement.plan.total_regst_bytes()),
    );
    println!();

    // ── [3/3] Write ────────────────────────────────────────────
    match &args.output_dir {
        Some(dir) => {
            println!("  [3/3] Writing artifacts to {}...", dir.display());
            std::fs::create_dir_all(dir)?;
            PlanLoader::save(&plan, &dir.join("plan.json"))?;
            report.act_events.write_file(&dir.join("acts.jsonl"))?;
            std::fs::write(dir.join("mem.toml"), available.to_toml()?)?;
            PlanLoader::save(&improvement.plan, &dir.join("improved.json"))?;
            println!("        plan.json, acts.jsonl, mem.toml, improved.json");
        }
        None => println!("  [3/3] No --output-dir given; artifacts not written."),
    }
    println!();
    Ok(())
}

/// Builds the naive demo plan: every descriptor has one register.
fn synthetic_plan(elems: usize) -> anyhow::Result<Plan<Validated>> {
    let desc = |id, producer, consumers: Vec<TaskId>, blobs: Vec<BlobDesc>| {
        RegstDescProto::new(id, producer, consumers, MemoryCase::HostMem, blobs)
    };

    let tasks = vec![
        TaskProto::new(SOURCE, TaskType::Source, 0)
            .with_produced("out", desc(DATA, SOURCE, vec![FC], vec![BlobDesc::new("data/x", vec![elems])]))
            .with_kernel(KernelConf::new("synthetic_input").with_bn("out", "data/x")),
        TaskProto::new(FC, TaskType::NormalForward, 0)
            .with_consumed("in", DATA)
            .with_consumed("model", MODEL)
            .with_produced("out", desc(FC_OUT, FC, vec![RELU], vec![BlobDesc::new("fc/y", vec![elems])]))
            .with_kernel(
                KernelConf::new("affine")
                    .with_bn("in", "data/x")
                    .with_bn("weight", "fc/weight")
                    .with_bn("bias", "fc/bias")
                    .with_bn("out", "fc/y"),
            )
            .with_random_seed(7),
        TaskProto::new(RELU, TaskType::NormalForward, 0)
            .with_consumed("in", FC_OUT)
            .with_produced("out", desc(RELU_OUT, RELU, vec![LOSS], vec![BlobDesc::new("relu/y", vec![elems])]))
            .with_kernel(KernelConf::new("relu").with_bn("in", "fc/y").with_bn("out", "relu/y")),
        TaskProto::new(LOSS, TaskType::Loss, 0)
            .with_consumed("in", RELU_OUT)
            .with_produced("loss", desc(LOSS_OUT, LOSS, vec![], vec![BlobDesc::new("loss", vec![1])]))
            .with_kernel(KernelConf::new("square_sum").with_bn("in", "relu/y").with_bn("out", "loss")),
        TaskProto::new(MODEL_UPDATE, TaskType::ModelUpdate, 0).with_produced(
            "model",
            desc(
                MODEL,
                MODEL_UPDATE,
                vec![FC],
                vec![
                    BlobDesc::new("fc/weight", vec![elems]),
                    BlobDesc::new("fc/bias", vec![1]),
                ],
            ),
        ),
    ];
    Ok(Plan::new("demo-chain".into(), tasks).validate()?)
}

/// Plays the model-update task once version 0 is out.
///
/// In training mode each returned version is replaced by the next until
/// every batch has had one; then the model stream ends. Returns the
/// versions that came back.
async fn drive_model_update(mut endpoint: Endpoint, job: JobConf) -> Result<Vec<i64>, ActorError> {
    let mut served = Vec::new();
    while let Some(msg) = endpoint.recv().await {
        let ActorMsg::Regst(model) = msg else {
            continue;
        };
        let version = model.model_version_id().unwrap_or(0);
        served.push(version);
        if job.is_train && version + 1 < job.total_batch_num {
            let next = model.with_model_version_id(Some(version + 1));
            endpoint.send(FC, ActorMsg::Regst(next))?;
        } else {
            endpoint.send(FC, ActorMsg::Eord(MODEL))?;
            break;
        }
    }
    Ok(served)
}
