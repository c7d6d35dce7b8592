// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # flowrt
//!
//! Command-line interface for the flowrt actor runtime and plan improver.
//!
//! ## Usage
//! ```bash
//! # Run a synthetic plan, record its acts, and improve it
//! flowrt demo --batches 8 --memory 64K --output-dir ./out
//!
//! # Improve a plan from a recorded trace
//! flowrt improve --plan ./out/plan.json --acts ./out/acts.jsonl --mem ./out/mem.toml -o improved.json
//!
//! # Inspect a plan
//! flowrt inspect --plan ./out/improved.json --acts ./out/acts.jsonl
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "flowrt",
    about = "Register-passing dataflow actors and a memory-limited plan improver",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a plan's register counts for the smallest feasible interval.
    Improve {
        /// Naive plan (JSON manifest).
        #[arg(short, long)]
        plan: PathBuf,

        /// Act event log (JSON lines) recorded while running the plan.
        #[arg(short, long)]
        acts: PathBuf,

        /// Memory availability table (TOML).
        #[arg(short, long)]
        mem: PathBuf,

        /// Improver configuration (TOML).
        #[arg(short = 'c', long)]
        improver_config: Option<PathBuf>,

        /// Devices per machine; overrides the configuration file.
        #[arg(long)]
        device_num: Option<i64>,

        /// Where to write the improved plan.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print a plan's tasks and register descriptors.
    Inspect {
        /// Plan (JSON manifest).
        #[arg(short, long)]
        plan: PathBuf,

        /// Optional act event log to derive durations and reuse ratios from.
        #[arg(short, long)]
        acts: Option<PathBuf>,
    },

    /// Run a synthetic source → fc → relu → loss plan, then improve it.
    Demo {
        /// Batches emitted by the source.
        #[arg(long, default_value_t = 8)]
        batches: i64,

        /// Pieces per batch.
        #[arg(long, default_value_t = 2)]
        pieces_per_batch: i64,

        /// Run in training mode (one model version per batch).
        #[arg(long)]
        train: bool,

        /// Elements per activation blob.
        #[arg(long, default_value_t = 1024)]
        elems: usize,

        /// Host memory available to registers (e.g., "64K", "1M").
        #[arg(short = 'b', long, default_value = "64K")]
        memory: String,

        /// Job configuration (TOML); overrides the flags above.
        #[arg(long)]
        job: Option<PathBuf>,

        /// SafeTensors file with initial weights for `fc`.
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Directory to write plan.json, acts.jsonl, mem.toml and improved.json to.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Improve {
            plan,
            acts,
            mem,
            improver_config,
            device_num,
            output,
        } => commands::improve::execute(plan, acts, mem, improver_config, device_num, output).await,
        Commands::Inspect { plan, acts } => commands::inspect::execute(plan, acts).await,
        Commands::Demo {
            batches,
            pieces_per_batch,
            train,
            elems,
            memory,
            job,
            snapshot,
            output_dir,
        } => {
            let args = commands::demo::DemoArgs {
                batches,
                pieces_per_batch,
                train,
                elems,
                memory,
                job,
                snapshot,
                output_dir,
            };
            commands::demo::execute(args).await
        }
    }
}
