// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # improver
//!
//! Rewrites the register counts of a plan so that pieces can be launched
//! as often as possible without any memory zone running out.
//!
//! ```text
//! Plan<Validated> + ActEventLog ──► ActGraph ──► durations, reuse ratios, base ii
//!                                                   │
//!                 AvailableMemDesc ──► zone buckets ┴─► bisection on ii ──► Improvement
//! ```
//!
//! # Example
//! ```no_run
//! use act_graph::ActEventLog;
//! use improver::{Improver, ImproverConfig};
//! use memory_zone::AvailableMemDesc;
//! use plan_ir::PlanLoader;
//! use std::path::Path;
//!
//! let plan = PlanLoader::load(Path::new("./plan.json")).unwrap();
//! let log = ActEventLog::from_file(Path::new("./acts.jsonl")).unwrap();
//! let amd = AvailableMemDesc::from_file(Path::new("./mem.toml")).unwrap();
//!
//! let improvement = Improver::new(amd, ImproverConfig::default())
//!     .improve(&plan, &log)
//!     .unwrap();
//! println!("{}", improvement.summary());
//! ```

mod config;
mod error;
mod improver;
pub mod mem_zone;
pub mod search;

pub use config::ImproverConfig;
pub use error::ImproverError;
pub use improver::{Improvement, Improver, ZoneUsage};
pub use search::{binary_search_ii, RegstDemand, ZoneDemand};
