// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # plan-ir
//!
//! The execution plan shared by the improver and the actor runtime.
//!
//! - [`RegstDescProto`] — one register class: producer, consumers, memory
//!   case, blob layout and register count.
//! - [`TaskProto`] — one task (one actor at run time) with the descriptors
//!   it consumes by symbolic name and the ones it produces.
//! - [`Plan`] — all tasks, with a **type-state pattern**
//!   (`Loaded` → `Validated`).
//! - [`PlanManifest`] / [`PlanLoader`] — the JSON on-disk schema.
//!
//! # Example
//! ```no_run
//! use plan_ir::PlanLoader;
//! use std::path::Path;
//!
//! let plan = PlanLoader::load(Path::new("./plan.json")).unwrap();
//! println!("{}", plan.summary());
//! for desc in plan.iter_regst_descs() {
//!     println!("  {}", desc.summary());
//! }
//! ```

mod error;
mod loader;
mod manifest;
pub mod plan;
mod regst_desc;
mod task;

pub use error::PlanError;
pub use loader::PlanLoader;
pub use manifest::PlanManifest;
pub use plan::Plan;
pub use regst_desc::{BlobDesc, MemoryCase, RegstDescProto, ELEM_BYTES};
pub use task::{KernelConf, ParallelContext, TaskProto, TaskType};

/// Id of a register descriptor.
pub type RegstDescId = i64;
/// Id of a task; equal to the id of the actor that runs it.
pub type TaskId = i64;
/// Id of an actor.
pub type ActorId = TaskId;
/// Id of a piece, the smallest schedulable unit of data.
pub type PieceId = i64;
/// Id of a model version.
pub type ModelVersionId = i64;
