// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The execution plan as a set of tasks wired together by register
//! descriptors.
//!
//! # Type-State Pattern
//!
//! ```text
//! Plan<Loaded>     — tasks parsed, not yet checked.
//!       │  .validate()
//!       ▼
//! Plan<Validated>  — ids unique, wiring consistent, ready for the
//!                    improver and the actor runtime.
//! ```

use crate::{PlanError, PlanManifest, RegstDescId, RegstDescProto, TaskId, TaskProto};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: plan has been loaded but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: plan has been validated.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for plan states.
pub trait PlanState: fmt::Debug + Clone {}
impl PlanState for Loaded {}
impl PlanState for Validated {}

// ── Plan ───────────────────────────────────────────────────────────

/// An execution plan. `S` encodes the validation state at compile time.
#[derive(Debug, Clone)]
pub struct Plan<S: PlanState = Loaded> {
    /// Human-readable plan name.
    pub name: String,
    /// Tasks in plan order.
    pub tasks: Vec<TaskProto>,
    _state: std::marker::PhantomData<S>,
}

impl Plan<Loaded> {
    /// Creates a new plan in the `Loaded` state.
    pub fn new(name: String, tasks: Vec<TaskProto>) -> Self {
        Self {
            name,
            tasks,
            _state: std::marker::PhantomData,
        }
    }

    /// Builds a plan from its on-disk manifest.
    pub fn from_manifest(manifest: PlanManifest) -> Self {
        Self::new(manifest.name, manifest.tasks)
    }

    /// Validates the plan and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - At least one task, task ids unique.
    /// - Descriptor ids unique, each produced by the task that declares it.
    /// - Every consumer of a descriptor exists and declares it as consumed.
    /// - Every consumed descriptor is produced somewhere in the plan.
    /// - Register-num bounds are well formed.
    pub fn validate(self) -> Result<Plan<Validated>, PlanError> {
        if self.tasks.is_empty() {
            return Err(PlanError::InvalidPlan("plan contains no tasks".into()));
        }

        let mut task_ids = HashSet::new();
        for task in &self.tasks {
            if !task_ids.insert(task.task_id) {
                return Err(PlanError::InvalidTask {
                    task_id: task.task_id,
                    detail: "duplicate task id".into(),
                });
            }
        }

        let mut produced: HashMap<RegstDescId, &RegstDescProto> = HashMap::new();
        for task in &self.tasks {
            for desc in task.produced_regst_descs.values() {
                if desc.producer_task_id != task.task_id {
                    return Err(PlanError::InvalidRegstDesc {
                        regst_desc_id: desc.regst_desc_id,
                        detail: format!(
                            "declared by task {} but names producer {}",
                            task.task_id, desc.producer_task_id,
                        ),
                    });
                }
                if produced.insert(desc.regst_desc_id, desc).is_some() {
                    return Err(PlanError::InvalidRegstDesc {
                        regst_desc_id: desc.regst_desc_id,
                        detail: "duplicate descriptor id".into(),
                    });
                }
                check_register_bounds(desc)?;
            }
        }

        let tasks_by_id: HashMap<TaskId, &TaskProto> =
            self.tasks.iter().map(|t| (t.task_id, t)).collect();

        for desc in produced.values() {
            for consumer in &desc.consumer_task_ids {
                let task = tasks_by_id.get(consumer).ok_or_else(|| {
                    PlanError::InvalidRegstDesc {
                        regst_desc_id: desc.regst_desc_id,
                        detail: format!("consumer task {consumer} does not exist"),
                    }
                })?;
                if !task.consumes(desc.regst_desc_id) {
                    return Err(PlanError::InvalidRegstDesc {
                        regst_desc_id: desc.regst_desc_id,
                        detail: format!(
                            "task {consumer} is listed as consumer but does not consume it"
                        ),
                    });
                }
            }
        }

        for task in &self.tasks {
            for (name, id) in &task.consumed_regst_desc_ids {
                let desc = produced.get(id).ok_or_else(|| PlanError::InvalidTask {
                    task_id: task.task_id,
                    detail: format!("consumed descriptor '{name}' ({id}) is never produced"),
                })?;
                if !desc.consumer_task_ids.contains(&task.task_id) {
                    return Err(PlanError::InvalidTask {
                        task_id: task.task_id,
                        detail: format!(
                            "consumes '{name}' ({id}) but is not among its consumers"
                        ),
                    });
                }
            }
        }

        Ok(Plan {
            name: self.name,
            tasks: self.tasks,
            _state: std::marker::PhantomData,
        })
    }
}

fn check_register_bounds(desc: &RegstDescProto) -> Result<(), PlanError> {
    if desc.min_register_num == 0 {
        return Err(PlanError::InvalidRegstDesc {
            regst_desc_id: desc.regst_desc_id,
            detail: "min_register_num must be at least 1".into(),
        });
    }
    if let Some(max) = desc.max_register_num {
        if max < desc.min_register_num {
            return Err(PlanError::InvalidRegstDesc {
                regst_desc_id: desc.regst_desc_id,
                detail: format!(
                    "max_register_num {max} is below min_register_num {}",
                    desc.min_register_num,
                ),
            });
        }
    }
    Ok(())
}

// ── Validated state ────────────────────────────────────────────────

impl Plan<Validated> {
    /// Returns the number of tasks.
    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Returns a task by id.
    pub fn task(&self, task_id: TaskId) -> Option<&TaskProto> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    /// Iterates over tasks in plan order.
    pub fn iter_tasks(&self) -> impl Iterator<Item = &TaskProto> {
        self.tasks.iter()
    }

    /// Iterates over every register descriptor in the plan.
    pub fn iter_regst_descs(&self) -> impl Iterator<Item = &RegstDescProto> {
        self.tasks
            .iter()
            .flat_map(|t| t.produced_regst_descs.values())
    }

    /// Returns a register descriptor by id.
    pub fn regst_desc(&self, regst_desc_id: RegstDescId) -> Option<&RegstDescProto> {
        self.iter_regst_descs()
            .find(|d| d.regst_desc_id == regst_desc_id)
    }

    /// Returns the machine a descriptor's producer runs on.
    pub fn machine_of(&self, desc: &RegstDescProto) -> Option<i64> {
        self.task(desc.producer_task_id).map(|t| t.machine_id)
    }

    /// Total bytes of every register instance in the plan.
    pub fn total_regst_bytes(&self) -> u64 {
        self.iter_regst_descs().map(|d| d.total_byte_size()).sum()
    }

    /// Returns a copy of the plan with register counts replaced.
    ///
    /// Descriptors missing from `register_nums` keep their count. Each new
    /// count is clamped into the descriptor's bounds, so the result stays
    /// valid.
    pub fn with_register_nums(&self, register_nums: &BTreeMap<RegstDescId, u64>) -> Self {
        let mut plan = self.clone();
        for task in &mut plan.tasks {
            for desc in task.produced_regst_descs.values_mut() {
                if let Some(&n) = register_nums.get(&desc.regst_desc_id) {
                    desc.register_num = desc.clamp_register_num(n);
                }
            }
        }
        plan
    }

    /// Converts the plan back into its on-disk manifest.
    pub fn to_manifest(&self) -> PlanManifest {
        PlanManifest {
            name: self.name.clone(),
            tasks: self.tasks.clone(),
        }
    }

    /// Returns a summary string describing the plan.
    pub fn summary(&self) -> String {
        let num_descs = self.iter_regst_descs().count();
        format!(
            "Plan '{}': {} tasks, {} register descriptors, {:.2} MB of registers",
            self.name,
            self.num_tasks(),
            num_descs,
            self.total_regst_bytes() as f64 / (1024.0 * 1024.0),
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: PlanState> fmt::Display for Plan<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plan '{}' ({} tasks):", self.name, self.tasks.len())?;
        for task in &self.tasks {
            writeln!(
                f,
                "  task {:>4} {:<22} machine {}",
                task.task_id, task.task_type, task.machine_id,
            )?;
            for desc in task.produced_regst_descs.values() {
                writeln!(f, "    {}", desc.summary())?;
            }
        }
        Ok(())
    }
}
