// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Task definitions: one task becomes one actor at run time.

use crate::{RegstDescId, RegstDescProto, TaskId};
use std::collections::BTreeMap;

/// The kind of computation a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Reads pieces from a data source.
    Source,
    /// Forward pass of an operator.
    NormalForward,
    /// Loss computation.
    Loss,
    /// Forward pass of a normalization operator (consumes `norm_model`).
    NormalizationForward,
    /// Backward pass of an operator.
    NormalBackward,
    /// Applies gradients to the model and emits new model versions.
    ModelUpdate,
    /// Persists model snapshots.
    ModelSave,
}

impl TaskType {
    /// Parses a task type, accepting a few common aliases.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "source" | "decode" => Some(Self::Source),
            "normal_forward" | "forward" | "fw" => Some(Self::NormalForward),
            "loss" => Some(Self::Loss),
            "normalization_forward" | "norm_forward" => Some(Self::NormalizationForward),
            "normal_backward" | "backward" | "bw" => Some(Self::NormalBackward),
            "model_update" | "md_updt" | "mdupdt" => Some(Self::ModelUpdate),
            "model_save" | "md_save" | "mdsave" => Some(Self::ModelSave),
            _ => None,
        }
    }

    /// Returns a human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::NormalForward => "normal_forward",
            Self::Loss => "loss",
            Self::NormalizationForward => "normalization_forward",
            Self::NormalBackward => "normal_backward",
            Self::ModelUpdate => "model_update",
            Self::ModelSave => "model_save",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a task among the data-parallel replicas of one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParallelContext {
    pub parallel_id: i64,
    pub parallel_num: i64,
}

impl Default for ParallelContext {
    fn default() -> Self {
        Self {
            parallel_id: 0,
            parallel_num: 1,
        }
    }
}

/// One kernel of a task, with its blob bindings.
///
/// `bn_in_op2lbn` maps the kernel's local blob names (`"in"`, `"weight"`,
/// `"out"`, ...) to plan-wide logical blob names.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KernelConf {
    pub op_type: String,
    #[serde(default)]
    pub bn_in_op2lbn: BTreeMap<String, String>,
}

impl KernelConf {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            bn_in_op2lbn: BTreeMap::new(),
        }
    }

    /// Binds a local blob name to a logical blob name.
    pub fn with_bn(mut self, bn_in_op: &str, lbn: &str) -> Self {
        self.bn_in_op2lbn.insert(bn_in_op.to_string(), lbn.to_string());
        self
    }

    /// Logical blob name bound to `bn_in_op`.
    pub fn lbn4bn_in_op(&self, bn_in_op: &str) -> Option<&str> {
        self.bn_in_op2lbn.get(bn_in_op).map(String::as_str)
    }
}

/// One node of the execution plan.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskProto {
    /// Plan-wide unique id; also the id of the actor running the task.
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub machine_id: i64,
    /// Seed for model initialisation. Tasks without a seed never
    /// initialise weights themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<i64>,
    #[serde(default)]
    pub parallel_ctx: ParallelContext,
    /// Symbolic name (`"in"`, `"model"`, `"model_tmp"`, `"norm_model"`)
    /// to consumed descriptor id.
    #[serde(default)]
    pub consumed_regst_desc_ids: BTreeMap<String, RegstDescId>,
    /// Symbolic name (e.g. `"out"`) to produced descriptor.
    #[serde(default)]
    pub produced_regst_descs: BTreeMap<String, RegstDescProto>,
    /// Kernels run on every act, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exec_sequence: Vec<KernelConf>,
}

impl TaskProto {
    /// Creates a task with no consumed or produced descriptors.
    pub fn new(task_id: TaskId, task_type: TaskType, machine_id: i64) -> Self {
        Self {
            task_id,
            task_type,
            machine_id,
            random_seed: None,
            parallel_ctx: ParallelContext::default(),
            consumed_regst_desc_ids: BTreeMap::new(),
            produced_regst_descs: BTreeMap::new(),
            exec_sequence: Vec::new(),
        }
    }

    /// Looks up a consumed descriptor id by its symbolic name.
    pub fn regst_desc_id4name(&self, name: &str) -> Option<RegstDescId> {
        self.consumed_regst_desc_ids.get(name).copied()
    }

    /// Looks up a produced descriptor by id.
    pub fn produced_regst_desc(&self, regst_desc_id: RegstDescId) -> Option<&RegstDescProto> {
        self.produced_regst_descs
            .values()
            .find(|d| d.regst_desc_id == regst_desc_id)
    }

    /// Returns `true` if the task consumes the given descriptor.
    pub fn consumes(&self, regst_desc_id: RegstDescId) -> bool {
        self.consumed_regst_desc_ids
            .values()
            .any(|&id| id == regst_desc_id)
    }

    /// Builder-style helper: declares a consumed descriptor.
    pub fn with_consumed(mut self, name: &str, regst_desc_id: RegstDescId) -> Self {
        self.consumed_regst_desc_ids
            .insert(name.to_string(), regst_desc_id);
        self
    }

    /// Builder-style helper: declares a produced descriptor.
    pub fn with_produced(mut self, name: &str, desc: RegstDescProto) -> Self {
        self.produced_regst_descs.insert(name.to_string(), desc);
        self
    }

    /// Builder-style helper: appends a kernel.
    pub fn with_kernel(mut self, kernel: KernelConf) -> Self {
        self.exec_sequence.push(kernel);
        self
    }

    /// Builder-style helper: sets the random seed.
    pub fn with_random_seed(mut self, seed: i64) -> Self {
        self.random_seed = Some(seed);
        self
    }
}
