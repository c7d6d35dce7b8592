// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for plan loading and validation.

use crate::{RegstDescId, TaskId};

/// Errors that can occur when working with execution plans.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The plan file could not be read or written.
    #[error("plan I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The plan JSON is malformed.
    #[error("failed to parse plan: {0}")]
    Parse(#[from] serde_json::Error),

    /// A task definition is inconsistent.
    #[error("invalid task {task_id}: {detail}")]
    InvalidTask { task_id: TaskId, detail: String },

    /// A register descriptor is inconsistent.
    #[error("invalid register descriptor {regst_desc_id}: {detail}")]
    InvalidRegstDesc {
        regst_desc_id: RegstDescId,
        detail: String,
    },

    /// The plan as a whole is malformed.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}
