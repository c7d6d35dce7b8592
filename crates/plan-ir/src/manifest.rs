// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON plan manifest: the on-disk schema shared by the improver (input
//! and output) and the actor runtime.
//!
//! # Format
//! ```json
//! {
//!   "name": "mlp-train",
//!   "tasks": [
//!     {
//!       "task_id": 1,
//!       "task_type": "normal_forward",
//!       "machine_id": 0,
//!       "random_seed": 42,
//!       "consumed_regst_desc_ids": { "in": 10, "model": 20 },
//!       "produced_regst_descs": {
//!         "out": {
//!           "regst_desc_id": 11,
//!           "producer_task_id": 1,
//!           "consumer_task_ids": [2],
//!           "mem_case": { "kind": "device_mem", "device_id": 0 },
//!           "blobs": [{ "lbn": "fc1/out", "shape": [32, 128] }],
//!           "register_num": 1
//!         }
//!       }
//!     }
//!   ]
//! }
//! ```

use crate::{PlanError, TaskProto};
use std::path::Path;

/// Top-level plan manifest.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlanManifest {
    /// Human-readable plan name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Every task of the plan.
    pub tasks: Vec<TaskProto>,
}

fn default_name() -> String {
    "plan".to_string()
}

impl PlanManifest {
    /// Loads a manifest from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        let manifest: Self = serde_json::from_str(json)?;
        Ok(manifest)
    }

    /// Serialises the manifest to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the manifest to a JSON file.
    pub fn write_file(&self, path: &Path) -> Result<(), PlanError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
