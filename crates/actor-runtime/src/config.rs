// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Job configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! is_train = true
//! pieces_per_batch = 4
//! model_staleness = 0
//! total_batch_num = 8
//! record_acts = true
//! ```

use crate::ActorError;
use plan_ir::{ModelVersionId, PieceId};
use std::path::Path;

/// Job-wide settings shared by every actor.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JobConf {
    /// Training jobs release model registers as soon as their batch is done.
    #[serde(default)]
    pub is_train: bool,
    /// Pieces per batch; one model version serves one batch.
    pub pieces_per_batch: i64,
    /// Extra batches a model version may serve beyond its own.
    #[serde(default)]
    pub model_staleness: i64,
    /// Batches the source actors emit.
    #[serde(default = "default_total_batch_num")]
    pub total_batch_num: i64,
    /// Whether actors report act events.
    #[serde(default = "default_true")]
    pub record_acts: bool,
}

fn default_total_batch_num() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

impl JobConf {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ActorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ActorError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ActorError> {
        let conf: Self = toml::from_str(toml_str)
            .map_err(|e| ActorError::Config(format!("TOML parse error: {e}")))?;
        conf.validate()?;
        Ok(conf)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ActorError> {
        toml::to_string_pretty(self)
            .map_err(|e| ActorError::Config(format!("TOML serialise error: {e}")))
    }

    pub fn validate(&self) -> Result<(), ActorError> {
        if self.pieces_per_batch < 1 {
            return Err(ActorError::Config(format!(
                "pieces_per_batch must be at least 1, got {}",
                self.pieces_per_batch
            )));
        }
        if self.model_staleness < 0 {
            return Err(ActorError::Config(format!(
                "model_staleness must be non-negative, got {}",
                self.model_staleness
            )));
        }
        if self.total_batch_num < 0 {
            return Err(ActorError::Config(format!(
                "total_batch_num must be non-negative, got {}",
                self.total_batch_num
            )));
        }
        Ok(())
    }

    /// The last piece a model version may be used for.
    pub fn last_piece_id_for_model_version(&self, model_version_id: ModelVersionId) -> PieceId {
        (model_version_id + self.model_staleness + 1) * self.pieces_per_batch - 1
    }

    /// Pieces emitted by each source actor.
    pub fn total_piece_num(&self) -> i64 {
        self.total_batch_num * self.pieces_per_batch
    }
}

impl Default for JobConf {
    fn default() -> Self {
        Self {
            is_train: false,
            pieces_per_batch: 1,
            model_staleness: 0,
            total_batch_num: default_total_batch_num(),
            record_acts: true,
        }
    }
}
