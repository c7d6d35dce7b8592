// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Improver configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! device_num_per_machine = 2
//! tolerance = 0.001
//! max_iterations = 64
//! ```

use crate::ImproverError;
use std::path::Path;

/// Configuration for the pipeline interval search.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImproverConfig {
    /// Device zones per machine; the host zone comes right after them.
    #[serde(default)]
    pub device_num_per_machine: i64,
    /// The search stops once the bracketing interval is this narrow.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Upper bound on bisection steps.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_tolerance() -> f64 {
    1e-3
}

fn default_max_iterations() -> usize {
    64
}

impl ImproverConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ImproverError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ImproverError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ImproverError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ImproverError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ImproverError> {
        toml::to_string_pretty(self)
            .map_err(|e| ImproverError::Config(format!("TOML serialise error: {e}")))
    }

    /// Checks that the values make sense.
    pub fn validate(&self) -> Result<(), ImproverError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ImproverError::Config(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(ImproverError::Config("max_iterations must be at least 1".into()));
        }
        if self.device_num_per_machine < 0 {
            return Err(ImproverError::Config(format!(
                "device_num_per_machine must be non-negative, got {}",
                self.device_num_per_machine
            )));
        }
        Ok(())
    }
}

impl Default for ImproverConfig {
    fn default() -> Self {
        Self {
            device_num_per_machine: 0,
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}
