// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for memory zone configuration.

/// Errors that can occur while loading memory budgets.
#[derive(Debug, thiserror::Error)]
pub enum MemZoneError {
    /// A budget string could not be parsed.
    #[error("invalid budget '{input}': {detail}")]
    InvalidBudget { input: String, detail: String },

    /// The availability table file could not be read.
    #[error("cannot read availability table '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The availability table is malformed.
    #[error("availability table error: {0}")]
    Config(String),
}
