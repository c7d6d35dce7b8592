// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for act traces.

/// Errors that can occur while reading a trace or building the act graph.
#[derive(Debug, thiserror::Error)]
pub enum ActGraphError {
    /// The act event file could not be read or written.
    #[error("act event log I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A line of the act event log is not a valid event.
    #[error("malformed act event on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// An event has inconsistent timing.
    #[error("invalid act event on line {line}: {detail}")]
    InvalidEvent { line: usize, detail: String },

    /// No event belongs to a task of the plan.
    #[error("act trace contains no events for this plan")]
    EmptyTrace,

    /// The derived dependency graph has a cycle.
    #[error("act graph contains a cycle")]
    CyclicTrace,
}
