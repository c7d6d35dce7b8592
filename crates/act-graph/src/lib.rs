// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # act-graph
//!
//! Execution traces and the dependency graph the improver reasons over.
//!
//! - [`ActEvent`] / [`ActEventLog`] — one timed act per line, JSON lines.
//! - [`ActGraph`] — acts linked by the registers that flowed between them,
//!   with per-descriptor register lifetime, reuse ratio and the observed
//!   initiation interval.

mod error;
mod event;
mod graph;

pub use error::ActGraphError;
pub use event::{ActEvent, ActEventLog};
pub use graph::{ActGraph, RegstEdge};
