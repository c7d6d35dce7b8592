// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the improver.

use memory_zone::MemZoneKey;

/// Errors that can occur while improving a plan.
#[derive(Debug, thiserror::Error)]
pub enum ImproverError {
    /// A descriptor maps to a zone the availability table does not list.
    #[error("regst_desc {regst_desc_id} maps to machine {machine_id} zone {zone_id}, which has no available memory entry")]
    MissingMemZone {
        regst_desc_id: plan_ir::RegstDescId,
        machine_id: i64,
        zone_id: i64,
    },

    /// Even with every descriptor at its minimum count, a zone overflows.
    #[error("no feasible pipeline interval: {zone} needs {required} bytes at minimum register counts, {available} available")]
    NoFeasibleInterval {
        zone: MemZoneKey,
        required: u64,
        available: u64,
    },

    /// The emitted plan breaks a zone budget.
    #[error("{zone} over budget: {used} bytes used, {available} available")]
    BudgetExceeded {
        zone: MemZoneKey,
        used: u64,
        available: u64,
    },

    /// Invalid improver configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The plan is inconsistent.
    #[error("plan error: {0}")]
    Plan(#[from] plan_ir::PlanError),

    /// The act trace could not be turned into a graph.
    #[error("act graph error: {0}")]
    ActGraph(#[from] act_graph::ActGraphError),
}
