// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Execution metrics.
//!
//! [`ActorMetrics`] counts what one actor did; [`SystemReport`] gathers
//! them together with the recorded act trace after a run.

use act_graph::ActEventLog;
use plan_ir::{ActorId, TaskType};
use std::time::Duration;

/// Counters for a single actor.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ActorMetrics {
    pub actor_id: ActorId,
    pub task_type: TaskType,
    /// Number of acts executed.
    pub acts: usize,
    /// Time spent inside acts.
    pub act_duration: Duration,
    /// Messages handled.
    pub msgs_processed: usize,
    /// Register tokens sent to consumers.
    pub regsts_sent: usize,
}

impl ActorMetrics {
    pub fn new(actor_id: ActorId, task_type: TaskType) -> Self {
        Self {
            actor_id,
            task_type,
            acts: 0,
            act_duration: Duration::ZERO,
            msgs_processed: 0,
            regsts_sent: 0,
        }
    }

    /// Records one act that took `micros` microseconds.
    pub fn record_act(&mut self, micros: f64, regsts_sent: usize) {
        self.acts += 1;
        self.act_duration += Duration::from_nanos((micros.max(0.0) * 1000.0).round() as u64);
        self.regsts_sent += regsts_sent;
    }

    /// Mean act duration.
    pub fn mean_act_duration(&self) -> Duration {
        if self.acts == 0 {
            Duration::ZERO
        } else {
            self.act_duration / self.acts as u32
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct SystemReport {
    /// Wall-clock time from spawn to the last actor finishing.
    pub total_duration: Duration,
    /// Per-actor metrics, by actor id.
    pub actor_metrics: Vec<ActorMetrics>,
    /// Every recorded act.
    pub act_events: ActEventLog,
}

impl SystemReport {
    /// Total acts across all actors.
    pub fn total_acts(&self) -> usize {
        self.actor_metrics.iter().map(|m| m.acts).sum()
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let busiest = self
            .actor_metrics
            .iter()
            .max_by_key(|m| m.act_duration)
            .map(|m| format!("actor {} ({})", m.actor_id, m.task_type))
            .unwrap_or_else(|| "none".into());
        format!(
            "Run: {:.2}ms total, {} actors, {} acts, {} act events recorded, busiest {}",
            self.total_duration.as_secs_f64() * 1000.0,
            self.actor_metrics.len(),
            self.total_acts(),
            self.act_events.len(),
            busiest,
        )
    }
}
