// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The act graph: a dependency graph over recorded act events.
//!
//! Nodes are act events. For every register descriptor of the plan, an
//! edge runs from each act of the producer to every consumer act that read
//! the register it produced:
//!
//! ```text
//! producer act i (piece p_i)  ──regst_desc──►  consumer act (piece q)
//!     with p_i ≤ q < p_{i+1}  and  consumer.start ≥ producer.end
//! ```
//!
//! A per-piece register is produced once per piece, so its window is a
//! single piece. A model register produced once per batch is read by every
//! piece of that batch.
//!
//! From the graph three quantities are derived:
//! - `duration(desc)` — mean time a register instance stays alive, from
//!   the start of the producing act to the end of its last reader;
//! - `reuse_ratio(desc)` — register instances produced per piece;
//! - `initiation_interval()` — the busiest actor's time per piece, which
//!   bounds how fast pieces can be launched.

use crate::{ActEvent, ActEventLog, ActGraphError};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use plan_ir::plan::Validated;
use plan_ir::{ActorId, Plan, RegstDescId};
use std::collections::{BTreeSet, HashMap};

/// Edge payload: the descriptor whose register flows along the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegstEdge {
    pub regst_desc_id: RegstDescId,
}

/// Dependency graph of act events, with derived per-descriptor timing.
#[derive(Debug)]
pub struct ActGraph {
    graph: DiGraph<ActEvent, RegstEdge>,
    num_pieces: usize,
    durations: HashMap<RegstDescId, f64>,
    ratios: HashMap<RegstDescId, f64>,
    initiation_interval: f64,
}

impl ActGraph {
    /// Builds the graph for `plan` from the recorded `log`.
    ///
    /// Events of actors that are not tasks of the plan are ignored.
    pub fn new(plan: &Plan<Validated>, log: &ActEventLog) -> Result<Self, ActGraphError> {
        let mut graph: DiGraph<ActEvent, RegstEdge> = DiGraph::new();
        let mut acts_by_actor: HashMap<ActorId, Vec<NodeIndex>> = HashMap::new();
        let mut ignored = 0usize;

        for event in log.iter() {
            if plan.task(event.actor_id).is_none() {
                ignored += 1;
                continue;
            }
            let idx = graph.add_node(*event);
            acts_by_actor.entry(event.actor_id).or_default().push(idx);
        }
        if ignored > 0 {
            tracing::warn!("ignored {ignored} act events of actors outside the plan");
        }
        if graph.node_count() == 0 {
            return Err(ActGraphError::EmptyTrace);
        }

        for acts in acts_by_actor.values_mut() {
            acts.sort_by(|&a, &b| {
                let (ea, eb) = (&graph[a], &graph[b]);
                ea.piece_id
                    .cmp(&eb.piece_id)
                    .then(ea.start_time.total_cmp(&eb.start_time))
            });
        }

        let num_pieces = graph
            .node_weights()
            .map(|e| e.piece_id)
            .collect::<BTreeSet<_>>()
            .len();

        let empty = Vec::new();
        for desc in plan.iter_regst_descs() {
            let producer_acts = acts_by_actor.get(&desc.producer_task_id).unwrap_or(&empty);
            for (i, &producer) in producer_acts.iter().enumerate() {
                let p_event = graph[producer];
                let next_piece = producer_acts[i + 1..]
                    .iter()
                    .map(|&n| graph[n].piece_id)
                    .find(|&p| p > p_event.piece_id);

                for consumer_id in &desc.consumer_task_ids {
                    let consumer_acts = acts_by_actor.get(consumer_id).unwrap_or(&empty);
                    let first =
                        consumer_acts.partition_point(|&n| graph[n].piece_id < p_event.piece_id);
                    let readers: Vec<NodeIndex> = consumer_acts[first..]
                        .iter()
                        .copied()
                        .take_while(|&n| next_piece.map_or(true, |next| graph[n].piece_id < next))
                        .filter(|&n| graph[n].start_time >= p_event.end_time)
                        .collect();
                    for reader in readers {
                        graph.add_edge(
                            producer,
                            reader,
                            RegstEdge {
                                regst_desc_id: desc.regst_desc_id,
                            },
                        );
                    }
                }
            }
        }

        if petgraph::algo::is_cyclic_directed(&graph) {
            return Err(ActGraphError::CyclicTrace);
        }

        let durations = plan
            .iter_regst_descs()
            .map(|d| {
                let producers = acts_by_actor
                    .get(&d.producer_task_id)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                (d.regst_desc_id, mean_lifetime(&graph, producers, d.regst_desc_id))
            })
            .collect();

        let ratios = plan
            .iter_regst_descs()
            .map(|d| {
                let produced = acts_by_actor
                    .get(&d.producer_task_id)
                    .map_or(0, Vec::len);
                (d.regst_desc_id, produced as f64 / num_pieces as f64)
            })
            .collect();

        let initiation_interval = acts_by_actor
            .values()
            .map(|acts| {
                let busy: f64 = acts.iter().map(|&n| graph[n].duration()).sum();
                busy / num_pieces as f64
            })
            .fold(0.0, f64::max);

        let act_graph = Self {
            graph,
            num_pieces,
            durations,
            ratios,
            initiation_interval,
        };
        tracing::debug!("{}", act_graph.summary());
        Ok(act_graph)
    }

    /// Mean lifetime of a register of `regst_desc_id`. `0.0` when no
    /// register of it was observed being read.
    pub fn duration(&self, regst_desc_id: RegstDescId) -> f64 {
        self.durations.get(&regst_desc_id).copied().unwrap_or(0.0)
    }

    /// Register instances of `regst_desc_id` produced per piece.
    pub fn reuse_ratio(&self, regst_desc_id: RegstDescId) -> f64 {
        self.ratios.get(&regst_desc_id).copied().unwrap_or(0.0)
    }

    /// The observed initiation interval: the largest per-piece busy time of
    /// any actor.
    pub fn initiation_interval(&self) -> f64 {
        self.initiation_interval
    }

    /// Number of distinct pieces in the trace.
    pub fn num_pieces(&self) -> usize {
        self.num_pieces
    }

    /// Number of act nodes.
    pub fn num_acts(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of register edges.
    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Acts that read the register produced by the act of `actor_id` on
    /// `piece_id`, for one descriptor.
    pub fn readers_of(
        &self,
        actor_id: ActorId,
        piece_id: plan_ir::PieceId,
        regst_desc_id: RegstDescId,
    ) -> Vec<ActEvent> {
        self.graph
            .node_indices()
            .filter(|&n| {
                let e = &self.graph[n];
                e.actor_id == actor_id && e.piece_id == piece_id
            })
            .flat_map(|n| self.graph.edges_directed(n, Direction::Outgoing))
            .filter(|edge| edge.weight().regst_desc_id == regst_desc_id)
            .map(|edge| self.graph[edge.target()])
            .collect()
    }

    /// Returns a summary string describing the graph.
    pub fn summary(&self) -> String {
        format!(
            "ActGraph: {} acts, {} register edges, {} pieces, initiation interval {:.3}",
            self.num_acts(),
            self.num_edges(),
            self.num_pieces,
            self.initiation_interval,
        )
    }
}

/// Mean over producer acts with at least one reader of
/// (last reader end − producer start).
fn mean_lifetime(
    graph: &DiGraph<ActEvent, RegstEdge>,
    producer_acts: &[NodeIndex],
    regst_desc_id: RegstDescId,
) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for &producer in producer_acts {
        let last_end = graph
            .edges_directed(producer, Direction::Outgoing)
            .filter(|e| e.weight().regst_desc_id == regst_desc_id)
            .map(|e| graph[e.target()].end_time)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))));
        if let Some(end) = last_end {
            total += end - graph[producer].start_time;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_ir::{BlobDesc, MemoryCase, RegstDescProto, TaskProto, TaskType};

    /// source(0) --in(10)--> forward(1) --out(11)--> loss(2)
    /// update(3) --model(20)--> forward(1), one model per 2 pieces.
    fn plan() -> Plan<Validated> {
        let blob = |n: &str| vec![BlobDesc::new(n, vec![4])];
        Plan::new(
            "trace".into(),
            vec![
                TaskProto::new(0, TaskType::Source, 0).with_produced(
                    "out",
                    RegstDescProto::new(10, 0, vec![1], MemoryCase::HostMem, blob("data")),
                ),
                TaskProto::new(1, TaskType::NormalForward, 0)
                    .with_consumed("in", 10)
                    .with_consumed("model", 20)
                    .with_produced(
                        "out",
                        RegstDescProto::new(11, 1, vec![2], MemoryCase::HostMem, blob("fc")),
                    ),
                TaskProto::new(2, TaskType::Loss, 0).with_consumed("in", 11),
                TaskProto::new(3, TaskType::ModelUpdate, 0).with_produced(
                    "model",
                    RegstDescProto::new(20, 3, vec![1], MemoryCase::HostMem, blob("w")),
                ),
            ],
        )
        .validate()
        .unwrap()
    }

    /// Four pieces, launched every 10 time units:
    /// source [10p, 10p+2], forward [10p+2, 10p+6], loss [10p+6, 10p+8],
    /// model update acts before pieces 0 and 2.
    fn log() -> ActEventLog {
        let mut events = Vec::new();
        for p in 0..4i64 {
            let t = 10.0 * p as f64;
            events.push(ActEvent::new(0, p, t, t + 2.0));
            events.push(ActEvent::new(1, p, t + 2.0, t + 6.0));
            events.push(ActEvent::new(2, p, t + 6.0, t + 8.0));
        }
        events.push(ActEvent::new(3, 0, -1.0, 0.0));
        events.push(ActEvent::new(3, 2, 19.0, 20.0));
        ActEventLog::from_events(events).unwrap()
    }

    #[test]
    fn test_structure() {
        let g = ActGraph::new(&plan(), &log()).unwrap();
        assert_eq!(g.num_acts(), 14);
        assert_eq!(g.num_pieces(), 4);
        // in: 4 edges, out: 4 edges, model: 2 + 2 edges.
        assert_eq!(g.num_edges(), 12);
    }

    #[test]
    fn test_per_piece_duration() {
        let g = ActGraph::new(&plan(), &log()).unwrap();
        // in: source start 10p → forward end 10p+6.
        assert!((g.duration(10) - 6.0).abs() < 1e-9);
        // out: forward start 10p+2 → loss end 10p+8.
        assert!((g.duration(11) - 6.0).abs() < 1e-9);
        assert!((g.reuse_ratio(10) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_model_window_spans_batch() {
        let g = ActGraph::new(&plan(), &log()).unwrap();
        let readers = g.readers_of(3, 0, 20);
        let pieces: Vec<_> = readers.iter().map(|e| e.piece_id).collect();
        assert_eq!(pieces.len(), 2);
        assert!(pieces.contains(&0) && pieces.contains(&1));
        // model 0: start -1 → forward piece 1 end 16 = 17;
        // model 2: start 19 → forward piece 3 end 36 = 17.
        assert!((g.duration(20) - 17.0).abs() < 1e-9);
        assert!((g.reuse_ratio(20) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_initiation_interval() {
        let g = ActGraph::new(&plan(), &log()).unwrap();
        // Forward is busiest: 4 time units per piece.
        assert!((g.initiation_interval() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_unread_descriptor_has_zero_duration() {
        let events = log()
            .iter()
            .copied()
            .filter(|e| e.actor_id != 2)
            .collect::<Vec<_>>();
        let g = ActGraph::new(&plan(), &ActEventLog::from_events(events).unwrap()).unwrap();
        assert_eq!(g.duration(11), 0.0);
        assert_eq!(g.duration(999), 0.0);
    }

    #[test]
    fn test_foreign_events_only() {
        let log = ActEventLog::from_events(vec![ActEvent::new(42, 0, 0.0, 1.0)]).unwrap();
        assert!(matches!(
            ActGraph::new(&plan(), &log),
            Err(ActGraphError::EmptyTrace)
        ));
    }
}
