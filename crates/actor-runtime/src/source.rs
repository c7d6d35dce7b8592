// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The source actor: produces the piece stream a job runs on.

use crate::kernel::{BlobResolver, Kernel, KernelCtx};
use crate::{
    Actor, ActorContext, ActorEnv, ActorError, ActorMetrics, ActorMsg, ActorStatus, Blob,
    BlobMap, JobConf, ProducedRegsts,
};
use act_graph::ActEvent;
use plan_ir::{ActorId, PieceId, TaskProto};

/// Emits pieces `0..total_piece_num` once started, then end-of-record.
pub struct SourceActor {
    actor_id: ActorId,
    job: JobConf,
    random_seed: Option<i64>,
    kernels: Vec<Box<dyn Kernel>>,
    produced: ProducedRegsts,
    next_piece: PieceId,
    started: bool,
    eord_sent: bool,
    metrics: ActorMetrics,
}

impl SourceActor {
    pub fn new(task: &TaskProto, env: &ActorEnv) -> Result<Self, ActorError> {
        env.job.validate()?;
        if let Some(name) = task.consumed_regst_desc_ids.keys().next() {
            return Err(ActorError::Config(format!(
                "source task {} cannot consume '{name}'",
                task.task_id
            )));
        }
        Ok(Self {
            actor_id: task.task_id,
            job: env.job.clone(),
            random_seed: task.random_seed,
            kernels: env.kernels.build_all(&task.exec_sequence)?,
            produced: ProducedRegsts::new(task),
            next_piece: 0,
            started: false,
            eord_sent: false,
            metrics: ActorMetrics::new(task.task_id, task.task_type),
        })
    }

    /// Next piece to emit.
    pub fn next_piece(&self) -> PieceId {
        self.next_piece
    }

    fn act_until_fail(&mut self, ctx: &mut dyn ActorContext) -> Result<(), ActorError> {
        while self.started
            && self.next_piece < self.job.total_piece_num()
            && self.produced.is_write_ready()
        {
            let piece_id = self.next_piece;
            let start = ctx.now();
            let kctx = KernelCtx {
                random_seed: self.random_seed,
                piece_id,
            };
            {
                let mut resolver = OutResolver {
                    writeable: self.produced.writeable_blobs(),
                };
                for kernel in &self.kernels {
                    kernel.forward(&kctx, &mut resolver)?;
                }
            }
            let sent = self.produced.send_to_consumers(piece_id, None, ctx)?;
            self.next_piece += 1;

            let end = ctx.now();
            self.metrics.record_act(end - start, sent);
            if self.job.record_acts {
                ctx.record_act(ActEvent::new(self.actor_id, piece_id, start, end));
            }
        }
        if !self.eord_sent && self.next_piece >= self.job.total_piece_num() {
            self.produced.send_eord(ctx)?;
            self.eord_sent = true;
            tracing::debug!("actor {}: emitted {} pieces", self.actor_id, self.next_piece);
        }
        Ok(())
    }
}

impl Actor for SourceActor {
    fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    fn process_msg(
        &mut self,
        msg: ActorMsg,
        ctx: &mut dyn ActorContext,
    ) -> Result<ActorStatus, ActorError> {
        self.metrics.msgs_processed += 1;
        match msg {
            ActorMsg::Cmd(crate::ActorCmd::Start) if !self.started => self.started = true,
            ActorMsg::Regst(regst) if self.produced.contains(regst.regst_desc_id()) => {
                self.produced.on_regst_returned(regst)?;
            }
            ActorMsg::Regst(regst) => {
                return Err(ActorError::UnexpectedRegstDesc {
                    actor_id: self.actor_id,
                    regst_desc_id: regst.regst_desc_id(),
                });
            }
            other => {
                return Err(ActorError::UnexpectedMessage {
                    actor_id: self.actor_id,
                    state: if self.started { "running" } else { "idle" },
                    detail: format!("{} message", other.kind()),
                });
            }
        }
        self.act_until_fail(ctx)?;

        if self.eord_sent && self.produced.total_reading_cnt() == 0 {
            tracing::info!("actor {}: finished after {} acts", self.actor_id, self.metrics.acts);
            Ok(ActorStatus::Finished)
        } else {
            Ok(ActorStatus::Running)
        }
    }

    fn metrics(&self) -> ActorMetrics {
        self.metrics.clone()
    }
}

struct OutResolver<'a> {
    writeable: Vec<&'a mut BlobMap>,
}

impl BlobResolver for OutResolver<'_> {
    fn blob(&self, lbn: &str) -> Option<&Blob> {
        self.writeable.iter().find_map(|m| m.get(lbn))
    }

    fn blob_mut(&mut self, lbn: &str) -> Option<&mut Blob> {
        self.writeable.iter_mut().find_map(|m| m.get_mut(lbn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActorCmd, KernelRegistry, LocalContext, Regst};
    use plan_ir::{BlobDesc, KernelConf, MemoryCase, RegstDescProto, TaskType};

    fn source(register_num: u64) -> TaskProto {
        let mut desc = RegstDescProto::new(
            5,
            0,
            vec![1],
            MemoryCase::HostMem,
            vec![BlobDesc::new("x", vec![3])],
        );
        desc.register_num = register_num;
        TaskProto::new(0, TaskType::Source, 0)
            .with_produced("out", desc)
            .with_kernel(KernelConf::new("synthetic_input").with_bn("out", "x"))
    }

    fn env(total_batch_num: i64) -> ActorEnv {
        ActorEnv {
            job: JobConf {
                pieces_per_batch: 2,
                total_batch_num,
                ..Default::default()
            },
            kernels: KernelRegistry::with_defaults(),
            snapshot: None,
        }
    }

    fn outputs(ctx: &mut LocalContext) -> Vec<Regst> {
        ctx.drain()
            .into_iter()
            .filter_map(|(_, m)| match m {
                ActorMsg::Regst(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_emits_all_pieces_then_finishes() {
        let mut a = SourceActor::new(&source(2), &env(2)).unwrap();
        let mut ctx = LocalContext::new();
        assert_eq!(
            a.process_msg(ActorMsg::Cmd(ActorCmd::Start), &mut ctx).unwrap(),
            ActorStatus::Running
        );
        let first = outputs(&mut ctx);
        assert_eq!(first.iter().map(Regst::piece_id).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(a.next_piece(), 2);

        let mut in_flight = first;
        let mut status = ActorStatus::Running;
        while let Some(r) = in_flight.pop() {
            status = a.process_msg(ActorMsg::Regst(r), &mut ctx).unwrap();
            in_flight.extend(outputs(&mut ctx));
        }
        assert_eq!(status, ActorStatus::Finished);
        assert_eq!(a.next_piece(), 4);
        assert_eq!(a.metrics().acts, 4);
    }

    #[test]
    fn test_eord_sent_once() {
        let mut a = SourceActor::new(&source(4), &env(1)).unwrap();
        let mut ctx = LocalContext::new();
        a.process_msg(ActorMsg::Cmd(ActorCmd::Start), &mut ctx).unwrap();
        let eords = ctx
            .outbox
            .iter()
            .filter(|(to, m)| *to == 1 && matches!(m, ActorMsg::Eord(5)))
            .count();
        assert_eq!(eords, 1);
        for r in outputs(&mut ctx) {
            a.process_msg(ActorMsg::Regst(r), &mut ctx).unwrap();
        }
        assert!(ctx.outbox.is_empty());
    }

    #[test]
    fn test_rejects_eord_and_second_start() {
        let mut a = SourceActor::new(&source(1), &env(1)).unwrap();
        let mut ctx = LocalContext::new();
        assert!(a.process_msg(ActorMsg::Eord(5), &mut ctx).is_err());
        a.process_msg(ActorMsg::Cmd(ActorCmd::Start), &mut ctx).unwrap();
        assert!(matches!(
            a.process_msg(ActorMsg::Cmd(ActorCmd::Start), &mut ctx),
            Err(ActorError::UnexpectedMessage { state: "running", .. })
        ));
    }
}
