// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The forward compute actor.
//!
//! Runs the kernels of a forward, loss or normalization-forward task. Besides
//! its input stream it may consume up to three weight-class descriptors,
//! each bound by symbolic name:
//!
//! | name | held | gates acts | released |
//! |---|---|---|---|
//! | `model` | ≤ 1 | yes | on replacement, or after its last piece in training |
//! | `model_tmp` | ≤ 1 | yes | when the actor stops reading |
//! | `norm_model` | ≤ 1 | no | on replacement, or at each batch end in training |
//!
//! # States
//! ```text
//! InitWeights ──all weight slots filled, kernels initialised──► Normal
//! Normal ──input exhausted, queue empty──► Zombie
//! Zombie ──every end-of-record seen, every output returned──► Finished
//! ```
//! `InitWeights` is entered only by tasks with a random seed and at least
//! one weight descriptor.

use crate::kernel::{BlobResolver, Kernel, KernelCtx};
use crate::{
    Actor, ActorContext, ActorEnv, ActorError, ActorMetrics, ActorMsg, ActorStatus, Blob,
    BlobMap, JobConf, ProducedRegsts, Regst, SnapshotReader,
};
use act_graph::ActEvent;
use plan_ir::{ActorId, ParallelContext, RegstDescId, TaskProto};
use std::collections::VecDeque;
use std::sync::Arc;

/// Consumed descriptor names a forward actor understands.
const CONSUMED_NAMES: [&str; 4] = ["in", "model", "model_tmp", "norm_model"];

/// Lifecycle state of a [`ForwardCompActor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    InitWeights,
    Normal,
    Zombie,
    Finished,
}

impl ActorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitWeights => "init_weights",
            Self::Normal => "normal",
            Self::Zombie => "zombie",
            Self::Finished => "finished",
        }
    }
}

/// Actor for forward-style compute tasks.
pub struct ForwardCompActor {
    actor_id: ActorId,
    state: ActorState,
    job: JobConf,
    parallel_ctx: ParallelContext,
    random_seed: Option<i64>,
    kernels: Vec<Box<dyn Kernel>>,
    snapshot: Option<Arc<dyn SnapshotReader>>,

    in_desc: RegstDescId,
    model_desc: Option<RegstDescId>,
    model_tmp_desc: Option<RegstDescId>,
    norm_model_desc: Option<RegstDescId>,

    pending_in: VecDeque<Regst>,
    model: Option<Regst>,
    model_tmp: Option<Regst>,
    norm_model: Option<Regst>,

    is_in_eord: bool,
    remaining_eord: usize,
    produced: ProducedRegsts,
    metrics: ActorMetrics,
}

impl ForwardCompActor {
    pub fn new(task: &TaskProto, env: &ActorEnv) -> Result<Self, ActorError> {
        env.job.validate()?;
        if let Some(name) = task
            .consumed_regst_desc_ids
            .keys()
            .find(|n| !CONSUMED_NAMES.contains(&n.as_str()))
        {
            return Err(ActorError::Config(format!(
                "forward task {} consumes unsupported descriptor name '{name}'",
                task.task_id
            )));
        }
        let in_desc = task.regst_desc_id4name("in").ok_or_else(|| {
            ActorError::Config(format!("forward task {} has no 'in' descriptor", task.task_id))
        })?;
        let model_desc = task.regst_desc_id4name("model");
        let model_tmp_desc = task.regst_desc_id4name("model_tmp");
        let norm_model_desc = task.regst_desc_id4name("norm_model");

        let has_weights =
            model_desc.is_some() || model_tmp_desc.is_some() || norm_model_desc.is_some();
        let state = if task.random_seed.is_some() && has_weights {
            ActorState::InitWeights
        } else {
            ActorState::Normal
        };

        let actor = Self {
            actor_id: task.task_id,
            state,
            job: env.job.clone(),
            parallel_ctx: task.parallel_ctx,
            random_seed: task.random_seed,
            kernels: env.kernels.build_all(&task.exec_sequence)?,
            snapshot: env.snapshot.clone(),
            in_desc,
            model_desc,
            model_tmp_desc,
            norm_model_desc,
            pending_in: VecDeque::new(),
            model: None,
            model_tmp: None,
            norm_model: None,
            is_in_eord: false,
            remaining_eord: task.consumed_regst_desc_ids.len(),
            produced: ProducedRegsts::new(task),
            metrics: ActorMetrics::new(task.task_id, task.task_type),
        };
        tracing::debug!(
            "actor {}: forward actor with {} kernels, starting in {}",
            actor.actor_id,
            actor.kernels.len(),
            actor.state.as_str(),
        );
        Ok(actor)
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Inputs waiting for an act.
    pub fn pending_len(&self) -> usize {
        self.pending_in.len()
    }

    pub fn holds_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn holds_model_tmp(&self) -> bool {
        self.model_tmp.is_some()
    }

    pub fn holds_norm_model(&self) -> bool {
        self.norm_model.is_some()
    }

    /// Inputs queued and every gating weight held.
    pub fn is_read_ready(&self) -> bool {
        !self.pending_in.is_empty()
            && (self.model_desc.is_none() || self.model.is_some())
            && (self.model_tmp_desc.is_none() || self.model_tmp.is_some())
    }

    /// The input stream has ended and nothing is left to read.
    pub fn is_read_always_unready_from_now(&self) -> bool {
        self.is_in_eord && self.pending_in.is_empty()
    }

    fn consumes(&self, regst_desc_id: RegstDescId) -> bool {
        regst_desc_id == self.in_desc
            || Some(regst_desc_id) == self.model_desc
            || Some(regst_desc_id) == self.model_tmp_desc
            || Some(regst_desc_id) == self.norm_model_desc
    }

    fn unexpected(&self, msg: &ActorMsg, detail: &str) -> ActorError {
        ActorError::UnexpectedMessage {
            actor_id: self.actor_id,
            state: self.state.as_str(),
            detail: format!("{} message: {detail}", msg.kind()),
        }
    }

    // ── InitWeights ────────────────────────────────────────────

    fn handle_init_weights(
        &mut self,
        msg: ActorMsg,
        ctx: &mut dyn ActorContext,
    ) -> Result<(), ActorError> {
        let regst = match msg {
            ActorMsg::Regst(regst) => regst,
            other => {
                return Err(self.unexpected(&other, "only weight registers are accepted"));
            }
        };
        let id = regst.regst_desc_id();
        let slot = if Some(id) == self.model_desc {
            &mut self.model
        } else if Some(id) == self.model_tmp_desc {
            &mut self.model_tmp
        } else if Some(id) == self.norm_model_desc {
            &mut self.norm_model
        } else {
            return Err(ActorError::UnexpectedRegstDesc {
                actor_id: self.actor_id,
                regst_desc_id: id,
            });
        };
        if slot.is_some() {
            return Err(ActorError::DuplicateWeightRegst {
                actor_id: self.actor_id,
                regst_desc_id: id,
            });
        }
        *slot = Some(regst);

        let filled = (self.model_desc.is_none() || self.model.is_some())
            && (self.model_tmp_desc.is_none() || self.model_tmp.is_some())
            && (self.norm_model_desc.is_none() || self.norm_model.is_some());
        if !filled {
            return Ok(());
        }

        let kctx = KernelCtx {
            random_seed: self.random_seed,
            piece_id: 0,
        };
        let snapshot = self.snapshot.as_deref();
        let mut resolver = WeightResolver {
            regsts: [
                self.model.as_mut(),
                self.model_tmp.as_mut(),
                self.norm_model.as_mut(),
            ],
        };
        for kernel in &self.kernels {
            kernel.init_model_and_model_tmp(&kctx, &self.parallel_ctx, snapshot, &mut resolver)?;
        }

        for regst in [self.model.take(), self.model_tmp.take(), self.norm_model.take()]
            .into_iter()
            .flatten()
        {
            give_back(ctx, regst)?;
        }
        self.state = ActorState::Normal;
        tracing::info!("actor {}: weights initialised", self.actor_id);
        Ok(())
    }

    // ── Normal ─────────────────────────────────────────────────

    fn handle_normal(&mut self, msg: ActorMsg, ctx: &mut dyn ActorContext) -> Result<(), ActorError> {
        match msg {
            ActorMsg::Eord(id) => self.on_eord(id)?,
            ActorMsg::Regst(regst) => {
                self.on_regst(regst, ctx)?;
                tracing::debug!(
                    "actor {}: read ready {}, write ready {}",
                    self.actor_id,
                    self.is_read_ready(),
                    self.produced.is_write_ready(),
                );
                self.act_until_fail(ctx)?;
            }
            other @ ActorMsg::Cmd(_) => {
                return Err(self.unexpected(&other, "commands are not handled"));
            }
        }
        self.try_switch_to_zombie_or_finish(ctx)
    }

    fn on_eord(&mut self, regst_desc_id: RegstDescId) -> Result<(), ActorError> {
        if !self.consumes(regst_desc_id) {
            return Err(ActorError::UnexpectedRegstDesc {
                actor_id: self.actor_id,
                regst_desc_id,
            });
        }
        if regst_desc_id == self.in_desc {
            self.is_in_eord = true;
        }
        self.remaining_eord = self.remaining_eord.checked_sub(1).ok_or_else(|| {
            ActorError::UnexpectedMessage {
                actor_id: self.actor_id,
                state: self.state.as_str(),
                detail: format!("extra end-of-record for regst_desc {regst_desc_id}"),
            }
        })?;
        Ok(())
    }

    fn on_regst(&mut self, regst: Regst, ctx: &mut dyn ActorContext) -> Result<(), ActorError> {
        let id = regst.regst_desc_id();
        if id == self.in_desc {
            self.pending_in.push_back(regst);
        } else if Some(id) == self.model_desc {
            if let Some(old) = self.model.take() {
                give_back(ctx, old)?;
            }
            self.model = Some(regst);
        } else if Some(id) == self.model_tmp_desc {
            if self.model_tmp.is_some() {
                return Err(ActorError::ModelTmpAlreadyHeld {
                    actor_id: self.actor_id,
                });
            }
            self.model_tmp = Some(regst);
        } else if Some(id) == self.norm_model_desc {
            if let Some(old) = self.norm_model.take() {
                give_back(ctx, old)?;
            }
            self.norm_model = Some(regst);
        } else if self.produced.contains(id) {
            self.produced.on_regst_returned(regst)?;
        } else {
            return Err(ActorError::UnexpectedRegstDesc {
                actor_id: self.actor_id,
                regst_desc_id: id,
            });
        }
        Ok(())
    }

    fn act_until_fail(&mut self, ctx: &mut dyn ActorContext) -> Result<(), ActorError> {
        while self.is_read_ready() && self.produced.is_write_ready() {
            self.act(ctx)?;
        }
        Ok(())
    }

    fn act(&mut self, ctx: &mut dyn ActorContext) -> Result<(), ActorError> {
        let Some(in_regst) = self.pending_in.pop_front() else {
            return Ok(());
        };
        let piece_id = in_regst.piece_id();
        let model_version_id = self.model.as_ref().and_then(Regst::model_version_id);
        let start = ctx.now();

        let kctx = KernelCtx {
            random_seed: self.random_seed,
            piece_id,
        };
        {
            let mut resolver = ActResolver {
                readable: [
                    Some(&in_regst),
                    self.model.as_ref(),
                    self.model_tmp.as_ref(),
                    self.norm_model.as_ref(),
                ],
                writeable: self.produced.writeable_blobs(),
            };
            for kernel in &self.kernels {
                kernel.forward(&kctx, &mut resolver)?;
            }
        }
        let sent = self
            .produced
            .send_to_consumers(piece_id, model_version_id, ctx)?;

        if self.job.is_train {
            if let Some(model) = &self.model {
                // A model register without a version counts as version 0.
                let version = model.model_version_id().unwrap_or(0);
                let last_piece_id = self.job.last_piece_id_for_model_version(version);
                if piece_id > last_piece_id {
                    return Err(ActorError::StaleModel {
                        actor_id: self.actor_id,
                        piece_id,
                        model_version_id: version,
                        last_piece_id,
                    });
                }
                if piece_id == last_piece_id {
                    if let Some(model) = self.model.take() {
                        give_back(ctx, model)?;
                    }
                }
            }
            if (piece_id + 1) % self.job.pieces_per_batch == 0 {
                if let Some(norm_model) = self.norm_model.take() {
                    give_back(ctx, norm_model)?;
                }
            }
        }
        give_back(ctx, in_regst)?;

        let end = ctx.now();
        self.metrics.record_act(end - start, sent);
        if self.job.record_acts {
            ctx.record_act(ActEvent::new(self.actor_id, piece_id, start, end));
        }
        tracing::debug!(
            "actor {}: act on piece {piece_id} (model version {:?})",
            self.actor_id,
            model_version_id,
        );
        Ok(())
    }

    fn try_switch_to_zombie_or_finish(
        &mut self,
        ctx: &mut dyn ActorContext,
    ) -> Result<(), ActorError> {
        if self.state == ActorState::Normal && self.is_read_always_unready_from_now() {
            for regst in [self.model.take(), self.model_tmp.take(), self.norm_model.take()]
                .into_iter()
                .flatten()
            {
                give_back(ctx, regst)?;
            }
            self.produced.send_eord(ctx)?;
            self.state = ActorState::Zombie;
            tracing::debug!("actor {}: input exhausted, zombie", self.actor_id);
        }
        self.try_finish();
        Ok(())
    }

    // ── Zombie ─────────────────────────────────────────────────

    fn handle_zombie(&mut self, msg: ActorMsg, ctx: &mut dyn ActorContext) -> Result<(), ActorError> {
        match msg {
            ActorMsg::Eord(id) => self.on_eord(id)?,
            ActorMsg::Regst(regst) => {
                let id = regst.regst_desc_id();
                if self.produced.contains(id) {
                    self.produced.on_regst_returned(regst)?;
                } else if self.consumes(id) {
                    give_back(ctx, regst)?;
                } else {
                    return Err(ActorError::UnexpectedRegstDesc {
                        actor_id: self.actor_id,
                        regst_desc_id: id,
                    });
                }
            }
            other @ ActorMsg::Cmd(_) => {
                return Err(self.unexpected(&other, "commands are not handled"));
            }
        }
        self.try_finish();
        Ok(())
    }

    fn try_finish(&mut self) {
        if self.state == ActorState::Zombie
            && self.remaining_eord == 0
            && self.produced.total_reading_cnt() == 0
        {
            self.state = ActorState::Finished;
            tracing::info!(
                "actor {}: finished after {} acts",
                self.actor_id,
                self.metrics.acts,
            );
        }
    }
}

impl Actor for ForwardCompActor {
    fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    fn process_msg(
        &mut self,
        msg: ActorMsg,
        ctx: &mut dyn ActorContext,
    ) -> Result<ActorStatus, ActorError> {
        self.metrics.msgs_processed += 1;
        match self.state {
            ActorState::InitWeights => self.handle_init_weights(msg, ctx)?,
            ActorState::Normal => self.handle_normal(msg, ctx)?,
            ActorState::Zombie => self.handle_zombie(msg, ctx)?,
            ActorState::Finished => return Err(self.unexpected(&msg, "actor has finished")),
        }
        Ok(if self.state == ActorState::Finished {
            ActorStatus::Finished
        } else {
            ActorStatus::Running
        })
    }

    fn metrics(&self) -> ActorMetrics {
        self.metrics.clone()
    }
}

fn give_back(ctx: &mut dyn ActorContext, regst: Regst) -> Result<(), ActorError> {
    ctx.send(regst.producer(), ActorMsg::Regst(regst))
}

/// Resolves weight blobs during initialisation: model, then model-temp,
/// then normalized-model.
struct WeightResolver<'a> {
    regsts: [Option<&'a mut Regst>; 3],
}

impl BlobResolver for WeightResolver<'_> {
    fn blob(&self, lbn: &str) -> Option<&Blob> {
        self.regsts.iter().flatten().find_map(|r| r.blob(lbn))
    }

    fn blob_mut(&mut self, lbn: &str) -> Option<&mut Blob> {
        self.regsts
            .iter_mut()
            .flatten()
            .find(|r| r.has_blob(lbn))
            .and_then(|r| r.blob_mut(lbn))
    }
}

/// Resolves blobs during an act: the input and held weights read-only,
/// the outputs writeable.
struct ActResolver<'a> {
    readable: [Option<&'a Regst>; 4],
    writeable: Vec<&'a mut BlobMap>,
}

impl BlobResolver for ActResolver<'_> {
    fn blob(&self, lbn: &str) -> Option<&Blob> {
        self.readable
            .iter()
            .flatten()
            .find_map(|r| r.blob(lbn))
            .or_else(|| self.writeable.iter().find_map(|m| m.get(lbn)))
    }

    fn blob_mut(&mut self, lbn: &str) -> Option<&mut Blob> {
        self.writeable.iter_mut().find_map(|m| m.get_mut(lbn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KernelRegistry, LocalContext};
    use plan_ir::{BlobDesc, KernelConf, MemoryCase, RegstDescProto, TaskType};

    const IN: RegstDescId = 10;
    const OUT: RegstDescId = 11;
    const MODEL: RegstDescId = 20;
    const MODEL_TMP: RegstDescId = 21;
    const NORM: RegstDescId = 22;

    fn env(job: JobConf) -> ActorEnv {
        ActorEnv {
            job,
            kernels: KernelRegistry::with_defaults(),
            snapshot: None,
        }
    }

    fn out_desc(register_num: u64) -> RegstDescProto {
        let mut d = RegstDescProto::new(
            OUT,
            1,
            vec![2],
            MemoryCase::HostMem,
            vec![BlobDesc::new("y", vec![4])],
        );
        d.register_num = register_num;
        d
    }

    /// Forward task 1 reading `in` from task 0 and writing `out` to task 2.
    fn relu_task(register_num: u64) -> TaskProto {
        TaskProto::new(1, TaskType::NormalForward, 0)
            .with_consumed("in", IN)
            .with_produced("out", out_desc(register_num))
            .with_kernel(KernelConf::new("relu").with_bn("in", "x").with_bn("out", "y"))
    }

    /// Affine task whose weights come in `model` from task 3.
    fn affine_task() -> TaskProto {
        TaskProto::new(1, TaskType::NormalForward, 0)
            .with_consumed("in", IN)
            .with_consumed("model", MODEL)
            .with_produced("out", out_desc(4))
            .with_kernel(
                KernelConf::new("affine")
                    .with_bn("in", "x")
                    .with_bn("weight", "w")
                    .with_bn("bias", "b")
                    .with_bn("out", "y"),
            )
    }

    fn input(piece_id: i64) -> Regst {
        let mut blobs = BlobMap::new();
        blobs.insert(
            "x".into(),
            Blob::from_vec(vec![4], vec![-1.0, 0.0, 1.0, piece_id as f32]).unwrap(),
        );
        Regst::new(IN, piece_id as usize, 0, blobs).with_piece_id(piece_id)
    }

    fn weight(desc: RegstDescId, producer: ActorId, version: i64) -> Regst {
        let mut blobs = BlobMap::new();
        blobs.insert("w".into(), Blob::from_vec(vec![1], vec![2.0]).unwrap());
        blobs.insert("b".into(), Blob::zeros(vec![1]));
        Regst::new(desc, 0, producer, blobs).with_model_version_id(Some(version))
    }

    fn send(actor: &mut ForwardCompActor, ctx: &mut LocalContext, msg: ActorMsg) -> ActorStatus {
        actor.process_msg(msg, ctx).unwrap()
    }

    /// Registers sent to `to`, as (desc, piece).
    fn regsts_to(msgs: &[(ActorId, ActorMsg)], to: ActorId) -> Vec<(RegstDescId, i64)> {
        msgs.iter()
            .filter_map(|(dst, m)| match m {
                ActorMsg::Regst(r) if *dst == to => Some((r.regst_desc_id(), r.piece_id())),
                _ => None,
            })
            .collect()
    }

    fn acted_pieces(ctx: &LocalContext) -> Vec<i64> {
        ctx.events.iter().map(|e| e.piece_id).collect()
    }

    #[test]
    fn test_fifo_inputs_act_in_order() {
        let mut a = ForwardCompActor::new(&relu_task(3), &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        for p in 0..3 {
            send(&mut a, &mut ctx, ActorMsg::Regst(input(p)));
        }
        assert_eq!(acted_pieces(&ctx), vec![0, 1, 2]);
        let msgs = ctx.drain();
        assert_eq!(regsts_to(&msgs, 0), vec![(IN, 0), (IN, 1), (IN, 2)]);
        assert_eq!(regsts_to(&msgs, 2), vec![(OUT, 0), (OUT, 1), (OUT, 2)]);
        match &msgs[0] {
            (2, ActorMsg::Regst(r)) => assert_eq!(r.blob("y").unwrap().as_slice(), &[0.0, 0.0, 1.0, 0.0]),
            _ => panic!("first message should be the output"),
        }
    }

    #[test]
    fn test_output_backpressure() {
        let mut a = ForwardCompActor::new(&relu_task(1), &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        send(&mut a, &mut ctx, ActorMsg::Regst(input(0)));
        send(&mut a, &mut ctx, ActorMsg::Regst(input(1)));
        assert_eq!(acted_pieces(&ctx), vec![0]);
        assert_eq!(a.pending_len(), 1);

        let out = ctx
            .drain()
            .into_iter()
            .find_map(|(to, m)| match m {
                ActorMsg::Regst(r) if to == 2 => Some(r),
                _ => None,
            })
            .unwrap();
        send(&mut a, &mut ctx, ActorMsg::Regst(out));
        assert_eq!(acted_pieces(&ctx), vec![0, 1]);
    }

    #[test]
    fn test_model_gates_acts() {
        let mut a = ForwardCompActor::new(&affine_task(), &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        send(&mut a, &mut ctx, ActorMsg::Regst(input(0)));
        assert!(!a.is_read_ready());
        assert!(ctx.events.is_empty());

        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 0)));
        assert_eq!(acted_pieces(&ctx), vec![0]);
        let msgs = ctx.drain();
        let out = msgs
            .iter()
            .find_map(|(to, m)| match m {
                ActorMsg::Regst(r) if *to == 2 => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(out.model_version_id(), Some(0));
        assert_eq!(out.blob("y").unwrap().as_slice(), &[-2.0, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_new_model_replaces_held_one() {
        let mut a = ForwardCompActor::new(&affine_task(), &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 0)));
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 1)));
        let msgs = ctx.drain();
        assert_eq!(msgs.len(), 1);
        match &msgs[0] {
            (3, ActorMsg::Regst(r)) => assert_eq!(r.model_version_id(), Some(0)),
            _ => panic!("old model should go back to its producer"),
        }
        assert!(a.holds_model());
    }

    #[test]
    fn test_second_model_tmp_is_fatal() {
        let task = relu_task(1).with_consumed("model_tmp", MODEL_TMP);
        let mut a = ForwardCompActor::new(&task, &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL_TMP, 3, 0)));
        assert!(a.holds_model_tmp());
        let err = a
            .process_msg(ActorMsg::Regst(weight(MODEL_TMP, 3, 0)), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ActorError::ModelTmpAlreadyHeld { actor_id: 1 }));
    }

    #[test]
    fn test_model_tmp_gates_acts() {
        let task = relu_task(4).with_consumed("model_tmp", MODEL_TMP);
        let mut a = ForwardCompActor::new(&task, &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        send(&mut a, &mut ctx, ActorMsg::Regst(input(0)));
        send(&mut a, &mut ctx, ActorMsg::Regst(input(1)));
        assert!(!a.is_read_ready());
        assert_eq!(a.pending_len(), 2);
        assert!(ctx.events.is_empty());
        assert!(ctx.outbox.is_empty());

        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL_TMP, 3, 0)));
        assert_eq!(acted_pieces(&ctx), vec![0, 1]);
        assert!(a.holds_model_tmp());
        assert!(regsts_to(&ctx.outbox, 3).is_empty());
    }

    #[test]
    fn test_new_norm_model_replaces_held_one() {
        let task = relu_task(4).with_consumed("norm_model", NORM);
        let mut a = ForwardCompActor::new(&task, &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(NORM, 4, 0)));
        assert!(ctx.outbox.is_empty());
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(NORM, 4, 1)));
        let msgs = ctx.drain();
        assert_eq!(msgs.len(), 1);
        match &msgs[0] {
            (4, ActorMsg::Regst(r)) => {
                assert_eq!(r.regst_desc_id(), NORM);
                assert_eq!(r.model_version_id(), Some(0));
            }
            _ => panic!("old normalized model should go back to its producer"),
        }
        assert!(a.holds_norm_model());
    }

    #[test]
    fn test_training_returns_model_at_last_piece() {
        let job = JobConf {
            is_train: true,
            pieces_per_batch: 2,
            ..Default::default()
        };
        let mut a = ForwardCompActor::new(&affine_task(), &env(job)).unwrap();
        let mut ctx = LocalContext::new();
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 0)));
        send(&mut a, &mut ctx, ActorMsg::Regst(input(0)));
        assert!(a.holds_model());
        assert!(regsts_to(&ctx.outbox, 3).is_empty());

        send(&mut a, &mut ctx, ActorMsg::Regst(input(1)));
        assert!(!a.holds_model());
        assert_eq!(regsts_to(&ctx.outbox, 3), vec![(MODEL, 0)]);

        // Piece 2 waits for the next version.
        send(&mut a, &mut ctx, ActorMsg::Regst(input(2)));
        assert_eq!(acted_pieces(&ctx), vec![0, 1]);
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 1)));
        assert_eq!(acted_pieces(&ctx), vec![0, 1, 2]);
    }

    #[test]
    fn test_stale_model_is_fatal() {
        let job = JobConf {
            is_train: true,
            pieces_per_batch: 2,
            ..Default::default()
        };
        let mut a = ForwardCompActor::new(&affine_task(), &env(job)).unwrap();
        let mut ctx = LocalContext::new();
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 0)));
        let err = a.process_msg(ActorMsg::Regst(input(2)), &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            ActorError::StaleModel {
                piece_id: 2,
                last_piece_id: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_norm_model_released_at_batch_end() {
        let job = JobConf {
            is_train: true,
            pieces_per_batch: 2,
            ..Default::default()
        };
        let task = relu_task(4).with_consumed("norm_model", NORM);
        let mut a = ForwardCompActor::new(&task, &env(job)).unwrap();
        let mut ctx = LocalContext::new();

        // Never gates.
        send(&mut a, &mut ctx, ActorMsg::Regst(input(0)));
        assert_eq!(acted_pieces(&ctx), vec![0]);

        send(&mut a, &mut ctx, ActorMsg::Regst(weight(NORM, 4, 0)));
        assert!(a.holds_norm_model());
        send(&mut a, &mut ctx, ActorMsg::Regst(input(1)));
        assert!(!a.holds_norm_model());
        assert_eq!(regsts_to(&ctx.outbox, 4), vec![(NORM, 0)]);
    }

    #[test]
    fn test_init_weights_then_normal() {
        let task = affine_task().with_random_seed(42);
        let mut a = ForwardCompActor::new(&task, &env(JobConf::default())).unwrap();
        assert_eq!(a.state(), ActorState::InitWeights);
        let mut ctx = LocalContext::new();

        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 0)));
        assert_eq!(a.state(), ActorState::Normal);
        assert!(!a.holds_model());
        let msgs = ctx.drain();
        assert_eq!(msgs.len(), 1);
        match &msgs[0] {
            (3, ActorMsg::Regst(r)) => {
                assert_eq!(r.regst_desc_id(), MODEL);
                assert_ne!(r.blob("w").unwrap().as_slice(), &[2.0]);
            }
            _ => panic!("initialised model should go back to its producer"),
        }
    }

    #[test]
    fn test_init_weights_waits_for_every_slot() {
        let task = affine_task()
            .with_consumed("model_tmp", MODEL_TMP)
            .with_consumed("norm_model", NORM)
            .with_random_seed(5);
        let mut a = ForwardCompActor::new(&task, &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();

        send(&mut a, &mut ctx, ActorMsg::Regst(weight(NORM, 4, 0)));
        assert_eq!(a.state(), ActorState::InitWeights);
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL_TMP, 3, 0)));
        assert_eq!(a.state(), ActorState::InitWeights);
        assert!(ctx.outbox.is_empty());

        // All three registers carry "w"; the model's copy is the one filled.
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 0)));
        assert_eq!(a.state(), ActorState::Normal);
        let msgs = ctx.drain();
        assert_eq!(msgs.len(), 3);
        let returned: Vec<(ActorId, RegstDescId, Vec<f32>)> = msgs
            .iter()
            .map(|(to, m)| match m {
                ActorMsg::Regst(r) => (*to, r.regst_desc_id(), r.blob("w").unwrap().as_slice().to_vec()),
                other => panic!("unexpected {}", other.kind()),
            })
            .collect();
        assert_eq!(returned[0].0, 3);
        assert_eq!(returned[0].1, MODEL);
        assert_ne!(returned[0].2, vec![2.0]);
        assert_eq!(returned[1], (3, MODEL_TMP, vec![2.0]));
        assert_eq!(returned[2], (4, NORM, vec![2.0]));
    }

    #[test]
    fn test_init_weights_rejects_other_messages() {
        let task = affine_task()
            .with_consumed("model_tmp", MODEL_TMP)
            .with_random_seed(1);
        let mut a = ForwardCompActor::new(&task, &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();

        let err = a.process_msg(ActorMsg::Regst(input(0)), &mut ctx).unwrap_err();
        assert!(matches!(err, ActorError::UnexpectedRegstDesc { regst_desc_id: IN, .. }));

        let err = a.process_msg(ActorMsg::Eord(IN), &mut ctx).unwrap_err();
        assert!(matches!(err, ActorError::UnexpectedMessage { state: "init_weights", .. }));

        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 0)));
        assert_eq!(a.state(), ActorState::InitWeights);
        let err = a
            .process_msg(ActorMsg::Regst(weight(MODEL, 3, 0)), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ActorError::DuplicateWeightRegst { regst_desc_id: MODEL, .. }));
    }

    #[test]
    fn test_eord_zombie_then_finish() {
        let task = affine_task();
        let mut a = ForwardCompActor::new(&task, &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 0)));
        send(&mut a, &mut ctx, ActorMsg::Regst(input(0)));
        let out = ctx
            .drain()
            .into_iter()
            .find_map(|(to, m)| match m {
                ActorMsg::Regst(r) if to == 2 => Some(r),
                _ => None,
            })
            .unwrap();

        assert_eq!(send(&mut a, &mut ctx, ActorMsg::Eord(IN)), ActorStatus::Running);
        assert_eq!(a.state(), ActorState::Zombie);
        let msgs = ctx.drain();
        assert_eq!(regsts_to(&msgs, 3), vec![(MODEL, 0)]);
        assert!(msgs
            .iter()
            .any(|(to, m)| *to == 2 && matches!(m, ActorMsg::Eord(OUT))));

        // A late model is handed straight back.
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL, 3, 1)));
        assert_eq!(regsts_to(&ctx.drain(), 3), vec![(MODEL, 0)]);

        send(&mut a, &mut ctx, ActorMsg::Eord(MODEL));
        assert_eq!(a.state(), ActorState::Zombie);
        assert_eq!(send(&mut a, &mut ctx, ActorMsg::Regst(out)), ActorStatus::Finished);
        assert_eq!(a.state(), ActorState::Finished);
        assert!(a.process_msg(ActorMsg::Eord(IN), &mut ctx).is_err());
    }

    #[test]
    fn test_zombie_hands_back_late_weight_temps() {
        let task = relu_task(1)
            .with_consumed("model_tmp", MODEL_TMP)
            .with_consumed("norm_model", NORM);
        let mut a = ForwardCompActor::new(&task, &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        send(&mut a, &mut ctx, ActorMsg::Eord(IN));
        assert_eq!(a.state(), ActorState::Zombie);
        ctx.drain();

        send(&mut a, &mut ctx, ActorMsg::Regst(weight(MODEL_TMP, 3, 0)));
        send(&mut a, &mut ctx, ActorMsg::Regst(weight(NORM, 4, 0)));
        assert!(!a.holds_model_tmp());
        assert!(!a.holds_norm_model());
        let msgs = ctx.drain();
        assert_eq!(regsts_to(&msgs, 3), vec![(MODEL_TMP, 0)]);
        assert_eq!(regsts_to(&msgs, 4), vec![(NORM, 0)]);
        assert!(ctx.events.is_empty());

        send(&mut a, &mut ctx, ActorMsg::Eord(MODEL_TMP));
        assert_eq!(send(&mut a, &mut ctx, ActorMsg::Eord(NORM)), ActorStatus::Finished);
    }

    #[test]
    fn test_invalid_job_rejected() {
        let job = JobConf {
            is_train: true,
            pieces_per_batch: 0,
            ..Default::default()
        };
        assert!(matches!(
            ForwardCompActor::new(&affine_task(), &env(job)),
            Err(ActorError::Config(_))
        ));
    }

    #[test]
    fn test_command_is_fatal() {
        let mut a = ForwardCompActor::new(&relu_task(1), &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        let err = a
            .process_msg(ActorMsg::Cmd(crate::ActorCmd::Start), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ActorError::UnexpectedMessage { state: "normal", .. }));
    }

    #[test]
    fn test_foreign_register_is_fatal() {
        let mut a = ForwardCompActor::new(&relu_task(1), &env(JobConf::default())).unwrap();
        let mut ctx = LocalContext::new();
        let stray = Regst::new(99, 0, 7, BlobMap::new());
        assert!(matches!(
            a.process_msg(ActorMsg::Regst(stray), &mut ctx),
            Err(ActorError::UnexpectedRegstDesc { regst_desc_id: 99, .. })
        ));
    }

    #[test]
    fn test_missing_in_descriptor() {
        let task = TaskProto::new(1, TaskType::Loss, 0).with_consumed("model", MODEL);
        assert!(matches!(
            ForwardCompActor::new(&task, &env(JobConf::default())),
            Err(ActorError::Config(_))
        ));
    }
}
