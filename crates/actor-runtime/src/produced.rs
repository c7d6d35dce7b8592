// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bookkeeping for the registers an actor produces.
//!
//! Each produced descriptor owns `register_num` register instances. An
//! instance is free until an act fills it and sends it to the consumers;
//! it becomes free again once every consumer has returned its token.
//!
//! ```text
//!   free ──act──► in flight (reading_cnt = #consumers) ──all returned──► free
//! ```
//!
//! Free instances are reused in FIFO order, so registers rotate.

use crate::regst::alloc_blobs;
use crate::{ActorContext, ActorError, ActorMsg, BlobMap, Regst};
use plan_ir::{ActorId, ModelVersionId, PieceId, RegstDescId, TaskProto};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

#[derive(Debug)]
struct Slot {
    blobs: Arc<BlobMap>,
    reading_cnt: usize,
}

#[derive(Debug)]
struct ProducedDesc {
    consumers: Vec<ActorId>,
    slots: Vec<Slot>,
    free: VecDeque<usize>,
}

/// Register pools of every descriptor an actor produces.
#[derive(Debug)]
pub struct ProducedRegsts {
    actor_id: ActorId,
    descs: BTreeMap<RegstDescId, ProducedDesc>,
    total_reading_cnt: usize,
}

impl ProducedRegsts {
    /// Allocates the register instances of every descriptor `task` produces.
    pub fn new(task: &TaskProto) -> Self {
        let descs = task
            .produced_regst_descs
            .values()
            .map(|desc| {
                let num = desc.effective_register_num() as usize;
                let slots = (0..num)
                    .map(|_| Slot {
                        blobs: Arc::new(alloc_blobs(desc)),
                        reading_cnt: 0,
                    })
                    .collect();
                let pd = ProducedDesc {
                    consumers: desc.consumer_task_ids.clone(),
                    slots,
                    free: (0..num).collect(),
                };
                (desc.regst_desc_id, pd)
            })
            .collect();
        Self {
            actor_id: task.task_id,
            descs,
            total_reading_cnt: 0,
        }
    }

    /// `true` if `regst_desc_id` is produced here.
    pub fn contains(&self, regst_desc_id: RegstDescId) -> bool {
        self.descs.contains_key(&regst_desc_id)
    }

    /// `true` if every produced descriptor has a free register.
    pub fn is_write_ready(&self) -> bool {
        self.descs.values().all(|d| !d.free.is_empty())
    }

    /// Tokens out with consumers, across all descriptors.
    pub fn total_reading_cnt(&self) -> usize {
        self.total_reading_cnt
    }

    /// Free registers of one descriptor.
    pub fn free_count(&self, regst_desc_id: RegstDescId) -> usize {
        self.descs.get(&regst_desc_id).map_or(0, |d| d.free.len())
    }

    /// Blob storage of the register each descriptor will send next.
    ///
    /// Only meaningful while [`Self::is_write_ready`] holds.
    pub fn writeable_blobs(&mut self) -> Vec<&mut BlobMap> {
        self.descs
            .values_mut()
            .filter_map(|d| {
                let idx = *d.free.front()?;
                Some(Arc::make_mut(&mut d.slots[idx].blobs))
            })
            .collect()
    }

    /// Sends the next register of every descriptor to its consumers,
    /// stamped with `piece_id` and `model_version_id`. Returns the number
    /// of tokens sent.
    pub fn send_to_consumers(
        &mut self,
        piece_id: PieceId,
        model_version_id: Option<ModelVersionId>,
        ctx: &mut dyn ActorContext,
    ) -> Result<usize, ActorError> {
        let mut sent = 0;
        for (&desc_id, d) in self.descs.iter_mut() {
            if d.consumers.is_empty() {
                continue;
            }
            let Some(idx) = d.free.pop_front() else {
                continue;
            };
            let slot = &mut d.slots[idx];
            for &consumer in &d.consumers {
                let token = Regst::from_shared(desc_id, idx, self.actor_id, Arc::clone(&slot.blobs))
                    .with_piece_id(piece_id)
                    .with_model_version_id(model_version_id);
                ctx.send(consumer, ActorMsg::Regst(token))?;
                slot.reading_cnt += 1;
                self.total_reading_cnt += 1;
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Takes back a register token from a consumer.
    ///
    /// If the consumer wrote to its copy of the blobs, that copy becomes
    /// the register's storage.
    pub fn on_regst_returned(&mut self, regst: Regst) -> Result<(), ActorError> {
        let unexpected = || ActorError::UnexpectedRegstReturn {
            actor_id: self.actor_id,
            regst_desc_id: regst.regst_desc_id(),
            regst_id: regst.regst_id(),
        };
        let d = self.descs.get_mut(&regst.regst_desc_id()).ok_or_else(unexpected)?;
        let idx = regst.regst_id();
        let slot = d.slots.get_mut(idx).ok_or_else(unexpected)?;
        if slot.reading_cnt == 0 {
            return Err(unexpected());
        }
        if !Arc::ptr_eq(&slot.blobs, regst.shared_blobs()) {
            slot.blobs = Arc::clone(regst.shared_blobs());
        }
        drop(regst);
        slot.reading_cnt -= 1;
        self.total_reading_cnt -= 1;
        if slot.reading_cnt == 0 {
            d.free.push_back(idx);
        }
        Ok(())
    }

    /// Sends end-of-record for every produced descriptor to its consumers.
    pub fn send_eord(&self, ctx: &mut dyn ActorContext) -> Result<(), ActorError> {
        for (&desc_id, d) in &self.descs {
            for &consumer in &d.consumers {
                ctx.send(consumer, ActorMsg::Eord(desc_id))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalContext;
    use plan_ir::{BlobDesc, MemoryCase, RegstDescProto, TaskType};

    fn task(register_num: u64, consumers: Vec<ActorId>) -> TaskProto {
        let mut desc = RegstDescProto::new(
            9,
            1,
            consumers,
            MemoryCase::HostMem,
            vec![BlobDesc::new("y", vec![2])],
        );
        desc.register_num = register_num;
        TaskProto::new(1, TaskType::NormalForward, 0).with_produced("out", desc)
    }

    fn take_regst(ctx: &mut LocalContext) -> Regst {
        match ctx.outbox.remove(0) {
            (_, ActorMsg::Regst(r)) => r,
            (_, other) => panic!("expected regst, got {}", other.kind()),
        }
    }

    #[test]
    fn test_pool_rotation() {
        let mut p = ProducedRegsts::new(&task(2, vec![2]));
        let mut ctx = LocalContext::new();
        assert!(p.is_write_ready());
        p.send_to_consumers(0, None, &mut ctx).unwrap();
        p.send_to_consumers(1, None, &mut ctx).unwrap();
        assert!(!p.is_write_ready());
        assert_eq!(p.total_reading_cnt(), 2);

        let first = take_regst(&mut ctx);
        assert_eq!((first.regst_id(), first.piece_id()), (0, 0));
        p.on_regst_returned(first).unwrap();
        assert!(p.is_write_ready());
        assert_eq!(p.total_reading_cnt(), 1);
    }

    #[test]
    fn test_register_free_after_all_consumers_return() {
        let mut p = ProducedRegsts::new(&task(1, vec![2, 3]));
        let mut ctx = LocalContext::new();
        assert_eq!(p.send_to_consumers(4, Some(1), &mut ctx).unwrap(), 2);
        let a = take_regst(&mut ctx);
        let b = take_regst(&mut ctx);
        assert_eq!(b.model_version_id(), Some(1));
        p.on_regst_returned(a).unwrap();
        assert!(!p.is_write_ready());
        p.on_regst_returned(b).unwrap();
        assert!(p.is_write_ready());
    }

    #[test]
    fn test_double_return_rejected() {
        let mut p = ProducedRegsts::new(&task(1, vec![2]));
        let mut ctx = LocalContext::new();
        p.send_to_consumers(0, None, &mut ctx).unwrap();
        p.on_regst_returned(take_regst(&mut ctx)).unwrap();
        let forged = Regst::new(9, 0, 1, BlobMap::new());
        assert!(matches!(
            p.on_regst_returned(forged),
            Err(ActorError::UnexpectedRegstReturn { regst_id: 0, .. })
        ));
    }

    #[test]
    fn test_writes_by_consumer_are_adopted() {
        let mut p = ProducedRegsts::new(&task(1, vec![2]));
        let mut ctx = LocalContext::new();
        p.send_to_consumers(0, None, &mut ctx).unwrap();
        let mut r = take_regst(&mut ctx);
        r.blob_mut("y").unwrap().as_mut_slice()[1] = 3.0;
        p.on_regst_returned(r).unwrap();
        assert_eq!(p.writeable_blobs()[0]["y"].as_slice(), &[0.0, 3.0]);
    }

    #[test]
    fn test_no_consumers_stays_free() {
        let mut p = ProducedRegsts::new(&task(1, vec![]));
        let mut ctx = LocalContext::new();
        assert_eq!(p.send_to_consumers(0, None, &mut ctx).unwrap(), 0);
        assert!(p.is_write_ready());
        p.send_eord(&mut ctx).unwrap();
        assert!(ctx.outbox.is_empty());
    }
}
