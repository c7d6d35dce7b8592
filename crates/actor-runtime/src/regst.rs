// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Registers: move-only tokens for one produced unit of data.
//!
//! A [`Regst`] is never `Clone`. The only way to hand one to another actor
//! is to move it into an [`crate::ActorMsg`]. When a register has several
//! consumers its producer issues one token per consumer; they share the
//! blob storage read-only, and the producer can write the register again
//! only after every token has come back.

use plan_ir::{ActorId, ModelVersionId, PieceId, RegstDescId, RegstDescProto};
use std::collections::HashMap;
use std::sync::Arc;

/// A dense f32 buffer with a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Blob {
    /// A zero-filled blob.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    /// Wraps existing data. Returns `None` if the length does not match.
    pub fn from_vec(shape: Vec<usize>, data: Vec<f32>) -> Option<Self> {
        (shape.iter().product::<usize>() == data.len()).then_some(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn elem_cnt(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

/// Blobs of one register, keyed by logical blob name.
pub type BlobMap = HashMap<String, Blob>;

/// Allocates zero-filled blobs for every blob of a descriptor.
pub fn alloc_blobs(desc: &RegstDescProto) -> BlobMap {
    desc.blobs
        .iter()
        .map(|b| (b.lbn.clone(), Blob::zeros(b.shape.clone())))
        .collect()
}

/// One register instance in flight.
#[derive(Debug)]
pub struct Regst {
    regst_desc_id: RegstDescId,
    regst_id: usize,
    producer: ActorId,
    piece_id: PieceId,
    model_version_id: Option<ModelVersionId>,
    blobs: Arc<BlobMap>,
}

impl Regst {
    /// Creates register `regst_id` of a descriptor owned by `producer`.
    pub fn new(regst_desc_id: RegstDescId, regst_id: usize, producer: ActorId, blobs: BlobMap) -> Self {
        Self::from_shared(regst_desc_id, regst_id, producer, Arc::new(blobs))
    }

    pub(crate) fn from_shared(
        regst_desc_id: RegstDescId,
        regst_id: usize,
        producer: ActorId,
        blobs: Arc<BlobMap>,
    ) -> Self {
        Self {
            regst_desc_id,
            regst_id,
            producer,
            piece_id: 0,
            model_version_id: None,
            blobs,
        }
    }

    pub fn with_piece_id(mut self, piece_id: PieceId) -> Self {
        self.piece_id = piece_id;
        self
    }

    pub fn with_model_version_id(mut self, model_version_id: Option<ModelVersionId>) -> Self {
        self.model_version_id = model_version_id;
        self
    }

    pub fn regst_desc_id(&self) -> RegstDescId {
        self.regst_desc_id
    }

    /// Index of this instance among its descriptor's registers.
    pub fn regst_id(&self) -> usize {
        self.regst_id
    }

    pub fn producer(&self) -> ActorId {
        self.producer
    }

    pub fn piece_id(&self) -> PieceId {
        self.piece_id
    }

    pub fn model_version_id(&self) -> Option<ModelVersionId> {
        self.model_version_id
    }

    pub fn has_blob(&self, lbn: &str) -> bool {
        self.blobs.contains_key(lbn)
    }

    pub fn blob(&self, lbn: &str) -> Option<&Blob> {
        self.blobs.get(lbn)
    }

    /// Mutable access to a blob. Storage shared with other tokens is
    /// copied first, so other holders never observe the write.
    pub fn blob_mut(&mut self, lbn: &str) -> Option<&mut Blob> {
        if !self.blobs.contains_key(lbn) {
            return None;
        }
        Arc::make_mut(&mut self.blobs).get_mut(lbn)
    }

    pub(crate) fn shared_blobs(&self) -> &Arc<BlobMap> {
        &self.blobs
    }
}
