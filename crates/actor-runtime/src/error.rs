// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the actor runtime.
//!
//! Every variant is fatal for the actor that raises it: the actor's task
//! ends and the error surfaces from [`crate::ActorSystem::join`].

use plan_ir::{ActorId, ModelVersionId, PieceId, RegstDescId, TaskType};

/// Errors that can occur while building or running actors.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// A message kind the actor cannot handle in its current state.
    #[error("actor {actor_id} ({state}): unexpected message: {detail}")]
    UnexpectedMessage {
        actor_id: ActorId,
        state: &'static str,
        detail: String,
    },

    /// A register or end-of-record for a descriptor the actor neither
    /// consumes nor produces.
    #[error("actor {actor_id}: unexpected regst_desc {regst_desc_id}")]
    UnexpectedRegstDesc {
        actor_id: ActorId,
        regst_desc_id: RegstDescId,
    },

    /// A second register for an already filled weight slot.
    #[error("actor {actor_id}: already holds a register of regst_desc {regst_desc_id}")]
    DuplicateWeightRegst {
        actor_id: ActorId,
        regst_desc_id: RegstDescId,
    },

    /// A model-temp register arrived while one is held.
    #[error("actor {actor_id}: model_tmp register arrived while one is held")]
    ModelTmpAlreadyHeld { actor_id: ActorId },

    /// An input piece is newer than the held model version may serve.
    #[error("actor {actor_id}: piece {piece_id} is past the last piece {last_piece_id} of model version {model_version_id}")]
    StaleModel {
        actor_id: ActorId,
        piece_id: PieceId,
        model_version_id: ModelVersionId,
        last_piece_id: PieceId,
    },

    /// A returned register that is not out with any consumer.
    #[error("actor {actor_id}: register {regst_id} of regst_desc {regst_desc_id} returned but not in flight")]
    UnexpectedRegstReturn {
        actor_id: ActorId,
        regst_desc_id: RegstDescId,
        regst_id: usize,
    },

    /// A kernel failed.
    #[error("kernel '{kernel}': {detail}")]
    Kernel { kernel: String, detail: String },

    /// A kernel asked for a blob no register in scope carries.
    #[error("no register in scope carries blob '{lbn}'")]
    MissingBlob { lbn: String },

    /// A snapshot could not be read.
    #[error("snapshot '{path}': {detail}")]
    Snapshot { path: String, detail: String },

    /// No actor kind is registered for the task type.
    #[error("no actor registered for task type '{0}'")]
    UnknownActorKind(TaskType),

    /// No kernel is registered under the op type.
    #[error("no kernel registered for op type '{0}'")]
    UnknownKernel(String),

    /// The destination mailbox is gone.
    #[error("cannot deliver message to actor {to}")]
    SendFailed { to: ActorId },

    /// An actor task panicked or was cancelled.
    #[error("actor task failed: {0}")]
    Join(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The plan is inconsistent.
    #[error("plan error: {0}")]
    Plan(#[from] plan_ir::PlanError),
}
