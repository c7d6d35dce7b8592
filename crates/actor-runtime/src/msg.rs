// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Messages exchanged between actors.

use crate::Regst;
use plan_ir::RegstDescId;

/// Control commands sent by the actor system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorCmd {
    /// Sent once to actors that consume nothing, to start producing.
    Start,
}

/// A message delivered to an actor's mailbox.
#[derive(Debug)]
pub enum ActorMsg {
    /// A register handed over: from producer to consumer, or back.
    Regst(Regst),
    /// End of record: the producer of this descriptor will send no more.
    Eord(RegstDescId),
    Cmd(ActorCmd),
}

impl ActorMsg {
    /// Short name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Regst(_) => "regst",
            Self::Eord(_) => "eord",
            Self::Cmd(_) => "cmd",
        }
    }
}
