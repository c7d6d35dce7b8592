// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # actor-runtime
//!
//! Message-driven actors that execute the tasks of a plan by passing
//! registers around.
//!
//! A producer fills a register, hands one read token per consumer, and
//! may reuse the register once every token has come back. Consumers act
//! when their inputs are ready and their own outputs have a free
//! register, then give the inputs back.
//!
//! ```text
//!  Source ──in──► ForwardCompActor ──out──► Loss
//!                     ▲      │
//!          model ─────┘      └────► model returned after its last piece
//! ```
//!
//! Actors are plain state machines driven through [`Actor::process_msg`];
//! [`ActorSystem`] runs them on tokio, while [`LocalContext`] drives them
//! by hand. Each act can be reported as an [`act_graph::ActEvent`], which
//! is what the `improver` crate consumes.

mod actor;
mod config;
mod error;
mod forward;
pub mod kernel;
mod metrics;
mod msg;
mod produced;
mod regst;
mod registry;
mod snapshot;
mod source;
mod system;

pub use actor::{Actor, ActorContext, ActorStatus, LocalContext};
pub use config::JobConf;
pub use error::ActorError;
pub use forward::{ActorState, ForwardCompActor};
pub use kernel::{BlobResolver, Kernel, KernelCtx, KernelRegistry};
pub use metrics::{ActorMetrics, SystemReport};
pub use msg::{ActorCmd, ActorMsg};
pub use produced::ProducedRegsts;
pub use regst::{alloc_blobs, Blob, BlobMap, Regst};
pub use registry::{ActorEnv, ActorFactory, ActorRegistry};
pub use snapshot::{MemSnapshot, SafeTensorsSnapshot, SnapshotReader};
pub use source::SourceActor;
pub use system::{ActorSystem, Endpoint};
