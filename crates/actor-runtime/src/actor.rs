// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The actor interface.
//!
//! An actor handles one message to completion before the next. Everything
//! it does to the outside world goes through its [`ActorContext`]: sending
//! messages, reading the clock and reporting act events.

use crate::{ActorError, ActorMetrics, ActorMsg};
use act_graph::ActEvent;
use plan_ir::ActorId;

/// Whether an actor wants more messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    Running,
    Finished,
}

/// The actor's view of the system it runs in.
pub trait ActorContext {
    /// Delivers `msg` to actor `to`.
    fn send(&mut self, to: ActorId, msg: ActorMsg) -> Result<(), ActorError>;

    /// Current time in microseconds.
    fn now(&mut self) -> f64;

    /// Reports one completed act.
    fn record_act(&mut self, _event: ActEvent) {}
}

/// A message-driven worker bound to one task.
pub trait Actor: Send {
    fn actor_id(&self) -> ActorId;

    /// Handles one message.
    fn process_msg(
        &mut self,
        msg: ActorMsg,
        ctx: &mut dyn ActorContext,
    ) -> Result<ActorStatus, ActorError>;

    fn metrics(&self) -> ActorMetrics;
}

/// An in-process context that collects everything an actor emits.
///
/// The clock advances by `tick` microseconds on every read.
#[derive(Debug)]
pub struct LocalContext {
    pub outbox: Vec<(ActorId, ActorMsg)>,
    pub events: Vec<ActEvent>,
    pub clock: f64,
    pub tick: f64,
}

impl LocalContext {
    pub fn new() -> Self {
        Self {
            outbox: Vec::new(),
            events: Vec::new(),
            clock: 0.0,
            tick: 1.0,
        }
    }

    /// Removes and returns everything sent so far.
    pub fn drain(&mut self) -> Vec<(ActorId, ActorMsg)> {
        std::mem::take(&mut self.outbox)
    }
}

impl Default for LocalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorContext for LocalContext {
    fn send(&mut self, to: ActorId, msg: ActorMsg) -> Result<(), ActorError> {
        self.outbox.push((to, msg));
        Ok(())
    }

    fn now(&mut self) -> f64 {
        let t = self.clock;
        self.clock += self.tick;
        t
    }

    fn record_act(&mut self, event: ActEvent) {
        self.events.push(event);
    }
}
