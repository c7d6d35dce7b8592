// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runs a plan's actors on tokio.
//!
//! Every task gets an unbounded mailbox. Tasks whose type has a registered
//! actor are driven by a spawned tokio task that handles one message at a
//! time until the actor finishes. The remaining tasks become
//! [`Endpoint`]s: plain mailboxes the caller drives, e.g. to play the role
//! of a model-update task in tests.
//!
//! Actors that consume nothing receive [`ActorCmd::Start`] from
//! [`ActorSystem::start`]. Callers that must hand weight registers to
//! actors still initialising do so between `spawn` and `start`.

use crate::{
    Actor, ActorCmd, ActorContext, ActorEnv, ActorError, ActorMetrics, ActorMsg, ActorRegistry,
    ActorStatus, SystemReport,
};
use act_graph::{ActEvent, ActEventLog};
use plan_ir::plan::Validated;
use plan_ir::{ActorId, Plan};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;

type Router = Arc<HashMap<ActorId, UnboundedSender<ActorMsg>>>;

fn route(router: &Router, to: ActorId, msg: ActorMsg) -> Result<(), ActorError> {
    router
        .get(&to)
        .ok_or(ActorError::SendFailed { to })?
        .send(msg)
        .map_err(|_| ActorError::SendFailed { to })
}

/// Context of an actor running inside an [`ActorSystem`].
struct SystemContext {
    router: Router,
    events: Option<Arc<Mutex<Vec<ActEvent>>>>,
    started: Instant,
}

impl ActorContext for SystemContext {
    fn send(&mut self, to: ActorId, msg: ActorMsg) -> Result<(), ActorError> {
        route(&self.router, to, msg)
    }

    fn now(&mut self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1e6
    }

    fn record_act(&mut self, event: ActEvent) {
        if let Some(events) = &self.events {
            if let Ok(mut events) = events.lock() {
                events.push(event);
            }
        }
    }
}

/// Mailbox of a task that has no actor.
#[derive(Debug)]
pub struct Endpoint {
    id: ActorId,
    rx: UnboundedReceiver<ActorMsg>,
    router: Router,
}

impl Endpoint {
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Sends `msg` to actor `to`.
    pub fn send(&self, to: ActorId, msg: ActorMsg) -> Result<(), ActorError> {
        route(&self.router, to, msg)
    }

    /// Waits for the next message addressed to this task.
    pub async fn recv(&mut self) -> Option<ActorMsg> {
        self.rx.recv().await
    }
}

/// A running set of actors.
pub struct ActorSystem {
    actors: JoinSet<Result<ActorMetrics, ActorError>>,
    endpoints: HashMap<ActorId, Endpoint>,
    router: Router,
    sources: Vec<ActorId>,
    is_started: bool,
    events: Arc<Mutex<Vec<ActEvent>>>,
    started: Instant,
}

impl ActorSystem {
    /// Creates every actor of `plan` and spawns it.
    ///
    /// All actors are built before any is spawned, so a construction error
    /// leaves nothing running. Must be called from within a tokio runtime.
    pub fn spawn(
        plan: &Plan<Validated>,
        registry: &ActorRegistry,
        env: &ActorEnv,
    ) -> Result<Self, ActorError> {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for task in plan.iter_tasks() {
            let (tx, rx) = unbounded_channel();
            senders.insert(task.task_id, tx);
            receivers.insert(task.task_id, rx);
        }
        let router: Router = Arc::new(senders);

        let mut actors: Vec<(Box<dyn Actor>, UnboundedReceiver<ActorMsg>, bool)> = Vec::new();
        let mut endpoints = HashMap::new();
        for task in plan.iter_tasks() {
            let rx = receivers
                .remove(&task.task_id)
                .ok_or_else(|| ActorError::Config(format!("duplicate task {}", task.task_id)))?;
            if registry.has(task.task_type) {
                let actor = registry.create(task, env)?;
                actors.push((actor, rx, task.consumed_regst_desc_ids.is_empty()));
            } else {
                tracing::debug!(
                    "task {} ({}) has no actor, exposing an endpoint",
                    task.task_id,
                    task.task_type,
                );
                endpoints.insert(
                    task.task_id,
                    Endpoint {
                        id: task.task_id,
                        rx,
                        router: Arc::clone(&router),
                    },
                );
            }
        }

        let events = Arc::new(Mutex::new(Vec::new()));
        let started = Instant::now();
        let mut set = JoinSet::new();
        let mut sources = Vec::new();
        let num_actors = actors.len();
        for (actor, rx, is_source) in actors {
            if is_source {
                sources.push(actor.actor_id());
            }
            let ctx = SystemContext {
                router: Arc::clone(&router),
                events: env.job.record_acts.then(|| Arc::clone(&events)),
                started,
            };
            set.spawn(run_actor(actor, rx, ctx));
        }
        tracing::info!(
            "actor system: {} actors spawned, {} endpoints",
            num_actors,
            endpoints.len(),
        );

        Ok(Self {
            actors: set,
            endpoints,
            router,
            sources,
            is_started: false,
            events,
            started,
        })
    }

    /// Sends [`ActorCmd::Start`] to every actor that consumes nothing.
    /// Later calls do nothing.
    pub fn start(&mut self) -> Result<(), ActorError> {
        if self.is_started {
            return Ok(());
        }
        for &id in &self.sources {
            route(&self.router, id, ActorMsg::Cmd(ActorCmd::Start))?;
        }
        self.is_started = true;
        tracing::debug!("actor system: started {} source actors", self.sources.len());
        Ok(())
    }

    /// Spawns and starts `plan`, then waits for it to finish. Every task
    /// must have an actor.
    pub async fn run(
        plan: &Plan<Validated>,
        registry: &ActorRegistry,
        env: &ActorEnv,
    ) -> Result<SystemReport, ActorError> {
        if let Some(task) = plan.iter_tasks().find(|t| !registry.has(t.task_type)) {
            return Err(ActorError::UnknownActorKind(task.task_type));
        }
        let mut system = Self::spawn(plan, registry, env)?;
        system.start()?;
        system.join().await
    }

    /// Removes the endpoint of an actor-less task.
    pub fn take_endpoint(&mut self, id: ActorId) -> Option<Endpoint> {
        self.endpoints.remove(&id)
    }

    /// Starts the system if needed and waits for every actor to finish.
    ///
    /// The first actor error aborts the remaining actors and is returned.
    pub async fn join(mut self) -> Result<SystemReport, ActorError> {
        self.start()?;
        let mut actor_metrics = Vec::new();
        while let Some(joined) = self.actors.join_next().await {
            let outcome = joined
                .map_err(|e| ActorError::Join(e.to_string()))
                .and_then(|r| r);
            match outcome {
                Ok(metrics) => actor_metrics.push(metrics),
                Err(e) => {
                    tracing::error!("actor system: {e}");
                    self.actors.abort_all();
                    return Err(e);
                }
            }
        }
        actor_metrics.sort_by_key(|m| m.actor_id);

        let events = match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        };
        let report = SystemReport {
            total_duration: self.started.elapsed(),
            actor_metrics,
            act_events: events.into_iter().collect::<ActEventLog>(),
        };
        tracing::info!("{}", report.summary());
        Ok(report)
    }
}

async fn run_actor(
    mut actor: Box<dyn Actor>,
    mut rx: UnboundedReceiver<ActorMsg>,
    mut ctx: SystemContext,
) -> Result<ActorMetrics, ActorError> {
    while let Some(msg) = rx.recv().await {
        if actor.process_msg(msg, &mut ctx)? == ActorStatus::Finished {
            return Ok(actor.metrics());
        }
    }
    Err(ActorError::Join(format!(
        "mailbox of actor {} closed before it finished",
        actor.actor_id()
    )))
}
