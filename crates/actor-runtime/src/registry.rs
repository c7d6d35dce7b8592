// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Which actor runs which task type.

use crate::{Actor, ActorError, ForwardCompActor, JobConf, KernelRegistry, SnapshotReader, SourceActor};
use plan_ir::{TaskProto, TaskType};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared environment handed to every actor factory.
#[derive(Clone)]
pub struct ActorEnv {
    pub job: JobConf,
    pub kernels: KernelRegistry,
    /// Source of initial weights, if the job restores from a snapshot.
    pub snapshot: Option<Arc<dyn SnapshotReader>>,
}

impl ActorEnv {
    pub fn new(job: JobConf) -> Self {
        Self {
            job,
            kernels: KernelRegistry::with_defaults(),
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: Arc<dyn SnapshotReader>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

impl std::fmt::Debug for ActorEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorEnv")
            .field("job", &self.job)
            .field("kernels", &self.kernels)
            .field("snapshot", &self.snapshot.is_some())
            .finish()
    }
}

/// Creates the actor for one task.
pub type ActorFactory = fn(&TaskProto, &ActorEnv) -> Result<Box<dyn Actor>, ActorError>;

/// Maps task types to actor factories.
#[derive(Clone)]
pub struct ActorRegistry {
    factories: HashMap<TaskType, ActorFactory>,
}

impl ActorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Forward compute actors for forward, loss and normalization-forward
    /// tasks, and the source actor.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        for task_type in [
            TaskType::NormalForward,
            TaskType::Loss,
            TaskType::NormalizationForward,
        ] {
            r.register(task_type, forward_factory);
        }
        r.register(TaskType::Source, source_factory);
        r
    }

    /// Registers a factory, returning the one it replaces.
    pub fn register(&mut self, task_type: TaskType, factory: ActorFactory) -> Option<ActorFactory> {
        self.factories.insert(task_type, factory)
    }

    pub fn has(&self, task_type: TaskType) -> bool {
        self.factories.contains_key(&task_type)
    }

    /// Builds the actor for `task`.
    pub fn create(&self, task: &TaskProto, env: &ActorEnv) -> Result<Box<dyn Actor>, ActorError> {
        let factory = self
            .factories
            .get(&task.task_type)
            .ok_or(ActorError::UnknownActorKind(task.task_type))?;
        factory(task, env)
    }
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().map(TaskType::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ActorRegistry").field("task_types", &kinds).finish()
    }
}

fn forward_factory(task: &TaskProto, env: &ActorEnv) -> Result<Box<dyn Actor>, ActorError> {
    Ok(Box::new(ForwardCompActor::new(task, env)?))
}

fn source_factory(task: &TaskProto, env: &ActorEnv) -> Result<Box<dyn Actor>, ActorError> {
    Ok(Box::new(SourceActor::new(task, env)?))
}
