use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::Context;
use crate::models::{CoreResult, InvocationResult, ParamSpec, TaskName};
use crate::registry::{Registry, TaskManifest};

pub mod convergence;
mod instance;
mod params;

pub use convergence::{CheckOutcome, ConvergenceState};
pub use instance::{TaskCall, TaskInstance};
pub use params::{BoundParams, TaskArgs};

/// What a `verify` body reports when it does not fail: the desired state
/// already holds, or the task declares no check at all (the default).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerifyOutcome {
    Satisfied,
    NoCheck,
}

/// The behavior a task module registers: a required `run` that establishes
/// the desired state, and an optional `verify` that checks whether it
/// already holds. An `Err` from `verify` means the checked state does not
/// hold. Bodies see the execution target only through the helpers on
/// [`TaskCall`], never a concrete context type.
#[async_trait(?Send)]
pub trait TaskBehavior: Send + Sync {
    async fn verify(&self, call: &mut TaskCall) -> CoreResult<VerifyOutcome> {
        let _ = call;
        Ok(VerifyOutcome::NoCheck)
    }

    async fn run(&self, call: &mut TaskCall) -> CoreResult<Value>;
}

/// A self-test associated with a task definition. Invoked with no
/// parameters; an error is a failure.
pub struct TaskTest {
    name: String,
    body: Arc<dyn TaskBehavior>,
}

impl TaskTest {
    pub fn new(name: impl Into<String>, body: Arc<dyn TaskBehavior>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn body(&self) -> &Arc<dyn TaskBehavior> {
        &self.body
    }
}

/// The immutable, once-loaded description of a task. Created by the registry
/// the first time its name resolves and cached for the process lifetime;
/// re-resolution returns the same `Arc`.
pub struct TaskDefinition {
    name: TaskName,
    params: Vec<ParamSpec>,
    doc: String,
    tests: Vec<TaskTest>,
    behavior: Arc<dyn TaskBehavior>,
}

impl std::fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

impl TaskDefinition {
    pub(crate) fn new(name: TaskName, manifest: TaskManifest, tests: Vec<TaskTest>) -> Self {
        Self {
            name,
            params: manifest.params,
            doc: manifest.doc,
            tests,
            behavior: manifest.behavior,
        }
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn tests(&self) -> &[TaskTest] {
        &self.tests
    }

    pub(crate) fn behavior(&self) -> &Arc<dyn TaskBehavior> {
        &self.behavior
    }

    /// Boundary entry point for front ends: binds the arguments, drives the
    /// convergence contract against the given context, and captures any
    /// failure in the returned result instead of raising it.
    pub async fn invoke(
        self: Arc<Self>,
        registry: Arc<Registry>,
        context: Arc<dyn Context>,
        args: TaskArgs,
    ) -> InvocationResult {
        TaskInstance::new(self, registry, context).invoke(args).await
    }
}
