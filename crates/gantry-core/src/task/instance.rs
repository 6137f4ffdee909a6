use std::sync::Arc;

use serde_json::Value;

use crate::context::Context;
use crate::coordinator::{self, Invocation};
use crate::execution::shell_escape;
use crate::models::{
    ConvergencePhase, CoreError, CoreResult, InvocationResult, TaskName,
};
use crate::navigator::Navigator;
use crate::registry::Registry;
use crate::task::convergence::{CheckOutcome, ConvergenceState};
use crate::task::params::{BoundParams, TaskArgs};
use crate::task::{TaskDefinition, VerifyOutcome};

/// The invocation-scoped surface handed to `verify`/`run` bodies: bound
/// parameters, the execution target's capabilities, nested task access, and
/// concurrent sub-invocation.
pub struct TaskCall {
    task: TaskName,
    registry: Arc<Registry>,
    context: Arc<dyn Context>,
    params: BoundParams,
    sub_results: Vec<InvocationResult>,
}

impl TaskCall {
    pub(crate) fn new(task: TaskName, registry: Arc<Registry>, context: Arc<dyn Context>) -> Self {
        Self {
            task,
            registry,
            context,
            params: BoundParams::empty(),
            sub_results: Vec::new(),
        }
    }

    pub fn task(&self) -> &TaskName {
        &self.task
    }

    pub fn identity(&self) -> String {
        self.context.identity()
    }

    pub fn context(&self) -> &Arc<dyn Context> {
        &self.context
    }

    pub fn params(&self) -> &BoundParams {
        &self.params
    }

    /// Escapes arbitrary text for inclusion in a command line. The escaped
    /// view of a bound parameter is `params().esc(name)`.
    pub fn esc(&self, text: &str) -> CoreResult<String> {
        shell_escape(text)
    }

    /// Runs a command on the target and returns its stdout as text.
    pub async fn sh(&self, command: &str) -> CoreResult<String> {
        let output = self.context.execute(command).await?;
        output.stdout_utf8()
    }

    pub async fn read(&self, path: &str) -> CoreResult<Vec<u8>> {
        self.context.read(path).await
    }

    pub async fn write(&self, path: &str, content: &[u8]) -> CoreResult<()> {
        self.context.write(path, content).await
    }

    /// A navigator rooted at this invocation's registry and context, for
    /// composing nested task calls by chained segment access.
    pub fn tasks(&self) -> Navigator {
        Navigator::root(Arc::clone(&self.registry), Arc::clone(&self.context))
    }

    /// Runs the given invocations concurrently and accumulates their results
    /// on this instance. Results come back in submission order.
    pub async fn run_all(&mut self, invocations: Vec<Invocation>) -> Vec<InvocationResult> {
        let results = coordinator::run_all(&self.registry, invocations).await;
        self.sub_results.extend(results.iter().cloned());
        results
    }

    pub fn sub_results(&self) -> &[InvocationResult] {
        &self.sub_results
    }
}

/// A definition bound to one context for one invocation. Dropped when the
/// invocation completes.
pub struct TaskInstance {
    definition: Arc<TaskDefinition>,
    call: TaskCall,
}

impl TaskInstance {
    pub fn new(
        definition: Arc<TaskDefinition>,
        registry: Arc<Registry>,
        context: Arc<dyn Context>,
    ) -> Self {
        let call = TaskCall::new(definition.name().clone(), registry, context);
        Self { definition, call }
    }

    /// Drives bind → pre-verify → run → post-verify and captures the outcome
    /// as a structured result. Failures never escape as raw errors.
    pub async fn invoke(mut self, args: TaskArgs) -> InvocationResult {
        let identity = self.call.identity();
        let outcome = self.converge(args).await;
        if let Err(error) = &outcome {
            tracing::debug!(
                task = %self.definition.name(),
                context = %identity,
                %error,
                "invocation failed"
            );
        }
        InvocationResult::new(identity, outcome)
    }

    async fn converge(&mut self, args: TaskArgs) -> CoreResult<Value> {
        self.call.params = BoundParams::bind(self.definition.name(), self.definition.params(), args)?;

        let behavior = Arc::clone(self.definition.behavior());
        let task = self.definition.name().dotted();
        let context = self.call.identity();
        tracing::debug!(task = %task, context = %context, "invoking");

        let mut state = ConvergenceState::Unverified;

        let precheck = behavior.verify(&mut self.call).await;
        let has_check = !matches!(precheck, Ok(VerifyOutcome::NoCheck));
        state = state.after_precheck(match &precheck {
            Ok(VerifyOutcome::Satisfied) => CheckOutcome::Satisfied,
            Ok(VerifyOutcome::NoCheck) => CheckOutcome::Skipped,
            Err(_) => CheckOutcome::NotSatisfied,
        });
        if state.is_converged() {
            tracing::debug!(task = %task, context = %context, "already converged, skipping run");
            return Ok(Value::Null);
        }

        let run_result = behavior.run(&mut self.call).await;
        state = state.after_run(run_result.is_ok());
        let value = match run_result {
            Ok(value) => value,
            Err(source) => {
                debug_assert!(state.is_failed());
                return Err(CoreError::Convergence {
                    task,
                    context,
                    phase: ConvergencePhase::Run,
                    reason: source.to_string(),
                });
            }
        };

        if !has_check {
            state = state.after_postcheck(CheckOutcome::Skipped);
            debug_assert!(state.is_converged());
            return Ok(value);
        }

        match behavior.verify(&mut self.call).await {
            Ok(_) => {
                state = state.after_postcheck(CheckOutcome::Satisfied);
                debug_assert!(state.is_converged());
                Ok(value)
            }
            Err(source) => {
                state = state.after_postcheck(CheckOutcome::NotSatisfied);
                debug_assert!(state.is_failed());
                Err(CoreError::Convergence {
                    task,
                    context,
                    phase: ConvergencePhase::PostVerify,
                    reason: source.to_string(),
                })
            }
        }
    }
}
