//! Concurrent execution of many pending invocations on the cooperative
//! scheduler. All invocations of one batch overlap during their suspended
//! I/O waits; results always come back in submission order and one entry's
//! failure never cancels its siblings.

use std::sync::Arc;

use futures::future::join_all;

use crate::context::Context;
use crate::models::{CoreResult, InvocationRecord, InvocationResult, TaskName};
use crate::provider::Provider;
use crate::registry::Registry;
use crate::task::{TaskArgs, TaskInstance};

/// A pending, not-yet-executed task invocation: which task, against which
/// context, with which arguments.
pub struct Invocation {
    name: TaskName,
    context: Arc<dyn Context>,
    args: TaskArgs,
}

impl Invocation {
    pub fn new(name: TaskName, context: Arc<dyn Context>, args: TaskArgs) -> Self {
        Self {
            name,
            context,
            args,
        }
    }
}

/// Runs all invocations concurrently and waits for every one of them,
/// regardless of individual failure. Each entry's failure is captured in its
/// own result; inspecting which entries failed is the caller's job.
pub async fn run_all(
    registry: &Arc<Registry>,
    invocations: Vec<Invocation>,
) -> Vec<InvocationResult> {
    let pending = invocations.into_iter().map(|invocation| {
        let registry = Arc::clone(registry);
        async move {
            let Invocation {
                name,
                context,
                args,
            } = invocation;
            match registry.resolve(&name) {
                Ok(definition) => {
                    TaskInstance::new(definition, registry, context)
                        .invoke(args)
                        .await
                }
                Err(error) => InvocationResult::new(context.identity(), Err(error)),
            }
        }
    });

    let results = join_all(pending).await;
    for result in &results {
        if let Err(error) = result.outcome() {
            tracing::warn!(context = result.context(), %error, "invocation failed");
        }
    }
    results
}

/// Aggregated fan-out results, one per context, in provider production
/// order, addressable by context identity.
#[derive(Debug)]
pub struct FanOutReport {
    results: Vec<InvocationResult>,
}

impl FanOutReport {
    pub fn results(&self) -> &[InvocationResult] {
        &self.results
    }

    pub fn get(&self, identity: &str) -> Option<&InvocationResult> {
        self.results.iter().find(|result| result.context() == identity)
    }

    pub fn failures(&self) -> impl Iterator<Item = &InvocationResult> {
        self.results.iter().filter(|result| !result.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(InvocationResult::is_success)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The ordered boundary rows for front-end serialization.
    pub fn into_records(self) -> Vec<InvocationRecord> {
        self.results
            .into_iter()
            .map(InvocationResult::into_record)
            .collect()
    }
}

/// Applies one task invocation across every context the provider produces.
/// A failing target yields a recorded failure entry rather than an error;
/// only a failure to produce the targets themselves fails the call.
pub async fn fan_out(
    registry: &Arc<Registry>,
    provider: &mut dyn Provider,
    name: &TaskName,
    args: &TaskArgs,
) -> CoreResult<FanOutReport> {
    let mut invocations = Vec::new();
    while let Some(context) = provider.next_context().await? {
        invocations.push(Invocation::new(name.clone(), context, args.clone()));
    }
    tracing::debug!(task = %name, targets = invocations.len(), "fanning out");

    let results = run_all(registry, invocations).await;
    Ok(FanOutReport { results })
}
