use std::sync::Arc;

use serde_json::Value;

use crate::context::Context;
use crate::models::{CoreResult, InvocationResult, TaskName};
use crate::registry::Registry;
use crate::task::{TaskArgs, TaskInstance};

/// Composes a dotted task name by successive segment appends, deferring
/// resolution until the terminal `invoke`. Intermediate values are legal
/// partial prefixes and never touch the registry, so `tasks().segment("fs")`
/// is valid even though no task named `fs` exists.
#[derive(Clone)]
pub struct Navigator {
    registry: Arc<Registry>,
    context: Arc<dyn Context>,
    segments: Vec<String>,
}

impl Navigator {
    pub fn root(registry: Arc<Registry>, context: Arc<dyn Context>) -> Self {
        Self {
            registry,
            context,
            segments: Vec::new(),
        }
    }

    /// Appends a segment and returns the extended navigator. No resolution
    /// happens here.
    pub fn segment(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self {
            registry: Arc::clone(&self.registry),
            context: Arc::clone(&self.context),
            segments,
        }
    }

    /// The name accumulated so far. Building a name via repeated `segment`
    /// calls behaves identically to parsing the joined dotted string.
    pub fn name(&self) -> CoreResult<TaskName> {
        TaskName::from_segments(self.segments.clone())
    }

    /// Resolves the accumulated name, binds the arguments, and drives the
    /// convergence contract against this navigator's context. Resolution
    /// and binding failures are captured in the result like any other.
    pub async fn invoke(&self, args: TaskArgs) -> InvocationResult {
        let instance = match self
            .name()
            .and_then(|name| self.registry.resolve(&name))
        {
            Ok(definition) => TaskInstance::new(
                definition,
                Arc::clone(&self.registry),
                Arc::clone(&self.context),
            ),
            Err(error) => return InvocationResult::new(self.context.identity(), Err(error)),
        };
        instance.invoke(args).await
    }

    /// Like `invoke`, but propagates the failure, for task bodies that want
    /// a nested call's error to fail their own `run`.
    pub async fn call(&self, args: TaskArgs) -> CoreResult<Value> {
        self.invoke(args).await.into_outcome()
    }
}
