use serde::Serialize;
use serde_json::Value;

use crate::models::CoreError;

/// Outcome of one task invocation against one context. Aggregations keep
/// these in submission (or provider production) order, never completion
/// order.
#[derive(Clone, Debug, PartialEq)]
pub struct InvocationResult {
    context: String,
    outcome: Result<Value, CoreError>,
}

impl InvocationResult {
    pub fn new(context: impl Into<String>, outcome: Result<Value, CoreError>) -> Self {
        Self {
            context: context.into(),
            outcome,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn outcome(&self) -> &Result<Value, CoreError> {
        &self.outcome
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn into_outcome(self) -> Result<Value, CoreError> {
        self.outcome
    }

    /// The serializable boundary projection handed to front ends.
    pub fn into_record(self) -> InvocationRecord {
        match self.outcome {
            Ok(result) => InvocationRecord {
                context: self.context,
                result: Some(result),
                exception: None,
            },
            Err(error) => InvocationRecord {
                context: self.context,
                result: None,
                exception: Some(error.to_string()),
            },
        }
    }
}

/// One row of the structured result surface: context identity plus either a
/// result value or a captured failure description.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InvocationRecord {
    pub context: String,
    pub result: Option<Value>,
    pub exception: Option<String>,
}

/// Pass/fail outcome of one of a task's associated self-tests.
#[derive(Clone, Debug, PartialEq)]
pub struct TestReport {
    pub test: String,
    pub failure: Option<CoreError>,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}
