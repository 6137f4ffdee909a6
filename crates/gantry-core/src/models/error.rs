use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ExecutionErrorKind {
    InvalidInput,
    ProcessFailure,
    NonZeroExit,
    Timeout,
    Io,
    Transport,
    Parse,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ConvergencePhase {
    Run,
    PostVerify,
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CoreError {
    #[error("no task found for '{name}'")]
    TaskNotFound { name: String },

    #[error("failed to load task '{name}': {reason}")]
    TaskLoad { name: String, reason: String },

    #[error("invalid task name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("parameter '{parameter}' of task '{task}': {reason}")]
    ParameterBinding {
        task: String,
        parameter: String,
        reason: String,
    },

    #[error("task '{task}' failed during {phase:?} on {context}: {reason}")]
    Convergence {
        task: String,
        context: String,
        phase: ConvergencePhase,
        reason: String,
    },

    #[error("{kind:?}: {reason}")]
    Execution {
        kind: ExecutionErrorKind,
        reason: String,
    },

    #[error("invalid host range '{expr}': {reason}")]
    HostRange { expr: String, reason: String },

    #[error("{0}")]
    Task(String),

    #[error("{0}")]
    Internal(String),
}

impl CoreError {
    pub fn execution(kind: ExecutionErrorKind, reason: impl Into<String>) -> Self {
        Self::Execution {
            kind,
            reason: reason.into(),
        }
    }

    pub fn task(reason: impl Into<String>) -> Self {
        Self::Task(reason.into())
    }
}
