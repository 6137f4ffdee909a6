pub mod error;
pub mod name;
pub mod param;
pub mod report;

pub use error::{ConvergencePhase, CoreError, CoreResult, ExecutionErrorKind};
pub use name::TaskName;
pub use param::{ParamKind, ParamSpec};
pub use report::{InvocationRecord, InvocationResult, TestReport};
