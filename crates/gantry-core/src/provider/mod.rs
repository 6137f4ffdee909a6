use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::models::CoreResult;

mod hosts;
mod ssh;

pub use hosts::{HostIter, HostRangeSpec};
pub use ssh::SshProvider;

/// Produces an ordered, lazily-advancing sequence of contexts from some
/// declarative target specification. Consumed by iterating until `None`;
/// not restartable once exhausted. Each advance may establish a new
/// session, so a large expansion never opens resources ahead of use.
#[async_trait(?Send)]
pub trait Provider {
    async fn next_context(&mut self) -> CoreResult<Option<Arc<dyn Context>>>;
}
