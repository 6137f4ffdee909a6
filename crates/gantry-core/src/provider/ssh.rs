use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{Context, RemoteContext, SessionFactory};
use crate::models::CoreResult;
use crate::provider::Provider;
use crate::provider::hosts::{HostIter, HostRangeSpec};

/// Expands a host-range specification into one remote context per target,
/// in expansion order, establishing each session only when its target is
/// reached.
pub struct SshProvider {
    user: String,
    factory: Arc<dyn SessionFactory>,
    hosts: HostIter,
}

impl SshProvider {
    pub fn new(
        spec: HostRangeSpec,
        user: impl Into<String>,
        factory: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            user: user.into(),
            factory,
            hosts: spec.into_hosts(),
        }
    }
}

#[async_trait(?Send)]
impl Provider for SshProvider {
    async fn next_context(&mut self) -> CoreResult<Option<Arc<dyn Context>>> {
        let Some(host) = self.hosts.next() else {
            return Ok(None);
        };
        tracing::debug!(user = %self.user, %host, "establishing remote session");
        let session = self.factory.connect(&self.user, &host).await?;
        Ok(Some(Arc::new(RemoteContext::new(
            self.user.clone(),
            host,
            session,
        ))))
    }
}
