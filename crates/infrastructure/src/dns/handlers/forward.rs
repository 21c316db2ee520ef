use crate::dns::chain::{ChainHandler, ServeOutcome};
use crate::dns::proxy::Proxy;
use async_trait::async_trait;
use hickory_proto::op::Message;
use std::sync::Arc;
use strata_dns_domain::{DomainError, QueryContext};

/// Hands the query to the upstream proxy. Bound to a whole zone this is
/// plain recursion; bound to a sub-zone it acts as a stub resolver for
/// that delegation.
pub struct ForwardHandler {
    proxy: Arc<Proxy>,
}

impl ForwardHandler {
    pub fn new(proxy: Arc<Proxy>) -> Self {
        Self { proxy }
    }

    pub fn proxy(&self) -> Arc<Proxy> {
        Arc::clone(&self.proxy)
    }
}

#[async_trait]
impl ChainHandler for ForwardHandler {
    fn name(&self) -> &'static str {
        "forward"
    }

    async fn serve(
        &self,
        ctx: &QueryContext,
        request: &Message,
    ) -> Result<ServeOutcome, DomainError> {
        let response = self.proxy.forward(ctx.transport(), request).await?;
        Ok(ServeOutcome::Answered(response))
    }
}
