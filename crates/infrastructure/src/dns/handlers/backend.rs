use crate::dns::chain::{ChainHandler, ServeOutcome};
use crate::dns::reply::ReplyBuilder;
use async_trait::async_trait;
use hickory_proto::op::Message;
use strata_dns_application::use_cases::ServiceResolver;
use strata_dns_domain::{DomainError, QueryContext, Rcode, RecordType, Rr};
use tracing::error;

/// Authoritative handler over one storage backend: translate the
/// backend's service records into a full response for the zone.
pub struct BackendHandler {
    name: &'static str,
    resolver: ServiceResolver,
    fallthrough: bool,
}

impl BackendHandler {
    pub fn new(name: &'static str, resolver: ServiceResolver, fallthrough: bool) -> Self {
        Self {
            name,
            resolver,
            fallthrough,
        }
    }

    /// Zone NS set shown in the authority section of positive non-apex
    /// answers. Best effort: a backend without NS data leaves it empty.
    async fn authority_ns(&self, ctx: &QueryContext) -> Vec<Rr> {
        if ctx.qname() == self.resolver.origin() {
            return vec![];
        }
        if matches!(ctx.record_type(), RecordType::NS | RecordType::SOA) {
            return vec![];
        }
        match self
            .resolver
            .resolve(self.resolver.origin(), RecordType::NS)
            .await
        {
            Ok(resolution) => resolution.answers,
            Err(_) => vec![],
        }
    }
}

#[async_trait]
impl ChainHandler for BackendHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn serve(
        &self,
        ctx: &QueryContext,
        request: &Message,
    ) -> Result<ServeOutcome, DomainError> {
        let authoritative = self.resolver.is_authoritative(ctx.qname());
        match self.resolver.resolve(ctx.qname(), ctx.record_type()).await {
            Ok(resolution) if resolution.is_empty() => {
                // Name exists, type does not: NODATA with the SOA.
                let soa = self.resolver.soa();
                let response = ReplyBuilder::new(request, ctx, authoritative)
                    .negative(Rcode::NoError, &soa);
                Ok(ServeOutcome::Answered(response))
            }
            Ok(resolution) => {
                let authority = self.authority_ns(ctx).await;
                let response = ReplyBuilder::new(request, ctx, authoritative)
                    .positive(&resolution, &authority);
                Ok(ServeOutcome::Answered(response))
            }
            Err(DomainError::NotFound) => {
                if self.fallthrough {
                    return Ok(ServeOutcome::Pass);
                }
                let soa = self.resolver.soa();
                let response = ReplyBuilder::new(request, ctx, authoritative)
                    .negative(Rcode::NxDomain, &soa);
                Ok(ServeOutcome::Answered(response))
            }
            Err(err @ DomainError::MalformedRecord { .. }) => {
                error!(
                    qname = %ctx.qname(),
                    handler = self.name,
                    error = %err,
                    "Backend produced an unusable record"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}
