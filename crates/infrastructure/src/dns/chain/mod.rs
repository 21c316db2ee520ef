mod router;

pub use router::{RouterTable, ZoneChain, ZoneRouter};

use async_trait::async_trait;
use hickory_proto::op::Message;
use strata_dns_domain::{DomainError, QueryContext};

/// What one handler did with a query.
pub enum ServeOutcome {
    /// The handler produced the full response; the chain stops here.
    Answered(Message),
    /// The handler declined; the router advances to the next handler.
    Pass,
}

/// One unit in a zone's chain. Handlers are self-contained values; the
/// chain is heterogeneous and configured per zone.
#[async_trait]
pub trait ChainHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// An `Err` return means the handler claimed the query and failed:
    /// the router answers SERVFAIL and logs. Handlers wanting later
    /// handlers to run return `ServeOutcome::Pass` instead.
    async fn serve(
        &self,
        ctx: &QueryContext,
        request: &Message,
    ) -> Result<ServeOutcome, DomainError>;
}
