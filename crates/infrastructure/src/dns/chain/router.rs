use super::{ChainHandler, ServeOutcome};
use crate::dns::codec;
use crate::dns::metrics::ServerMetrics;
use crate::dns::reply::ReplyBuilder;
use futures::FutureExt;
use hickory_proto::op::Message;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use strata_dns_application::use_cases::Resolution;
use strata_dns_domain::{
    name, synthesize_soa, unix_serial, QueryContext, Rcode, RecordType, Rr, RrData,
    DEFAULT_NS_LABEL,
};
use tracing::{error, info};

/// A configured origin with its ordered handler chain.
pub struct ZoneChain {
    origin: Arc<str>,
    handlers: Vec<Arc<dyn ChainHandler>>,
}

impl ZoneChain {
    pub fn new(origin: impl Into<Arc<str>>, handlers: Vec<Arc<dyn ChainHandler>>) -> Self {
        Self {
            origin: origin.into(),
            handlers,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Immutable routing snapshot. Reloads build a fresh table and swap it
/// in; in-flight queries keep reading the snapshot they started with.
pub struct RouterTable {
    zones: Vec<ZoneChain>,
}

impl RouterTable {
    pub fn new(zones: Vec<ZoneChain>) -> Self {
        Self { zones }
    }

    /// Longest-suffix zone match.
    fn find(&self, qname: &str) -> Option<&ZoneChain> {
        let best = name::best_zone(self.zones.iter().map(|z| z.origin()), qname)?;
        self.zones.iter().find(|z| z.origin() == best)
    }
}

/// Dispatches each query to the chain of its most specific zone and owns
/// the per-query observability: one log line and the rcode counters.
pub struct ZoneRouter {
    table: RwLock<Arc<RouterTable>>,
    metrics: Arc<ServerMetrics>,
    query_log: bool,
    soa_minimum: u32,
}

impl ZoneRouter {
    pub fn new(
        table: RouterTable,
        metrics: Arc<ServerMetrics>,
        query_log: bool,
        soa_minimum: u32,
    ) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
            metrics,
            query_log,
            soa_minimum,
        }
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Atomically swap in a new configuration snapshot.
    pub fn swap_table(&self, table: RouterTable) {
        let next = Arc::new(table);
        match self.table.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    fn snapshot(&self) -> Arc<RouterTable> {
        match self.table.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Route one query through its zone chain. Always produces a
    /// response message; internal errors become SERVFAIL.
    pub async fn route(&self, ctx: &QueryContext, request: &Message) -> Message {
        let start = Instant::now();
        self.metrics.record_query();
        let snapshot = self.snapshot();

        let Some(zone) = snapshot.find(ctx.qname()) else {
            let response = ReplyBuilder::new(request, ctx, false).error(Rcode::Refused);
            self.finish(ctx, &response, "none", start);
            return response;
        };

        for handler in &zone.handlers {
            if ctx.is_cancelled() {
                let response = ReplyBuilder::new(request, ctx, false).error(Rcode::ServFail);
                self.finish(ctx, &response, handler.name(), start);
                return response;
            }

            let outcome = AssertUnwindSafe(handler.serve(ctx, request))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(ServeOutcome::Answered(response))) => {
                    self.finish(ctx, &response, handler.name(), start);
                    return response;
                }
                Ok(Ok(ServeOutcome::Pass)) => continue,
                Ok(Err(err)) => {
                    error!(
                        qname = %ctx.qname(),
                        qtype = %ctx.record_type(),
                        handler = handler.name(),
                        error = %err,
                        "Handler failed"
                    );
                    let response = ReplyBuilder::new(request, ctx, false).error(Rcode::ServFail);
                    self.finish(ctx, &response, handler.name(), start);
                    return response;
                }
                Err(_panic) => {
                    error!(
                        qname = %ctx.qname(),
                        handler = handler.name(),
                        "Handler panicked; answering SERVFAIL"
                    );
                    let response = ReplyBuilder::new(request, ctx, false).error(Rcode::ServFail);
                    self.finish(ctx, &response, handler.name(), start);
                    return response;
                }
            }
        }

        // Chain exhausted. The router still owes a default SOA/NS answer
        // at the zone apex; anything else is a server-side gap.
        let response = match ctx.record_type() {
            RecordType::SOA | RecordType::NS if ctx.qname() == zone.origin() => {
                self.default_apex_answer(ctx, request, zone)
            }
            _ => ReplyBuilder::new(request, ctx, false).error(Rcode::ServFail),
        };
        self.finish(ctx, &response, "none", start);
        response
    }

    fn default_apex_answer(
        &self,
        ctx: &QueryContext,
        request: &Message,
        zone: &ZoneChain,
    ) -> Message {
        let answer = match ctx.record_type() {
            RecordType::SOA => synthesize_soa(zone.origin(), unix_serial(), self.soa_minimum),
            _ => Rr::new(
                zone.origin().to_string(),
                300,
                RrData::Ns(format!("{}{}", DEFAULT_NS_LABEL, zone.origin())),
            ),
        };
        let resolution = Resolution {
            answers: vec![answer],
            additionals: vec![],
        };
        ReplyBuilder::new(request, ctx, true).positive(&resolution, &[])
    }

    fn finish(&self, ctx: &QueryContext, response: &Message, handler: &str, start: Instant) {
        let rcode = codec::from_wire_rcode(response.response_code());
        self.metrics.record_response(rcode);
        if self.query_log {
            info!(
                client = %ctx.client(),
                qname = %ctx.qname(),
                qtype = %ctx.record_type(),
                rcode = %rcode,
                latency_ms = start.elapsed().as_millis() as u64,
                handler = handler,
                "query"
            );
        }
    }
}
