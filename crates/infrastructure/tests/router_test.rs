use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RData;
use std::sync::Arc;
use std::time::Duration;
use strata_dns_application::use_cases::ServiceResolver;
use strata_dns_domain::{
    DomainError, QueryClass, QueryContext, RecordType, Transport,
};
use strata_dns_infrastructure::dns::backends::{MemoryBackend, MemoryRecord};
use strata_dns_infrastructure::dns::chain::{ChainHandler, ServeOutcome};
use strata_dns_infrastructure::dns::codec;
use strata_dns_infrastructure::dns::handlers::BackendHandler;
use strata_dns_infrastructure::dns::{RouterTable, ServerMetrics, ZoneChain, ZoneRouter};

fn memory_record(name: &str, host: &str) -> MemoryRecord {
    MemoryRecord {
        name: name.to_string(),
        host: host.to_string(),
        port: 0,
        priority: 0,
        weight: 0,
        ttl: 0,
        text: String::new(),
    }
}

fn backend_handler(
    origin: &str,
    records: Vec<MemoryRecord>,
    fallthrough: bool,
) -> Arc<dyn ChainHandler> {
    let backend = Arc::new(MemoryBackend::new(records));
    let resolver = ServiceResolver::new(backend, origin.to_string(), 300, 60);
    Arc::new(BackendHandler::new("memory", resolver, fallthrough))
}

fn request_for(qname: &str, rtype: RecordType) -> (Message, QueryContext) {
    let (_, payload) = codec::build_query(qname, rtype).unwrap();
    let request = Message::from_vec(&payload).unwrap();
    let ctx = QueryContext::new(
        qname.to_string(),
        QueryClass::In,
        rtype,
        Transport::Udp,
        "127.0.0.1:40000".parse().unwrap(),
        4096,
        Duration::from_secs(5),
    );
    (request, ctx)
}

fn router(zones: Vec<ZoneChain>) -> ZoneRouter {
    ZoneRouter::new(
        RouterTable::new(zones),
        Arc::new(ServerMetrics::new()),
        false,
        60,
    )
}

struct AlwaysPass;

#[async_trait]
impl ChainHandler for AlwaysPass {
    fn name(&self) -> &'static str {
        "pass"
    }

    async fn serve(
        &self,
        _ctx: &QueryContext,
        _request: &Message,
    ) -> Result<ServeOutcome, DomainError> {
        Ok(ServeOutcome::Pass)
    }
}

struct Panicking;

#[async_trait]
impl ChainHandler for Panicking {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn serve(
        &self,
        _ctx: &QueryContext,
        _request: &Message,
    ) -> Result<ServeOutcome, DomainError> {
        panic!("handler bug");
    }
}

#[tokio::test]
async fn query_resolves_through_the_matching_zone() {
    let zones = vec![ZoneChain::new(
        "example.org.",
        vec![backend_handler(
            "example.org.",
            vec![memory_record("www.example.org.", "1.2.3.4")],
            false,
        )],
    )];
    let router = router(zones);

    let (request, ctx) = request_for("www.example.org.", RecordType::A);
    let response = router.route(&ctx, &request).await;

    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert!(response.authoritative());
    assert_eq!(response.answers().len(), 1);
    assert_eq!(response.answers()[0].ttl(), 300);
    match response.answers()[0].data() {
        RData::A(a) => assert_eq!(a.0, "1.2.3.4".parse::<std::net::Ipv4Addr>().unwrap()),
        other => panic!("expected A, got {:?}", other),
    }
}

#[tokio::test]
async fn unmatched_name_is_refused() {
    let zones = vec![ZoneChain::new(
        "example.org.",
        vec![backend_handler("example.org.", vec![], false)],
    )];
    let router = router(zones);

    let (request, ctx) = request_for("www.example.net.", RecordType::A);
    let response = router.route(&ctx, &request).await;

    assert_eq!(response.response_code(), ResponseCode::Refused);
    assert!(response.answers().is_empty());
}

#[tokio::test]
async fn most_specific_zone_wins() {
    let zones = vec![
        ZoneChain::new(
            "example.org.",
            vec![backend_handler(
                "example.org.",
                vec![memory_record("a.svc.example.org.", "9.9.9.9")],
                false,
            )],
        ),
        ZoneChain::new(
            "svc.example.org.",
            vec![backend_handler(
                "svc.example.org.",
                vec![memory_record("a.svc.example.org.", "10.0.0.1")],
                false,
            )],
        ),
    ];
    let router = router(zones);

    let (request, ctx) = request_for("a.svc.example.org.", RecordType::A);
    let response = router.route(&ctx, &request).await;

    match response.answers()[0].data() {
        RData::A(a) => assert_eq!(a.0, "10.0.0.1".parse::<std::net::Ipv4Addr>().unwrap()),
        other => panic!("expected A, got {:?}", other),
    }
}

#[tokio::test]
async fn nxdomain_carries_the_zone_soa() {
    let zones = vec![ZoneChain::new(
        "example.org.",
        vec![backend_handler(
            "example.org.",
            vec![memory_record("www.example.org.", "1.2.3.4")],
            false,
        )],
    )];
    let router = router(zones);

    let (request, ctx) = request_for("nope.example.org.", RecordType::A);
    let response = router.route(&ctx, &request).await;

    assert_eq!(response.response_code(), ResponseCode::NXDomain);
    assert!(response.answers().is_empty());
    assert_eq!(response.name_servers().len(), 1);
    assert!(matches!(response.name_servers()[0].data(), RData::SOA(_)));
}

#[tokio::test]
async fn nodata_for_existing_name_with_other_type() {
    let zones = vec![ZoneChain::new(
        "example.org.",
        vec![backend_handler(
            "example.org.",
            vec![memory_record("www.example.org.", "1.2.3.4")],
            false,
        )],
    )];
    let router = router(zones);

    let (request, ctx) = request_for("www.example.org.", RecordType::AAAA);
    let response = router.route(&ctx, &request).await;

    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert!(response.answers().is_empty());
    assert!(matches!(response.name_servers()[0].data(), RData::SOA(_)));
}

#[tokio::test]
async fn fallthrough_lets_the_next_handler_answer() {
    let zones = vec![ZoneChain::new(
        "example.org.",
        vec![
            backend_handler(
                "example.org.",
                vec![memory_record("other.example.org.", "5.5.5.5")],
                true,
            ),
            backend_handler(
                "example.org.",
                vec![memory_record("www.example.org.", "1.2.3.4")],
                false,
            ),
        ],
    )];
    let router = router(zones);

    let (request, ctx) = request_for("www.example.org.", RecordType::A);
    let response = router.route(&ctx, &request).await;

    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert_eq!(response.answers().len(), 1);
}

#[tokio::test]
async fn without_fallthrough_the_first_handler_owns_nxdomain() {
    let zones = vec![ZoneChain::new(
        "example.org.",
        vec![
            backend_handler(
                "example.org.",
                vec![memory_record("other.example.org.", "5.5.5.5")],
                false,
            ),
            backend_handler(
                "example.org.",
                vec![memory_record("www.example.org.", "1.2.3.4")],
                false,
            ),
        ],
    )];
    let router = router(zones);

    let (request, ctx) = request_for("www.example.org.", RecordType::A);
    let response = router.route(&ctx, &request).await;

    assert_eq!(response.response_code(), ResponseCode::NXDomain);
}

#[tokio::test]
async fn exhausted_chain_still_answers_apex_soa() {
    let pass: Arc<dyn ChainHandler> = Arc::new(AlwaysPass);
    let zones = vec![ZoneChain::new("example.org.", vec![pass])];
    let router = router(zones);

    let (request, ctx) = request_for("example.org.", RecordType::SOA);
    let response = router.route(&ctx, &request).await;

    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert_eq!(response.answers().len(), 1);
    assert!(matches!(response.answers()[0].data(), RData::SOA(_)));
}

#[tokio::test]
async fn exhausted_chain_does_not_invent_non_apex_records() {
    let pass: Arc<dyn ChainHandler> = Arc::new(AlwaysPass);
    let zones = vec![ZoneChain::new("example.org.", vec![pass])];
    let router = router(zones);

    let (request, ctx) = request_for("random.example.org.", RecordType::NS);
    let response = router.route(&ctx, &request).await;

    assert_eq!(response.response_code(), ResponseCode::ServFail);
    assert!(response.answers().is_empty());
}

#[tokio::test]
async fn handler_panic_becomes_servfail() {
    let panicking: Arc<dyn ChainHandler> = Arc::new(Panicking);
    let zones = vec![ZoneChain::new("example.org.", vec![panicking])];
    let router = router(zones);

    let (request, ctx) = request_for("www.example.org.", RecordType::A);
    let response = router.route(&ctx, &request).await;

    assert_eq!(response.response_code(), ResponseCode::ServFail);
}

#[tokio::test]
async fn reload_swaps_the_zone_table_atomically() {
    let router = router(vec![ZoneChain::new(
        "example.org.",
        vec![backend_handler(
            "example.org.",
            vec![memory_record("www.example.org.", "1.2.3.4")],
            false,
        )],
    )]);

    router.swap_table(RouterTable::new(vec![ZoneChain::new(
        "example.org.",
        vec![backend_handler(
            "example.org.",
            vec![memory_record("www.example.org.", "9.9.9.9")],
            false,
        )],
    )]));

    let (request, ctx) = request_for("www.example.org.", RecordType::A);
    let response = router.route(&ctx, &request).await;
    match response.answers()[0].data() {
        RData::A(a) => assert_eq!(a.0, "9.9.9.9".parse::<std::net::Ipv4Addr>().unwrap()),
        other => panic!("expected A, got {:?}", other),
    }
}
