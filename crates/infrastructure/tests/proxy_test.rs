use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_dns_domain::{DomainError, SelectionPolicy, Transport, UpstreamConfig};
use strata_dns_infrastructure::dns::codec;
use strata_dns_infrastructure::dns::proxy::{Exchanger, Proxy, UpstreamHost};

/// Scripted transport: per-server behavior plus attempt accounting.
#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    Answer,
    Refuse,
    TruncateUdp,
}

struct ScriptedExchanger {
    behaviors: HashMap<SocketAddr, Behavior>,
    attempts: Mutex<Vec<(SocketAddr, Transport)>>,
}

impl ScriptedExchanger {
    fn new(behaviors: Vec<(SocketAddr, Behavior)>) -> Self {
        Self {
            behaviors: behaviors.into_iter().collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn attempts_for(&self, server: SocketAddr) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(addr, _)| *addr == server)
            .count()
    }

    fn attempts(&self) -> Vec<(SocketAddr, Transport)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Exchanger for ScriptedExchanger {
    async fn exchange(
        &self,
        server: SocketAddr,
        payload: &[u8],
        _timeout: Duration,
        transport: Transport,
    ) -> Result<Vec<u8>, DomainError> {
        self.attempts.lock().unwrap().push((server, transport));
        match self.behaviors.get(&server).copied().unwrap_or(Behavior::Answer) {
            Behavior::Refuse => Err(DomainError::TransportConnectionRefused {
                server: server.to_string(),
            }),
            Behavior::TruncateUdp if transport == Transport::Udp => {
                Ok(answer_bytes(payload, None, true))
            }
            _ => Ok(answer_bytes(payload, Some("93.184.216.34"), false)),
        }
    }
}

fn answer_bytes(query_payload: &[u8], ip: Option<&str>, truncated: bool) -> Vec<u8> {
    let request = Message::from_vec(query_payload).unwrap();
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    for query in request.queries() {
        response.add_query(query.clone());
    }
    response.set_truncated(truncated);
    if let Some(ip) = ip {
        let name = request.queries()[0].name().clone();
        response.add_answer(Record::from_rdata(name, 300, RData::A(A(ip.parse().unwrap()))));
    }
    codec::serialize(&response).unwrap()
}

fn addr(last: u8) -> SocketAddr {
    format!("10.1.0.{}:53", last).parse().unwrap()
}

fn config(servers: Vec<SocketAddr>, max_fails: u32) -> UpstreamConfig {
    UpstreamConfig {
        servers: servers.iter().map(|a| a.to_string()).collect(),
        policy: SelectionPolicy::RoundRobin,
        max_fails,
        fail_timeout_secs: 30,
        try_duration_secs: 5,
        attempt_timeout_ms: 200,
    }
}

fn query_payload() -> Vec<u8> {
    codec::build_query("www.example.org.", strata_dns_domain::RecordType::A)
        .unwrap()
        .1
}

#[tokio::test]
async fn failing_host_is_evicted_after_max_fails() {
    let h1 = addr(1);
    let h2 = addr(2);
    let exchanger = Arc::new(ScriptedExchanger::new(vec![
        (h1, Behavior::Refuse),
        (h2, Behavior::Answer),
    ]));
    let proxy = Proxy::from_config(&config(vec![h1, h2], 5), exchanger.clone()).unwrap();

    let payload = query_payload();
    for _ in 0..10 {
        let response = proxy
            .exchange_with_retry(&payload, Transport::Udp)
            .await
            .unwrap();
        assert_eq!(response.answers().len(), 1);
    }

    assert_eq!(
        exchanger.attempts_for(h1),
        5,
        "H1 must leave the selection set after max_fails failures"
    );
    let down_host = proxy
        .hosts()
        .iter()
        .find(|h| h.addr() == h1)
        .cloned()
        .unwrap();
    assert!(down_host.is_down());
}

#[tokio::test]
async fn failure_window_empties_after_fail_timeout() {
    let host = Arc::new(UpstreamHost::new(addr(9), Duration::from_millis(50), 2));

    host.record_failure();
    host.record_failure();
    assert_eq!(host.fails(), 2);
    assert!(host.is_down());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(host.fails(), 0, "each failure must decrement exactly once");
    assert!(!host.is_down());
}

#[tokio::test]
async fn truncated_udp_answer_is_retried_over_tcp_on_the_same_host() {
    let h1 = addr(1);
    let exchanger = Arc::new(ScriptedExchanger::new(vec![(h1, Behavior::TruncateUdp)]));
    let proxy = Proxy::from_config(&config(vec![h1], 3), exchanger.clone()).unwrap();

    let response = proxy
        .exchange_with_retry(&query_payload(), Transport::Udp)
        .await
        .unwrap();

    assert!(!response.truncated());
    assert_eq!(response.answers().len(), 1);
    let attempts = exchanger.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0], (h1, Transport::Udp));
    assert_eq!(attempts[1], (h1, Transport::Tcp));
}

#[tokio::test]
async fn exhaustion_surfaces_as_unreachable() {
    let h1 = addr(1);
    let h2 = addr(2);
    let exchanger = Arc::new(ScriptedExchanger::new(vec![
        (h1, Behavior::Refuse),
        (h2, Behavior::Refuse),
    ]));
    let proxy = Proxy::from_config(&config(vec![h1, h2], 1), exchanger.clone()).unwrap();

    let err = proxy
        .exchange_with_retry(&query_payload(), Transport::Udp)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::TransportNoHealthyServers | DomainError::TransportAllServersUnreachable
    ));
}

#[tokio::test]
async fn retries_prefer_a_different_host() {
    let h1 = addr(1);
    let h2 = addr(2);
    let exchanger = Arc::new(ScriptedExchanger::new(vec![
        (h1, Behavior::Refuse),
        (h2, Behavior::Answer),
    ]));
    let proxy = Proxy::from_config(&config(vec![h1, h2], 10), exchanger.clone()).unwrap();

    proxy
        .exchange_with_retry(&query_payload(), Transport::Udp)
        .await
        .unwrap();

    let attempts = exchanger.attempts();
    for pair in attempts.windows(2) {
        assert_ne!(pair[0].0, pair[1].0, "consecutive attempts hit one host");
    }
}

#[tokio::test]
async fn connection_counters_return_to_zero() {
    let h1 = addr(1);
    let exchanger = Arc::new(ScriptedExchanger::new(vec![(h1, Behavior::Answer)]));
    let proxy = Proxy::from_config(&config(vec![h1], 3), exchanger.clone()).unwrap();

    let proxy = Arc::new(proxy);
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let proxy = Arc::clone(&proxy);
            tokio::spawn(async move {
                proxy
                    .exchange_with_retry(&query_payload(), Transport::Udp)
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(proxy.hosts()[0].active_conns(), 0);
}

#[tokio::test]
async fn forced_health_prod_overrides_the_window() {
    let host = Arc::new(UpstreamHost::new(addr(7), Duration::from_secs(10), 3));
    assert!(!host.is_down());
    host.set_forced_down(true);
    assert!(host.is_down());
    host.set_forced_down(false);
    assert!(!host.is_down());
}
