use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use strata_dns_application::ports::ServiceBackend;
use strata_dns_application::use_cases::ServiceResolver;
use strata_dns_domain::{DomainError, RecordType, RrData, ServiceRecord};

/// Backend over a fixed name → records map. Wildcard labels match any
/// label at their position, mirroring the storage adapters.
struct MapBackend {
    records: HashMap<String, Vec<ServiceRecord>>,
}

impl MapBackend {
    fn new(entries: Vec<(&str, ServiceRecord)>) -> Self {
        let mut records: HashMap<String, Vec<ServiceRecord>> = HashMap::new();
        for (name, record) in entries {
            records.entry(name.to_string()).or_default().push(record);
        }
        Self { records }
    }
}

#[async_trait]
impl ServiceBackend for MapBackend {
    async fn lookup(&self, qname: &str, _exact: bool) -> Result<Vec<ServiceRecord>, DomainError> {
        let q_labels: Vec<&str> = qname.trim_end_matches('.').split('.').collect();
        let mut out = Vec::new();
        for (stored, records) in &self.records {
            let s_labels: Vec<&str> = stored.trim_end_matches('.').split('.').collect();
            if s_labels.len() != q_labels.len() {
                continue;
            }
            let matches = q_labels
                .iter()
                .zip(&s_labels)
                .all(|(q, s)| *q == "*" || *q == "any" || q == s);
            if matches {
                out.extend(records.iter().cloned());
            }
        }
        if out.is_empty() {
            return Err(DomainError::NotFound);
        }
        Ok(out)
    }

    fn is_authoritative(&self, _qname: &str) -> bool {
        true
    }
}

fn record(host: &str, key: &str) -> ServiceRecord {
    ServiceRecord::new(host, key)
}

fn resolver(entries: Vec<(&str, ServiceRecord)>) -> ServiceResolver {
    ServiceResolver::new(Arc::new(MapBackend::new(entries)), "example.org.", 300, 60)
}

#[tokio::test]
async fn a_query_returns_address_with_default_ttl() {
    let r = resolver(vec![(
        "www.example.org.",
        record("1.2.3.4", "/strata/org/example/www"),
    )]);

    let res = r.resolve("www.example.org.", RecordType::A).await.unwrap();

    assert_eq!(res.answers.len(), 1);
    assert_eq!(res.answers[0].name, "www.example.org.");
    assert_eq!(res.answers[0].ttl, 300);
    assert_eq!(res.answers[0].data, RrData::A("1.2.3.4".parse().unwrap()));
}

#[tokio::test]
async fn aaaa_query_skips_ipv4_hosts() {
    let r = resolver(vec![(
        "www.example.org.",
        record("1.2.3.4", "/strata/org/example/www"),
    )]);

    let res = r.resolve("www.example.org.", RecordType::AAAA).await.unwrap();
    assert!(res.answers.is_empty(), "IPv4 host must not answer AAAA");
}

#[tokio::test]
async fn absent_name_surfaces_not_found() {
    let r = resolver(vec![(
        "www.example.org.",
        record("1.2.3.4", "/strata/org/example/www"),
    )]);

    let err = r
        .resolve("nope.example.org.", RecordType::A)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound));
}

#[tokio::test]
async fn name_host_yields_cname_and_in_zone_chase() {
    let r = resolver(vec![
        (
            "www.example.org.",
            record("backend.example.org.", "/strata/org/example/www"),
        ),
        (
            "backend.example.org.",
            record("10.0.0.9", "/strata/org/example/backend"),
        ),
    ]);

    let res = r.resolve("www.example.org.", RecordType::A).await.unwrap();

    assert_eq!(res.answers.len(), 2);
    assert_eq!(
        res.answers[0].data,
        RrData::Cname("backend.example.org.".to_string())
    );
    assert_eq!(res.answers[1].name, "backend.example.org.");
    assert_eq!(res.answers[1].data, RrData::A("10.0.0.9".parse().unwrap()));
}

#[tokio::test]
async fn cname_loop_is_detected() {
    let r = resolver(vec![
        (
            "a.example.org.",
            record("b.example.org.", "/strata/org/example/a"),
        ),
        (
            "b.example.org.",
            record("a.example.org.", "/strata/org/example/b"),
        ),
    ]);

    let err = r.resolve("a.example.org.", RecordType::A).await.unwrap_err();
    assert!(matches!(err, DomainError::CnameLoop(_)), "got {:?}", err);
}

#[tokio::test]
async fn srv_synthesizes_target_for_address_host() {
    let mut rec = record("10.0.0.1", "/strata/org/example/srv/a/x1");
    rec.port = 80;
    rec.priority = 10;
    rec.weight = 5;
    let r = resolver(vec![("a.srv.example.org.", rec)]);

    let res = r.resolve("a.srv.example.org.", RecordType::SRV).await.unwrap();

    assert_eq!(res.answers.len(), 1);
    match &res.answers[0].data {
        RrData::Srv {
            priority,
            weight,
            port,
            target,
        } => {
            assert_eq!(*priority, 10);
            assert_eq!(*weight, 100, "single record takes the whole pool");
            assert_eq!(*port, 80);
            assert_eq!(target, "x1.a.srv.example.org.");
        }
        other => panic!("expected SRV, got {:?}", other),
    }
    assert_eq!(res.additionals.len(), 1);
    assert_eq!(res.additionals[0].name, "x1.a.srv.example.org.");
    assert_eq!(res.additionals[0].data, RrData::A("10.0.0.1".parse().unwrap()));
}

#[tokio::test]
async fn srv_with_named_host_keeps_host_as_target() {
    let mut rec = record("svc1.internal.", "/strata/org/example/srv/a");
    rec.port = 80;
    rec.priority = 10;
    rec.weight = 5;
    let r = resolver(vec![("a.srv.example.org.", rec)]);

    let res = r.resolve("a.srv.example.org.", RecordType::SRV).await.unwrap();

    match &res.answers[0].data {
        RrData::Srv { target, .. } => assert_eq!(target, "svc1.internal."),
        other => panic!("expected SRV, got {:?}", other),
    }
    assert!(
        res.additionals.is_empty(),
        "out-of-zone target without an upstream resolves no glue"
    );
}

#[tokio::test]
async fn srv_weights_scale_per_priority_group() {
    let mut a = record("10.0.0.1", "/strata/org/example/srv/w/a");
    a.port = 80;
    a.priority = 10;
    a.weight = 60;
    let mut b = record("10.0.0.2", "/strata/org/example/srv/w/b");
    b.port = 80;
    b.priority = 10;
    b.weight = 20;
    let r = resolver(vec![("*.w.srv.example.org.", a), ("*.w.srv.example.org.", b)]);

    let res = r
        .resolve("*.w.srv.example.org.", RecordType::SRV)
        .await
        .unwrap();

    let weights: Vec<u16> = res
        .answers
        .iter()
        .map(|rr| match rr.data {
            RrData::Srv { weight, .. } => weight,
            _ => panic!("expected SRV"),
        })
        .collect();
    assert_eq!(weights.iter().map(|w| *w as u32).sum::<u32>(), 100);
    assert!(weights.contains(&75) && weights.contains(&25));
}

#[tokio::test]
async fn wildcard_expansion_deduplicates_identical_records() {
    let shared = record("10.0.0.1", "/strata/org/example/svc/a");
    let r = resolver(vec![
        ("a.svc.example.org.", shared.clone()),
        ("a.svc.example.org.", shared),
        ("b.svc.example.org.", record("10.0.0.2", "/strata/org/example/svc/b")),
    ]);

    let res = r.resolve("*.svc.example.org.", RecordType::A).await.unwrap();

    assert_eq!(res.answers.len(), 2, "duplicates must collapse");
}

#[tokio::test]
async fn txt_skips_empty_payloads() {
    let mut with_text = record("10.0.0.1", "/strata/org/example/txt/a");
    with_text.text = "hello".to_string();
    let r = resolver(vec![
        ("a.example.org.", with_text),
        ("a.example.org.", record("10.0.0.2", "/strata/org/example/txt/b")),
    ]);

    let res = r.resolve("a.example.org.", RecordType::TXT).await.unwrap();

    assert_eq!(res.answers.len(), 1);
    assert_eq!(res.answers[0].data, RrData::Txt("hello".to_string()));
}

#[tokio::test]
async fn soa_is_anchored_at_the_zone_apex() {
    let r = resolver(vec![]);
    let res = r.resolve("example.org.", RecordType::SOA).await.unwrap();

    assert_eq!(res.answers.len(), 1);
    assert_eq!(res.answers[0].name, "example.org.");
    match &res.answers[0].data {
        RrData::Soa(soa) => {
            assert_eq!(soa.mname, "ns.dns.example.org.");
            assert_eq!(soa.minimum, 60);
        }
        other => panic!("expected SOA, got {:?}", other),
    }
}

#[tokio::test]
async fn translator_is_pure_for_identical_inputs() {
    let entries = vec![
        (
            "www.example.org.",
            record("1.2.3.4", "/strata/org/example/www"),
        ),
        (
            "www.example.org.",
            record("5.6.7.8", "/strata/org/example/www2"),
        ),
    ];
    let r = resolver(entries);

    let first = r.resolve("www.example.org.", RecordType::A).await.unwrap();
    let second = r.resolve("www.example.org.", RecordType::A).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn explicit_record_ttl_wins_over_default() {
    let mut rec = record("1.2.3.4", "/strata/org/example/www");
    rec.ttl = 30;
    let r = resolver(vec![("www.example.org.", rec)]);

    let res = r.resolve("www.example.org.", RecordType::A).await.unwrap();
    assert_eq!(res.answers[0].ttl, 30);
}
