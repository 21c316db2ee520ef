use crate::ports::{ServiceBackend, UpstreamLookup};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use strata_dns_domain::{
    name, synthesize_soa, unix_serial, DomainError, HostKind, RecordType, Rr, RrData,
    ServiceRecord, DEFAULT_NS_LABEL,
};
use tracing::debug;

/// Hard cap on CNAME indirection. Revisiting a name before the cap is a
/// loop; both conditions surface as SERVFAIL.
const MAX_CNAME_HOPS: usize = 8;

/// Weight pool each SRV priority group is scaled to.
const SRV_WEIGHT_POOL: f64 = 100.0;

/// Translator output: answer RRs plus the glue that belongs in the
/// additional section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub answers: Vec<Rr>,
    pub additionals: Vec<Rr>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    fn merge(&mut self, other: Resolution) {
        self.answers.extend(other.answers);
        self.additionals.extend(other.additionals);
    }
}

/// Translates a backend's service records into resource records for one
/// question. Pure with respect to its inputs: identical (records,
/// question) pairs produce identical output, modulo the SOA serial.
pub struct ServiceResolver {
    backend: Arc<dyn ServiceBackend>,
    origin: Arc<str>,
    default_ttl: u32,
    soa_minimum: u32,
    external: Option<Arc<dyn UpstreamLookup>>,
}

impl ServiceResolver {
    pub fn new(
        backend: Arc<dyn ServiceBackend>,
        origin: impl Into<Arc<str>>,
        default_ttl: u32,
        soa_minimum: u32,
    ) -> Self {
        Self {
            backend,
            origin: origin.into(),
            default_ttl,
            soa_minimum,
            external: None,
        }
    }

    /// Attach an upstream for names the local backend cannot answer
    /// (out-of-zone CNAME targets and SRV glue).
    pub fn with_external(mut self, external: Arc<dyn UpstreamLookup>) -> Self {
        self.external = Some(external);
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Answers for `qname` carry the AA bit only when the name sits in
    /// this zone and the backend owns its data.
    pub fn is_authoritative(&self, qname: &str) -> bool {
        name::is_subdomain(&self.origin, qname) && self.backend.is_authoritative(qname)
    }

    /// The zone's synthesized SOA, used for apex SOA answers and for the
    /// authority section of negative replies.
    pub fn soa(&self) -> Rr {
        synthesize_soa(&self.origin, unix_serial(), self.soa_minimum)
    }

    pub async fn resolve(
        &self,
        qname: &str,
        qtype: RecordType,
    ) -> Result<Resolution, DomainError> {
        let result = match qtype {
            RecordType::A | RecordType::AAAA => self.address_records(qname, qtype).await,
            RecordType::SRV => self.srv_records(qname).await,
            RecordType::TXT => self.txt_records(qname).await,
            RecordType::PTR => self.ptr_records(qname).await,
            RecordType::NS => self.ns_records(qname).await,
            RecordType::CNAME => self.cname_records(qname).await,
            RecordType::SOA => Ok(Resolution {
                answers: vec![self.soa()],
                additionals: vec![],
            }),
            RecordType::ANY => self.any_records(qname).await,
        };

        match result {
            // Name present, type absent: NODATA, not NXDOMAIN.
            Err(DomainError::NameExists) => Ok(Resolution::default()),
            other => other,
        }
    }

    /// Backend fetch plus the shared post-processing: wildcard-set
    /// deduplication and default filling.
    async fn fetch(&self, qname: &str, exact: bool) -> Result<Vec<ServiceRecord>, DomainError> {
        let services = self.backend.lookup(qname, exact).await?;
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(services.len());
        for mut service in services {
            let key = {
                let (host, port, priority, weight, text, path) = service.identity();
                (
                    host.to_string(),
                    port,
                    priority,
                    weight,
                    text.to_string(),
                    path.to_string(),
                )
            };
            if !seen.insert(key) {
                continue;
            }
            service.apply_defaults();
            out.push(service);
        }
        Ok(out)
    }

    fn rr_ttl(&self, service: &ServiceRecord) -> u32 {
        if service.ttl == 0 {
            self.default_ttl
        } else {
            service.ttl
        }
    }

    async fn address_records(
        &self,
        qname: &str,
        qtype: RecordType,
    ) -> Result<Resolution, DomainError> {
        let mut seen = vec![qname.to_string()];
        self.chase(qname.to_string(), qtype, 0, &mut seen).await
    }

    /// One level of the A/AAAA walk: direct addresses answer under
    /// `owner`, names become a CNAME plus a recursive chase on the target.
    fn chase<'a>(
        &'a self,
        owner: String,
        qtype: RecordType,
        depth: usize,
        seen: &'a mut Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<Resolution, DomainError>> + Send + 'a>> {
        Box::pin(async move {
            let services = self.fetch(&owner, false).await?;
            let mut res = Resolution::default();

            for service in services {
                let ttl = self.rr_ttl(&service);
                match service.host_kind() {
                    HostKind::V4(ip) => {
                        if qtype == RecordType::A {
                            res.answers.push(Rr::new(owner.clone(), ttl, RrData::A(ip)));
                        }
                    }
                    HostKind::V6(ip) => {
                        if qtype == RecordType::AAAA {
                            res.answers.push(Rr::new(owner.clone(), ttl, RrData::Aaaa(ip)));
                        }
                    }
                    HostKind::Name(target) => {
                        res.answers
                            .push(Rr::new(owner.clone(), ttl, RrData::Cname(target.clone())));

                        if seen.contains(&target) {
                            return Err(DomainError::CnameLoop(target));
                        }
                        if depth + 1 >= MAX_CNAME_HOPS {
                            return Err(DomainError::CnameChainTooLong {
                                name: target,
                                max: MAX_CNAME_HOPS,
                            });
                        }
                        seen.push(target.clone());

                        if name::is_subdomain(&self.origin, &target) {
                            match self.chase(target.clone(), qtype, depth + 1, seen).await {
                                Ok(sub) => res.merge(sub),
                                Err(
                                    err @ (DomainError::CnameLoop(_)
                                    | DomainError::CnameChainTooLong { .. }),
                                ) => return Err(err),
                                // The chain tip is missing; the CNAME
                                // itself still stands as the answer.
                                Err(err) => {
                                    debug!(target = %target, error = %err, "Dangling CNAME target");
                                }
                            }
                        } else if let Some(external) = &self.external {
                            match external.lookup(&target, qtype).await {
                                Ok(rrs) => res.answers.extend(rrs),
                                Err(err) => {
                                    debug!(target = %target, error = %err, "External CNAME target lookup failed");
                                }
                            }
                        }
                    }
                }
            }

            Ok(res)
        })
    }

    async fn srv_records(&self, qname: &str) -> Result<Resolution, DomainError> {
        let services = self.fetch(qname, false).await?;

        // Scale the weights of each priority group to a fixed pool so
        // clients see percentages regardless of what the store holds.
        let mut group_weight: HashMap<u16, u32> = HashMap::new();
        for service in &services {
            let weight = if service.weight == 0 {
                100
            } else {
                u32::from(service.weight)
            };
            *group_weight.entry(service.priority).or_default() += weight;
        }

        let mut res = Resolution::default();
        for service in &services {
            if service.port == 0 {
                debug!(key = %service.key, "Skipping SRV for record without a port");
                continue;
            }
            let total = group_weight.get(&service.priority).copied().unwrap_or(100);
            let raw = if service.weight == 0 {
                100
            } else {
                u32::from(service.weight)
            };
            let weight = ((SRV_WEIGHT_POOL / f64::from(total)) * f64::from(raw)).floor() as u16;
            let ttl = self.rr_ttl(service);

            match service.host_kind() {
                HostKind::V4(ip) => {
                    let target = service.target_name();
                    res.answers.push(Rr::new(
                        qname.to_string(),
                        ttl,
                        RrData::Srv {
                            priority: service.priority,
                            weight,
                            port: service.port,
                            target: target.clone(),
                        },
                    ));
                    res.additionals.push(Rr::new(target, ttl, RrData::A(ip)));
                }
                HostKind::V6(ip) => {
                    let target = service.target_name();
                    res.answers.push(Rr::new(
                        qname.to_string(),
                        ttl,
                        RrData::Srv {
                            priority: service.priority,
                            weight,
                            port: service.port,
                            target: target.clone(),
                        },
                    ));
                    res.additionals.push(Rr::new(target, ttl, RrData::Aaaa(ip)));
                }
                HostKind::Name(target) => {
                    res.answers.push(Rr::new(
                        qname.to_string(),
                        ttl,
                        RrData::Srv {
                            priority: service.priority,
                            weight,
                            port: service.port,
                            target: target.clone(),
                        },
                    ));
                    res.additionals
                        .extend(self.target_glue(&target).await);
                }
            }
        }
        Ok(res)
    }

    /// Best-effort A/AAAA glue for a named SRV target. Failures leave the
    /// additional section short, never fail the answer.
    async fn target_glue(&self, target: &str) -> Vec<Rr> {
        let mut glue = Vec::new();
        if name::is_subdomain(&self.origin, target) {
            if let Ok(services) = self.fetch(target, true).await {
                for service in services {
                    let ttl = self.rr_ttl(&service);
                    match service.host_kind() {
                        HostKind::V4(ip) => {
                            glue.push(Rr::new(target.to_string(), ttl, RrData::A(ip)))
                        }
                        HostKind::V6(ip) => {
                            glue.push(Rr::new(target.to_string(), ttl, RrData::Aaaa(ip)))
                        }
                        HostKind::Name(_) => {}
                    }
                }
            }
        } else if let Some(external) = &self.external {
            for rtype in [RecordType::A, RecordType::AAAA] {
                if let Ok(rrs) = external.lookup(target, rtype).await {
                    glue.extend(rrs);
                }
            }
        }
        glue
    }

    async fn txt_records(&self, qname: &str) -> Result<Resolution, DomainError> {
        let services = self.fetch(qname, false).await?;
        let mut res = Resolution::default();
        for service in services {
            if service.text.is_empty() {
                continue;
            }
            let ttl = self.rr_ttl(&service);
            res.answers.push(Rr::new(
                qname.to_string(),
                ttl,
                RrData::Txt(service.text.clone()),
            ));
        }
        Ok(res)
    }

    async fn ptr_records(&self, qname: &str) -> Result<Resolution, DomainError> {
        let services = self.fetch(qname, false).await?;
        let mut res = Resolution::default();
        for service in services {
            let ttl = self.rr_ttl(&service);
            match service.host_kind() {
                HostKind::Name(target) => {
                    res.answers
                        .push(Rr::new(qname.to_string(), ttl, RrData::Ptr(target)));
                }
                _ => {
                    debug!(key = %service.key, "Skipping PTR for address-valued record");
                }
            }
        }
        Ok(res)
    }

    /// NS records live under the reserved `ns.dns.<zone>` subtree and must
    /// hold addresses; the record's own key names the nameserver.
    async fn ns_records(&self, qname: &str) -> Result<Resolution, DomainError> {
        let ns_name = format!("{}{}", DEFAULT_NS_LABEL, self.origin);
        let services = self.fetch(&ns_name, false).await?;
        let mut res = Resolution::default();
        for service in services {
            let ttl = self.rr_ttl(&service);
            let target = name::domain_from_key(&service.key);
            match service.host_kind() {
                HostKind::V4(ip) => {
                    res.answers
                        .push(Rr::new(qname.to_string(), ttl, RrData::Ns(target.clone())));
                    res.additionals.push(Rr::new(target, ttl, RrData::A(ip)));
                }
                HostKind::V6(ip) => {
                    res.answers
                        .push(Rr::new(qname.to_string(), ttl, RrData::Ns(target.clone())));
                    res.additionals.push(Rr::new(target, ttl, RrData::Aaaa(ip)));
                }
                HostKind::Name(_) => {
                    return Err(DomainError::MalformedRecord {
                        key: service.key.clone(),
                        reason: "NS record must hold an IP address".to_string(),
                    });
                }
            }
        }
        Ok(res)
    }

    async fn cname_records(&self, qname: &str) -> Result<Resolution, DomainError> {
        let services = self.fetch(qname, true).await?;
        let mut res = Resolution::default();
        for service in services {
            if let HostKind::Name(target) = service.host_kind() {
                let ttl = self.rr_ttl(&service);
                res.answers
                    .push(Rr::new(qname.to_string(), ttl, RrData::Cname(target)));
            }
        }
        Ok(res)
    }

    async fn any_records(&self, qname: &str) -> Result<Resolution, DomainError> {
        // Existence check first so a truly absent name stays NXDOMAIN.
        self.fetch(qname, false).await?;

        let mut res = Resolution::default();
        for qtype in [RecordType::A, RecordType::AAAA] {
            if let Ok(sub) = self.address_records(qname, qtype).await {
                res.merge(sub);
            }
        }
        if let Ok(sub) = self.srv_records(qname).await {
            res.merge(sub);
        }
        if let Ok(sub) = self.txt_records(qname).await {
            res.merge(sub);
        }
        Ok(res)
    }
}
