//! Conversions between the wire (hickory types) and the domain model.
//! Everything that touches `hickory_proto` on the request/response path
//! funnels through here.

use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, NS, PTR, SOA, SRV, TXT};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType as WireType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use strata_dns_domain::{name, DomainError, QueryClass, Rcode, RecordType, Rr, RrData};

/// EDNS payload size we advertise in responses and upstream queries.
pub const EDNS_PAYLOAD_SIZE: u16 = 4096;

/// Maximum response size for clients that did not negotiate EDNS.
pub const CLASSIC_UDP_SIZE: u16 = 512;

/// The question section of an inbound request, normalized.
#[derive(Debug)]
pub struct ParsedRequest {
    pub message: Message,
    pub qname: String,
    pub query_class: QueryClass,
    pub record_type: Option<RecordType>,
    pub has_edns: bool,
    pub edns_payload: u16,
}

/// Parse a raw DNS query. Messages without exactly one question are
/// rejected as malformed.
pub fn parse_request(bytes: &[u8]) -> Result<ParsedRequest, DomainError> {
    let message = Message::from_vec(bytes)
        .map_err(|e| DomainError::InvalidDnsResponse(format!("unparseable query: {}", e)))?;

    let query = message
        .queries()
        .first()
        .ok_or_else(|| DomainError::InvalidDnsResponse("query without a question".to_string()))?;

    let qname = name::normalize(&query.name().to_utf8());
    let query_class = QueryClass::from_u16(query.query_class().into());
    let record_type = RecordType::from_u16(query.query_type().into());

    let (has_edns, edns_payload) = match message.extensions().as_ref() {
        Some(edns) => (true, edns.max_payload()),
        None => (false, CLASSIC_UDP_SIZE),
    };

    Ok(ParsedRequest {
        message,
        qname,
        query_class,
        record_type,
        has_edns,
        edns_payload,
    })
}

/// Start a response: echoes id, opcode, question and EDNS presence, sets
/// the response code. Handlers fill in the sections.
pub fn response_shell(request: &Message, rcode: Rcode) -> Message {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(request.op_code());
    response.set_response_code(to_wire_rcode(rcode));
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(true);
    for query in request.queries() {
        response.add_query(query.clone());
    }
    // DNSSEC OPT bits pass through; this server neither signs nor
    // validates.
    if let Some(request_edns) = request.extensions().as_ref() {
        let mut edns = Edns::new();
        edns.set_max_payload(EDNS_PAYLOAD_SIZE);
        edns.set_version(0);
        edns.set_dnssec_ok(request_edns.flags().dnssec_ok);
        response.set_edns(edns);
    }
    response
}

/// Build an upstream query for `qname`/`rtype`, returning its id so the
/// caller can validate the reply.
pub fn build_query(qname: &str, rtype: RecordType) -> Result<(u16, Vec<u8>), DomainError> {
    let wire_name = Name::from_utf8(qname)
        .map_err(|e| DomainError::InvalidDomainName(format!("'{}': {}", qname, e)))?;

    let mut query = Query::query(wire_name, to_wire_type(rtype));
    query.set_query_class(DNSClass::IN);

    let id = fastrand::u16(..);
    let mut message = Message::new();
    message.set_id(id);
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);

    let mut edns = Edns::new();
    edns.set_max_payload(EDNS_PAYLOAD_SIZE);
    edns.set_version(0);
    message.set_edns(edns);

    Ok((id, serialize(&message)?))
}

pub fn serialize(message: &Message) -> Result<Vec<u8>, DomainError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message
        .emit(&mut encoder)
        .map_err(|e| DomainError::InvalidDnsResponse(format!("serialization failed: {}", e)))?;
    Ok(buf)
}

/// Domain RR → wire record.
pub fn rr_to_record(rr: &Rr) -> Result<Record, DomainError> {
    let owner = Name::from_utf8(&rr.name)
        .map_err(|e| DomainError::InvalidDomainName(format!("'{}': {}", rr.name, e)))?;

    let rdata = match &rr.data {
        RrData::A(ip) => RData::A(A(*ip)),
        RrData::Aaaa(ip) => RData::AAAA(AAAA(*ip)),
        RrData::Cname(target) => RData::CNAME(CNAME(wire_name(target)?)),
        RrData::Ns(target) => RData::NS(NS(wire_name(target)?)),
        RrData::Ptr(target) => RData::PTR(PTR(wire_name(target)?)),
        RrData::Txt(text) => RData::TXT(TXT::new(vec![text.clone()])),
        RrData::Srv {
            priority,
            weight,
            port,
            target,
        } => RData::SRV(SRV::new(*priority, *weight, *port, wire_name(target)?)),
        RrData::Soa(soa) => RData::SOA(SOA::new(
            wire_name(&soa.mname)?,
            wire_name(&soa.rname)?,
            soa.serial,
            soa.refresh,
            soa.retry,
            soa.expire,
            soa.minimum,
        )),
    };

    Ok(Record::from_rdata(owner, rr.ttl, rdata))
}

/// Wire record → domain RR, for upstream answers fed back into the
/// translator. Types outside the served set are dropped.
pub fn record_to_rr(record: &Record) -> Option<Rr> {
    let owner = name::normalize(&record.name().to_utf8());
    let ttl = record.ttl();
    let data = match record.data() {
        RData::A(a) => RrData::A(a.0),
        RData::AAAA(aaaa) => RrData::Aaaa(aaaa.0),
        RData::CNAME(cname) => RrData::Cname(name::normalize(&cname.0.to_utf8())),
        RData::NS(ns) => RrData::Ns(name::normalize(&ns.0.to_utf8())),
        RData::PTR(ptr) => RrData::Ptr(name::normalize(&ptr.0.to_utf8())),
        RData::TXT(txt) => RrData::Txt(
            txt.iter()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .collect::<Vec<_>>()
                .join(""),
        ),
        RData::SRV(srv) => RrData::Srv {
            priority: srv.priority(),
            weight: srv.weight(),
            port: srv.port(),
            target: name::normalize(&srv.target().to_utf8()),
        },
        _ => return None,
    };
    Some(Rr::new(owner, ttl, data))
}

fn wire_name(value: &str) -> Result<Name, DomainError> {
    Name::from_utf8(value)
        .map_err(|e| DomainError::InvalidDomainName(format!("'{}': {}", value, e)))
}

pub fn to_wire_rcode(rcode: Rcode) -> ResponseCode {
    match rcode {
        Rcode::NoError => ResponseCode::NoError,
        Rcode::FormErr => ResponseCode::FormErr,
        Rcode::ServFail => ResponseCode::ServFail,
        Rcode::NxDomain => ResponseCode::NXDomain,
        Rcode::NotImp => ResponseCode::NotImp,
        Rcode::Refused => ResponseCode::Refused,
    }
}

pub fn from_wire_rcode(rcode: ResponseCode) -> Rcode {
    match rcode {
        ResponseCode::NoError => Rcode::NoError,
        ResponseCode::FormErr => Rcode::FormErr,
        ResponseCode::NXDomain => Rcode::NxDomain,
        ResponseCode::NotImp => Rcode::NotImp,
        ResponseCode::Refused => Rcode::Refused,
        _ => Rcode::ServFail,
    }
}

pub fn to_wire_type(rtype: RecordType) -> WireType {
    match rtype {
        RecordType::A => WireType::A,
        RecordType::AAAA => WireType::AAAA,
        RecordType::CNAME => WireType::CNAME,
        RecordType::NS => WireType::NS,
        RecordType::PTR => WireType::PTR,
        RecordType::SOA => WireType::SOA,
        RecordType::SRV => WireType::SRV,
        RecordType::TXT => WireType::TXT,
        RecordType::ANY => WireType::ANY,
    }
}
