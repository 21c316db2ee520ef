//! Final DNS message assembly: section layout, AA flag, negative
//! answers, and UDP size fitting.

use crate::dns::codec;
use hickory_proto::op::Message;
use std::collections::HashSet;
use strata_dns_application::use_cases::Resolution;
use strata_dns_domain::{QueryContext, Rcode, Rr, Transport};
use tracing::warn;

pub struct ReplyBuilder<'a> {
    request: &'a Message,
    ctx: &'a QueryContext,
    authoritative: bool,
}

impl<'a> ReplyBuilder<'a> {
    pub fn new(request: &'a Message, ctx: &'a QueryContext, authoritative: bool) -> Self {
        Self {
            request,
            ctx,
            authoritative,
        }
    }

    /// A positive answer. `authority` carries the zone NS set shown for
    /// non-apex answers; it is the first section sacrificed to size.
    pub fn positive(&self, resolution: &Resolution, authority: &[Rr]) -> Message {
        let answers = dedup(&resolution.answers);
        let additionals = dedup(&resolution.additionals);
        self.fit(Rcode::NoError, &answers, authority, &additionals)
    }

    /// NXDOMAIN or NODATA: empty answer section, zone SOA in authority.
    pub fn negative(&self, rcode: Rcode, soa: &Rr) -> Message {
        self.fit(rcode, &[], std::slice::from_ref(soa), &[])
    }

    /// Bare status response: SERVFAIL, REFUSED, NOTIMP.
    pub fn error(&self, rcode: Rcode) -> Message {
        self.assemble(rcode, &[], &[], &[])
    }

    fn assemble(
        &self,
        rcode: Rcode,
        answers: &[Rr],
        authority: &[Rr],
        additionals: &[Rr],
    ) -> Message {
        let mut message = codec::response_shell(self.request, rcode);
        message.set_authoritative(self.authoritative);
        for rr in answers {
            match codec::rr_to_record(rr) {
                Ok(record) => {
                    message.add_answer(record);
                }
                Err(err) => warn!(name = %rr.name, error = %err, "Dropping unencodable answer"),
            }
        }
        for rr in authority {
            match codec::rr_to_record(rr) {
                Ok(record) => {
                    message.add_name_server(record);
                }
                Err(err) => warn!(name = %rr.name, error = %err, "Dropping unencodable authority"),
            }
        }
        for rr in additionals {
            match codec::rr_to_record(rr) {
                Ok(record) => {
                    message.add_additional(record);
                }
                Err(err) => warn!(name = %rr.name, error = %err, "Dropping unencodable glue"),
            }
        }
        message
    }

    /// Shrink the message into the negotiated UDP size: drop ADDITIONAL,
    /// then AUTHORITY, and only then set TC. TCP responses never truncate.
    fn fit(
        &self,
        rcode: Rcode,
        answers: &[Rr],
        authority: &[Rr],
        additionals: &[Rr],
    ) -> Message {
        let full = self.assemble(rcode, answers, authority, additionals);
        if self.ctx.transport() == Transport::Tcp {
            return full;
        }

        let limit = usize::from(self.ctx.max_response_size());
        if encoded_len(&full) <= limit {
            return full;
        }

        let without_glue = self.assemble(rcode, answers, authority, &[]);
        if encoded_len(&without_glue) <= limit {
            return without_glue;
        }

        let answers_only = self.assemble(rcode, answers, &[], &[]);
        if encoded_len(&answers_only) <= limit {
            return answers_only;
        }

        let mut truncated = answers_only;
        truncated.set_truncated(true);
        truncated
    }
}

/// Drop RRs equal on (name, type, rdata); TTL differences do not make two
/// records distinct.
fn dedup(rrs: &[Rr]) -> Vec<Rr> {
    let mut seen = HashSet::new();
    rrs.iter()
        .filter(|rr| {
            let (name, rtype, data) = rr.dedup_identity();
            seen.insert((name.to_string(), rtype, data.clone()))
        })
        .cloned()
        .collect()
}

fn encoded_len(message: &Message) -> usize {
    codec::serialize(message).map(|b| b.len()).unwrap_or(usize::MAX)
}
