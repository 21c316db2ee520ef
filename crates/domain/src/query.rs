use crate::RecordType;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Transport a query arrived over. Decides truncation behavior and how
/// the proxy reaches upstreams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Udp => "udp",
            Transport::Tcp => "tcp",
        }
    }
}

/// DNS class of the question. Only IN is served; everything else is
/// answered NOTIMP by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    In,
    Any,
    Other(u16),
}

impl QueryClass {
    pub fn from_u16(code: u16) -> Self {
        match code {
            1 => QueryClass::In,
            255 => QueryClass::Any,
            other => QueryClass::Other(other),
        }
    }

    pub fn to_u16(&self) -> u16 {
        match self {
            QueryClass::In => 1,
            QueryClass::Any => 255,
            QueryClass::Other(code) => *code,
        }
    }
}

/// Everything the handler chain needs to know about one query.
///
/// Immutable after construction apart from the scratch map, which carries
/// handler-local state along a single chain walk. The qname is stored
/// normalized (lowercase, trailing dot).
#[derive(Debug)]
pub struct QueryContext {
    qname: Arc<str>,
    class: QueryClass,
    record_type: RecordType,
    transport: Transport,
    client: SocketAddr,
    max_response_size: u16,
    deadline: Instant,
    cancel: CancellationToken,
    scratch: Mutex<HashMap<String, String>>,
}

impl QueryContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        qname: impl Into<Arc<str>>,
        class: QueryClass,
        record_type: RecordType,
        transport: Transport,
        client: SocketAddr,
        max_response_size: u16,
        timeout: Duration,
    ) -> Self {
        Self {
            qname: qname.into(),
            class,
            record_type,
            transport,
            client,
            max_response_size,
            deadline: Instant::now() + timeout,
            cancel: CancellationToken::new(),
            scratch: Mutex::new(HashMap::new()),
        }
    }

    pub fn qname(&self) -> &str {
        &self.qname
    }

    pub fn qname_arc(&self) -> Arc<str> {
        Arc::clone(&self.qname)
    }

    pub fn class(&self) -> QueryClass {
        self.class
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn client(&self) -> SocketAddr {
        self.client
    }

    /// Negotiated maximum response size: the EDNS0 payload size under UDP,
    /// effectively unlimited under TCP.
    pub fn max_response_size(&self) -> u16 {
        self.max_response_size
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Mark the request abandoned: client gone or deadline fired.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Time left before the request deadline, `None` once expired.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline.checked_duration_since(Instant::now())
    }

    pub fn scratch_insert(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut map) = self.scratch.lock() {
            map.insert(key.into(), value.into());
        }
    }

    pub fn scratch_get(&self, key: &str) -> Option<String> {
        self.scratch.lock().ok().and_then(|map| map.get(key).cloned())
    }
}
