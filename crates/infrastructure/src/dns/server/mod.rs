//! UDP and TCP front-end. Each worker owns a REUSEPORT socket pair; every
//! inbound packet or stream becomes an independent task feeding the zone
//! router.

mod tcp;
mod udp;

pub use tcp::run_tcp_listener;
pub use udp::run_udp_worker;

use crate::dns::chain::ZoneRouter;
use crate::dns::codec;
use hickory_proto::op::Message;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use strata_dns_domain::{
    DomainError, QueryClass, QueryContext, Rcode, ServerConfig, Transport,
};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinSet;
use tracing::info;

/// Parses inbound messages, builds the request context and drives the
/// router; shared by the UDP and TCP paths.
pub struct QueryService {
    router: Arc<ZoneRouter>,
    request_timeout: Duration,
}

impl QueryService {
    pub fn new(router: Arc<ZoneRouter>, request_timeout: Duration) -> Self {
        Self {
            router,
            request_timeout,
        }
    }

    /// Handle one raw query. `None` means nothing should be written back
    /// (unreadable id, or the client is already gone).
    pub async fn handle(
        &self,
        bytes: &[u8],
        client: SocketAddr,
        transport: Transport,
    ) -> Option<Vec<u8>> {
        let parsed = match codec::parse_request(bytes) {
            Ok(parsed) => parsed,
            Err(_) => return formerr_response(bytes),
        };

        let Some(record_type) = parsed.record_type else {
            return self.status_response(&parsed.message, Rcode::NotImp);
        };
        if !matches!(parsed.query_class, QueryClass::In | QueryClass::Any) {
            return self.status_response(&parsed.message, Rcode::NotImp);
        }

        let max_response_size = match transport {
            Transport::Udp => parsed.edns_payload.max(codec::CLASSIC_UDP_SIZE),
            Transport::Tcp => u16::MAX,
        };

        let ctx = QueryContext::new(
            parsed.qname.clone(),
            parsed.query_class,
            record_type,
            transport,
            client,
            max_response_size,
            self.request_timeout,
        );

        match tokio::time::timeout(
            self.request_timeout,
            self.router.route(&ctx, &parsed.message),
        )
        .await
        {
            Ok(response) => codec::serialize(&response).ok(),
            Err(_elapsed) => {
                ctx.cancel();
                self.router.metrics().record_response(Rcode::ServFail);
                self.status_response(&parsed.message, Rcode::ServFail)
            }
        }
    }

    fn status_response(&self, request: &Message, rcode: Rcode) -> Option<Vec<u8>> {
        codec::serialize(&codec::response_shell(request, rcode)).ok()
    }
}

/// Raw FORMERR for queries hickory refuses to parse: echo the id when the
/// packet carries one, drop it otherwise.
fn formerr_response(bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.len() < 2 {
        return None;
    }
    let mut header = vec![0u8; 12];
    header[0] = bytes[0];
    header[1] = bytes[1];
    header[2] = 0x80; // QR=1
    header[3] = Rcode::FormErr.to_u8();
    Some(header)
}

/// Open listeners per worker and serve until shutdown.
pub async fn serve(config: &ServerConfig, router: Arc<ZoneRouter>) -> Result<(), DomainError> {
    let socket_addr: SocketAddr = format!("{}:{}", config.bind_address, config.dns_port)
        .parse()
        .map_err(|e| DomainError::ConfigError(format!("invalid listen address: {}", e)))?;
    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let num_workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let service = Arc::new(QueryService::new(
        router,
        Duration::from_millis(config.request_timeout_ms),
    ));
    let idle_timeout = Duration::from_secs(config.tcp_idle_timeout_secs);

    info!(bind_address = %socket_addr, num_workers, "Starting DNS server with SO_REUSEPORT");

    let mut join_set: JoinSet<()> = JoinSet::new();
    for worker_id in 0..num_workers {
        let udp_socket = Arc::new(create_udp_socket(domain, socket_addr)?);
        let udp_service = Arc::clone(&service);
        join_set.spawn(async move {
            run_udp_worker(udp_socket, udp_service, worker_id).await;
        });

        let tcp_listener = create_tcp_listener(domain, socket_addr)?;
        let tcp_service = Arc::clone(&service);
        join_set.spawn(async move {
            run_tcp_listener(tcp_listener, tcp_service, idle_timeout).await;
        });
    }

    info!("DNS server ready on {}", socket_addr);
    while join_set.join_next().await.is_some() {}
    Ok(())
}

fn create_udp_socket(domain: Domain, socket_addr: SocketAddr) -> Result<UdpSocket, DomainError> {
    let build = || -> std::io::Result<UdpSocket> {
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        if socket_addr.is_ipv6() {
            socket.set_only_v6(false)?;
        }
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.set_recv_buffer_size(8 * 1024 * 1024)?;
        socket.set_send_buffer_size(4 * 1024 * 1024)?;
        socket.bind(&socket_addr.into())?;
        socket.set_nonblocking(true)?;
        let std_socket: std::net::UdpSocket = socket.into();
        UdpSocket::from_std(std_socket)
    };
    build().map_err(|e| DomainError::IoError(format!("UDP listener on {}: {}", socket_addr, e)))
}

fn create_tcp_listener(
    domain: Domain,
    socket_addr: SocketAddr,
) -> Result<TcpListener, DomainError> {
    let build = || -> std::io::Result<TcpListener> {
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        if socket_addr.is_ipv6() {
            socket.set_only_v6(false)?;
        }
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.bind(&socket_addr.into())?;
        socket.listen(1024)?;
        socket.set_nonblocking(true)?;
        let std_listener: std::net::TcpListener = socket.into();
        TcpListener::from_std(std_listener)
    };
    build().map_err(|e| DomainError::IoError(format!("TCP listener on {}: {}", socket_addr, e)))
}
