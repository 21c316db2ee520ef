//! Raw DNS exchanges against one upstream endpoint. UDP sends the
//! message as-is; TCP frames it with the RFC 1035 two-byte length prefix.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use strata_dns_domain::{DomainError, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, warn};

/// Responses above this are invalid regardless of transport.
const MAX_TCP_MESSAGE_SIZE: usize = 65535;

/// Largest UDP response we accept (EDNS payload ceiling).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Transport seam of the proxy; the tests drive the retry machinery
/// through a scripted implementation of this trait.
#[async_trait]
pub trait Exchanger: Send + Sync {
    async fn exchange(
        &self,
        server: SocketAddr,
        payload: &[u8],
        timeout: Duration,
        transport: Transport,
    ) -> Result<Vec<u8>, DomainError>;
}

/// The real network exchanger.
pub struct NetExchanger;

#[async_trait]
impl Exchanger for NetExchanger {
    async fn exchange(
        &self,
        server: SocketAddr,
        payload: &[u8],
        timeout: Duration,
        transport: Transport,
    ) -> Result<Vec<u8>, DomainError> {
        match transport {
            Transport::Udp => exchange_udp(server, payload, timeout).await,
            Transport::Tcp => exchange_tcp(server, payload, timeout).await,
        }
    }
}

async fn exchange_udp(
    server: SocketAddr,
    payload: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, DomainError> {
    let bind_addr: SocketAddr = if server.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| DomainError::IoError(format!("UDP bind failed: {}", e)))?;

    tokio::time::timeout(timeout, socket.send_to(payload, server))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: server.to_string(),
        })?
        .map_err(|e| io_to_transport(server, e))?;

    let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
    let (received, from) = tokio::time::timeout(timeout, socket.recv_from(&mut recv_buf))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: server.to_string(),
        })?
        .map_err(|e| io_to_transport(server, e))?;

    if from.ip() != server.ip() {
        warn!(expected = %server, received_from = %from, "UDP response from unexpected source");
    }

    recv_buf.truncate(received);
    debug!(server = %server, bytes = received, "UDP exchange complete");
    Ok(recv_buf)
}

async fn exchange_tcp(
    server: SocketAddr,
    payload: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, DomainError> {
    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(server))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: server.to_string(),
        })?
        .map_err(|e| io_to_transport(server, e))?;

    tokio::time::timeout(timeout, write_framed(&mut stream, payload))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: server.to_string(),
        })?
        .map_err(|e| io_to_transport(server, e))?;

    let response = tokio::time::timeout(timeout, read_framed(&mut stream))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: server.to_string(),
        })??;

    debug!(server = %server, bytes = response.len(), "TCP exchange complete");
    Ok(response)
}

pub(crate) async fn write_framed<S>(stream: &mut S, payload: &[u8]) -> std::io::Result<()>
where
    S: AsyncWriteExt + Unpin,
{
    let length = (payload.len() as u16).to_be_bytes();
    stream.write_all(&length).await?;
    stream.write_all(payload).await?;
    stream.flush().await
}

pub(crate) async fn read_framed<S>(stream: &mut S) -> Result<Vec<u8>, DomainError>
where
    S: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| DomainError::IoError(format!("framed read failed: {}", e)))?;

    let response_len = u16::from_be_bytes(len_buf) as usize;
    if response_len > MAX_TCP_MESSAGE_SIZE {
        return Err(DomainError::InvalidDnsResponse(format!(
            "TCP response too large: {} bytes",
            response_len
        )));
    }

    let mut response = vec![0u8; response_len];
    stream
        .read_exact(&mut response)
        .await
        .map_err(|e| DomainError::IoError(format!("framed read failed: {}", e)))?;
    Ok(response)
}

fn io_to_transport(server: SocketAddr, err: std::io::Error) -> DomainError {
    match err.kind() {
        ErrorKind::ConnectionRefused => DomainError::TransportConnectionRefused {
            server: server.to_string(),
        },
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            DomainError::TransportConnectionReset {
                server: server.to_string(),
            }
        }
        ErrorKind::TimedOut => DomainError::TransportTimeout {
            server: server.to_string(),
        },
        _ => DomainError::IoError(format!("{}: {}", server, err)),
    }
}
