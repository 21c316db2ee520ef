use super::QueryService;
use crate::dns::proxy::{read_framed, write_framed};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use strata_dns_domain::Transport;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error};

pub async fn run_tcp_listener(
    listener: TcpListener,
    service: Arc<QueryService>,
    idle_timeout: Duration,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "TCP accept error");
                continue;
            }
        };
        let conn_service = Arc::clone(&service);
        tokio::spawn(async move {
            handle_connection(stream, peer, conn_service, idle_timeout).await;
        });
    }
}

/// One pipelined connection. Queries are served strictly in arrival
/// order, which keeps responses in order on the stream as RFC 7766
/// requires of this server.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    service: Arc<QueryService>,
    idle_timeout: Duration,
) {
    loop {
        let query = match tokio::time::timeout(idle_timeout, read_framed(&mut stream)).await {
            Err(_) => {
                debug!(peer = %peer, "TCP connection idle, closing");
                return;
            }
            Ok(Err(_)) => return, // peer closed or sent garbage framing
            Ok(Ok(query)) => query,
        };

        match service.handle(&query, peer, Transport::Tcp).await {
            Some(response) => {
                if write_framed(&mut stream, &response).await.is_err() {
                    return;
                }
            }
            None => return,
        }
    }
}
