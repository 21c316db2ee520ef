use super::QueryService;
use std::sync::Arc;
use strata_dns_domain::Transport;
use tokio::net::UdpSocket;
use tracing::error;

/// Per-worker UDP receive loop. Every datagram is served on its own task
/// so a slow backend never blocks the socket; responses carry no ordering
/// guarantee, matching the transport.
pub async fn run_udp_worker(socket: Arc<UdpSocket>, service: Arc<QueryService>, worker_id: usize) {
    let mut recv_buf = [0u8; 4096];

    loop {
        let (n, from) = match socket.recv_from(&mut recv_buf).await {
            Ok(received) => received,
            Err(e) => {
                error!(worker = worker_id, error = %e, "UDP recv error");
                continue;
            }
        };

        let query = recv_buf[..n].to_vec();
        let task_service = Arc::clone(&service);
        let task_socket = Arc::clone(&socket);
        tokio::spawn(async move {
            if let Some(response) = task_service.handle(&query, from, Transport::Udp).await {
                let _ = task_socket.send_to(&response, from).await;
            }
        });
    }
}
