//! UDP + TCP fan-out publisher with per-client backpressure isolation
//! (spec section 4.8).

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::Notify;

use crate::error::{EngineError, Result};

const CLIENT_QUEUE_CAPACITY: usize = 1024;
const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Immutable snapshot of one connected TCP client, for status reporting.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub id: u64,
    pub remote: SocketAddr,
    pub connected_at: DateTime<Utc>,
    pub dropped_count: u64,
}

/// Bounded drop-oldest queue shared between the scheduler (producer) and a
/// client's dedicated writer task (consumer).
struct ClientQueue {
    lines: Mutex<VecDeque<String>>,
    notify: Notify,
    dropped_count: AtomicU64,
}

impl ClientQueue {
    fn new() -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(CLIENT_QUEUE_CAPACITY)),
            notify: Notify::new(),
            dropped_count: AtomicU64::new(0),
        }
    }

    fn push(&self, line: String) {
        let mut q = self.lines.lock().unwrap();
        if q.len() >= CLIENT_QUEUE_CAPACITY {
            q.pop_front();
            self.dropped_count.fetch_add(1, Ordering::Relaxed);
        }
        q.push_back(line);
        drop(q);
        self.notify.notify_one();
    }

    fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    async fn pop(&self) -> String {
        loop {
            if let Some(line) = self.lines.lock().unwrap().pop_front() {
                return line;
            }
            self.notify.notified().await;
        }
    }
}

struct ClientHandle {
    info: ClientInfo,
    queue: Arc<ClientQueue>,
}

type Registry = Arc<Mutex<HashMap<u64, ClientHandle>>>;

/// Fan-out publisher: one connected UDP socket plus an optional TCP
/// listener with per-client queues (spec section 4.8).
pub struct Publisher {
    udp: Option<UdpSocket>,
    registry: Registry,
    next_client_id: AtomicU64,
    _accept_task: Option<tokio::task::JoinHandle<()>>,
}

impl Publisher {
    /// Bind the UDP destination and, if `tcp_port` is positive, start the
    /// TCP listener's accept loop as a background task.
    pub async fn bind(udp_host: &str, udp_port: u16, tcp_host: &str, tcp_port: u16) -> Result<Self> {
        let udp_dest = normalize_udp_destination(udp_host);
        let udp = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| EngineError::SocketBindFailed(format!("udp local bind: {e}")))?;
        udp.connect((udp_dest.as_str(), udp_port))
            .await
            .map_err(|e| EngineError::SocketBindFailed(format!("udp connect {udp_dest}:{udp_port}: {e}")))?;
        info!("publisher: UDP destination {udp_dest}:{udp_port}");

        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));

        let accept_task = if tcp_port > 0 {
            let listener = TcpListener::bind((tcp_host, tcp_port))
                .await
                .map_err(|e| EngineError::SocketBindFailed(format!("tcp bind {tcp_host}:{tcp_port}: {e}")))?;
            info!("publisher: TCP listening on {tcp_host}:{tcp_port}");
            let registry2 = Arc::clone(&registry);
            Some(tokio::spawn(accept_loop(listener, registry2)))
        } else {
            None
        };

        Ok(Self { udp: Some(udp), registry, next_client_id: AtomicU64::new(1), _accept_task: accept_task })
    }

    /// Send every line to the UDP destination and enqueue it on every
    /// connected TCP client's queue.
    pub async fn publish(&self, lines: &[String]) {
        if let Some(udp) = &self.udp {
            for line in lines {
                if let Err(e) = udp.send(line.as_bytes()).await {
                    warn!("publisher: UDP send failed: {e}");
                }
            }
        }

        let handles: Vec<Arc<ClientQueue>> =
            self.registry.lock().unwrap().values().map(|h| Arc::clone(&h.queue)).collect();
        for queue in handles {
            for line in lines {
                queue.push(line.clone());
            }
        }
    }

    /// Immutable snapshot of currently connected TCP clients.
    pub fn client_snapshot(&self) -> Vec<ClientInfo> {
        self.registry
            .lock()
            .unwrap()
            .values()
            .map(|h| ClientInfo { dropped_count: h.queue.dropped_count(), ..h.info.clone() })
            .collect()
    }
}

fn normalize_udp_destination(host: &str) -> String {
    if host.is_empty() || host == "0.0.0.0" {
        "127.0.0.1".to_string()
    } else {
        host.to_string()
    }
}

async fn accept_loop(listener: TcpListener, registry: Registry) {
    let next_id = AtomicU64::new(1);
    loop {
        let (socket, remote) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("publisher: TCP accept error: {e}");
                continue;
            }
        };
        let id = next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(ClientQueue::new());
        let info = ClientInfo { id, remote, connected_at: Utc::now(), dropped_count: 0 };
        registry.lock().unwrap().insert(id, ClientHandle { info, queue: Arc::clone(&queue) });
        info!("publisher: TCP client connected {remote} (id={id})");

        let registry2 = Arc::clone(&registry);
        tokio::spawn(async move {
            client_writer(socket, queue).await;
            registry2.lock().unwrap().remove(&id);
            debug!("publisher: TCP client {id} removed");
        });
    }
}

async fn client_writer(mut socket: TcpStream, queue: Arc<ClientQueue>) {
    loop {
        let line = queue.pop().await;
        let write = tokio::time::timeout(CLIENT_WRITE_TIMEOUT, socket.write_all(line.as_bytes()));
        match write.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("publisher: TCP write error, evicting client: {e}");
                return;
            }
            Err(_) => {
                warn!("publisher: TCP write timed out, evicting client");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_empty_and_zero_host_to_loopback() {
        assert_eq!(normalize_udp_destination(""), "127.0.0.1");
        assert_eq!(normalize_udp_destination("0.0.0.0"), "127.0.0.1");
        assert_eq!(normalize_udp_destination("192.168.1.5"), "192.168.1.5");
    }

    #[tokio::test]
    async fn client_queue_drops_oldest_on_overflow() {
        let q = ClientQueue::new();
        for i in 0..(CLIENT_QUEUE_CAPACITY + 10) {
            q.push(format!("{i}"));
        }
        let first = q.pop().await;
        assert_eq!(first, "10");
    }

    #[tokio::test]
    async fn publish_with_no_tcp_clients_does_not_panic() {
        let publisher = Publisher::bind("127.0.0.1", 19999, "127.0.0.1", 0).await.unwrap();
        publisher.publish(&["$GPRMC,test*00\r\n".to_string()]).await;
        assert!(publisher.client_snapshot().is_empty());
    }
}
