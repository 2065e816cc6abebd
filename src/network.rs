//! Connection registry and WebSocket transport for the coordinator
//!
//! Each live connection owns an unbounded outbound channel of pre-serialized
//! JSON text. A per-connection writer task drains the channel into the socket,
//! so registry operations never await and can run inside the coordinator's
//! critical section.

use crate::coordinator::Coordinator;
use crate::error::ChainError;
use crate::protocol::Message;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

/// Serialized message text shared by every recipient of a broadcast.
pub type Outbound = Arc<str>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Sending half of a live duplex channel.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: UnboundedSender<Outbound>,
}

impl Connection {
    /// Create a connection with a fresh id and the receiver its writer drains.
    pub fn channel() -> (Self, UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    fn deliver(&self, payload: &Outbound) -> bool {
        self.tx.send(payload.clone()).is_ok()
    }
}

fn serialize(message: &Message) -> Option<Outbound> {
    match message.to_json() {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            error!("Failed to serialize {} message: {}", message.kind(), e);
            None
        }
    }
}

fn deliver_all(connections: &HashMap<ConnectionId, Connection>, payload: &Outbound) -> usize {
    let mut delivered = 0;
    for conn in connections.values() {
        if conn.deliver(payload) {
            delivered += 1;
        } else {
            // The close path unregisters dead connections.
            debug!("Dropped message for closed connection {}", conn.id);
        }
    }
    delivered
}

/// The set of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection and broadcast the new count to everyone, itself included.
    ///
    /// Returns the number of registered connections.
    pub fn register(&self, conn: Connection) -> usize {
        let mut connections = self.connections.write();
        connections.insert(conn.id, conn);
        let count = connections.len();
        if let Some(payload) = serialize(&Message::MinerCount { miner_count: count }) {
            deliver_all(&connections, &payload);
        }
        count
    }

    /// Remove a connection and broadcast the new count to those remaining.
    ///
    /// Unknown ids are ignored and trigger no broadcast.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write();
        if connections.remove(&id).is_none() {
            return false;
        }
        let count = connections.len();
        if let Some(payload) = serialize(&Message::MinerCount { miner_count: count }) {
            deliver_all(&connections, &payload);
        }
        true
    }

    /// Serialize once and hand the text to every connection, best effort.
    ///
    /// Returns how many connections accepted the message.
    pub fn broadcast(&self, message: &Message) -> usize {
        let Some(payload) = serialize(message) else {
            return 0;
        };
        deliver_all(&self.connections.read(), &payload)
    }

    /// Unicast to a single connection.
    pub fn send(&self, id: ConnectionId, message: &Message) -> bool {
        let connections = self.connections.read();
        let Some(conn) = connections.get(&id) else {
            debug!("No registered connection {}", id);
            return false;
        };
        serialize(message).is_some_and(|payload| conn.deliver(&payload))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

// ============================================================================
// WebSocket transport
// ============================================================================

/// Accept WebSocket connections until the listener fails permanently.
pub async fn serve(listener: TcpListener, coordinator: Arc<Coordinator>) -> Result<(), ChainError> {
    let local = listener.local_addr()?;
    info!("Coordinator listening for WebSocket peers on ws://{}", local);

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer_addr, coordinator).await {
                        warn!("WebSocket connection error from {}: {}", peer_addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {}", e);
            }
        }
    }
}

/// Drive one peer from handshake to close.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    coordinator: Arc<Coordinator>,
) -> Result<(), ChainError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (conn, mut outbound) = Connection::channel();
    let id = conn.id();

    let writer = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if let Err(e) = ws_sender.send(WsMessage::Text(payload.to_string())).await {
                debug!("Send to {} failed: {}", id, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    coordinator.connect(conn);
    info!(peer = %peer_addr, connection = %id, "Peer connected");

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                coordinator.handle_text(id, &text);
            }
            Ok(WsMessage::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    coordinator.handle_text(id, text);
                }
                Err(_) => warn!(connection = %id, "Ignoring non-UTF-8 binary frame"),
            },
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection = %id, "Read error: {}", e);
                break;
            }
        }
    }

    coordinator.disconnect(id);
    writer.abort();
    info!(peer = %peer_addr, connection = %id, "Peer disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(Message::parse(&text).unwrap());
        }
        out
    }

    #[test]
    fn test_register_broadcasts_count_to_everyone() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = Connection::channel();
        let (b, mut rx_b) = Connection::channel();

        assert_eq!(registry.register(a), 1);
        assert_eq!(registry.register(b), 2);

        assert_eq!(
            drain(&mut rx_a),
            vec![Message::MinerCount { miner_count: 1 }, Message::MinerCount { miner_count: 2 }]
        );
        assert_eq!(drain(&mut rx_b), vec![Message::MinerCount { miner_count: 2 }]);
    }

    #[test]
    fn test_three_connected_one_leaves() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = Connection::channel();
        let (b, mut rx_b) = Connection::channel();
        let (c, mut rx_c) = Connection::channel();
        let leaving = c.id();
        registry.register(a);
        registry.register(b);
        registry.register(c);
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        assert!(registry.unregister(leaving));

        assert_eq!(drain(&mut rx_a), vec![Message::MinerCount { miner_count: 2 }]);
        assert_eq!(drain(&mut rx_b), vec![Message::MinerCount { miner_count: 2 }]);
        assert!(drain(&mut rx_c).is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_count_tracks_membership_across_churn() {
        let registry = ConnectionRegistry::new();
        let (observer, mut rx) = Connection::channel();
        registry.register(observer);

        let mut ids = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (conn, rx) = Connection::channel();
            ids.push(conn.id());
            receivers.push(rx);
            registry.register(conn);
        }
        registry.unregister(ids[1]);
        registry.unregister(ids[3]);
        assert!(!registry.unregister(ids[3]));

        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last, Message::MinerCount { miner_count: registry.len() });
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_unregister_unknown_is_silent() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = Connection::channel();
        let (stranger, _rx) = Connection::channel();
        registry.register(a);
        drain(&mut rx_a);

        assert!(!registry.unregister(stranger.id()));
        assert!(drain(&mut rx_a).is_empty());
    }

    #[test]
    fn test_broadcast_survives_dead_connection() {
        let registry = ConnectionRegistry::new();
        let (alive, mut rx_alive) = Connection::channel();
        let (dead, rx_dead) = Connection::channel();
        let dead_id = dead.id();
        registry.register(alive);
        registry.register(dead);
        drop(rx_dead);
        drain(&mut rx_alive);

        let msg = Message::NewTransaction {
            transaction: Transaction::new("alice", "bob", 1.0),
        };
        assert_eq!(registry.broadcast(&msg), 1);
        assert_eq!(drain(&mut rx_alive), vec![msg]);

        // The broadcaster leaves cleanup to the close path.
        assert!(registry.contains(dead_id));
    }

    #[test]
    fn test_send_is_unicast() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = Connection::channel();
        let (b, mut rx_b) = Connection::channel();
        let a_id = a.id();
        registry.register(a);
        registry.register(b);
        drain(&mut rx_a);
        drain(&mut rx_b);

        let msg = Message::Blockchain { blockchain: vec![] };
        assert!(registry.send(a_id, &msg));
        assert_eq!(drain(&mut rx_a), vec![msg]);
        assert!(drain(&mut rx_b).is_empty());
    }
}
