use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::models::{ConnectionId, SendMessage};

#[derive(Debug)]
struct ConnCtx {
    sender: UnboundedSender<String>,
    rooms: HashSet<String>,
}

/// Live connections, their outbound queues, and the rooms each one joined.
///
/// Frames are serialized once and pushed to unbounded per-connection queues,
/// so sends never block and each connection sees frames in push order.
#[derive(Default)]
pub struct ConnectionRegistry {
    conns: RwLock<HashMap<ConnectionId, ConnCtx>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and hand back the receiving end of its queue.
    pub async fn register(&self, conn_id: &str) -> UnboundedReceiver<String> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.conns.write().await.insert(
            conn_id.to_string(),
            ConnCtx {
                sender,
                rooms: HashSet::new(),
            },
        );
        debug!("Connection {} registered", conn_id);
        receiver
    }

    /// Forget a connection and return the rooms it had joined.
    pub async fn unregister(&self, conn_id: &str) -> Vec<String> {
        match self.conns.write().await.remove(conn_id) {
            Some(ctx) => ctx.rooms.into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub async fn attach_room(&self, conn_id: &str, room_id: &str) {
        if let Some(ctx) = self.conns.write().await.get_mut(conn_id) {
            ctx.rooms.insert(room_id.to_string());
        }
    }

    pub async fn len(&self) -> usize {
        self.conns.read().await.len()
    }

    /// Deliver one event to one connection. Returns false if it is gone.
    pub async fn send_to(&self, conn_id: &str, msg: &SendMessage) -> bool {
        let frame = match msg.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode frame for {}: {}", conn_id, e);
                return false;
            }
        };

        let conns = self.conns.read().await;
        match conns.get(conn_id) {
            Some(ctx) => ctx.sender.send(frame).is_ok(),
            None => false,
        }
    }

    /// Deliver one event to every listed connection except `except`.
    /// Returns the number of connections that accepted the frame.
    pub async fn broadcast(&self, recipients: &[ConnectionId], msg: &SendMessage, except: Option<&str>) -> usize {
        let frame = match msg.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode broadcast frame: {}", e);
                return 0;
            }
        };

        let conns = self.conns.read().await;
        recipients
            .iter()
            .filter(|id| Some(id.as_str()) != except)
            .filter_map(|id| conns.get(id))
            .filter(|ctx| ctx.sender.send(frame.clone()).is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PongMessage;

    fn pong() -> SendMessage {
        SendMessage::Pong(PongMessage { date: "now".to_string() })
    }

    #[tokio::test]
    async fn test_send_to_registered_connection() {
        let registry = ConnectionRegistry::new();
        let mut rx = registry.register("a").await;

        assert!(registry.send_to("a", &pong()).await);
        assert!(!registry.send_to("b", &pong()).await);

        let frame = rx.recv().await.unwrap();
        assert!(frame.contains(r#""event":"pong""#));
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let registry = ConnectionRegistry::new();
        let mut rx_a = registry.register("a").await;
        let mut rx_b = registry.register("b").await;
        let members = vec!["a".to_string(), "b".to_string(), "gone".to_string()];

        let delivered = registry.broadcast(&members, &pong(), Some("a")).await;
        assert_eq!(delivered, 1);
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_returns_rooms() {
        let registry = ConnectionRegistry::new();
        let _rx = registry.register("a").await;
        registry.attach_room("a", "r1").await;
        registry.attach_room("a", "r2").await;
        registry.attach_room("a", "r1").await;

        let mut rooms = registry.unregister("a").await;
        rooms.sort();
        assert_eq!(rooms, vec!["r1", "r2"]);
        assert!(!registry.send_to("a", &pong()).await);
        assert!(registry.unregister("a").await.is_empty());
    }
}
