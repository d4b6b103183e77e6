use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use uuid::Uuid;

use crate::types::{Message, ServerEvent};

/// Identifies one open chat connection.
pub type ConnectionId = u64;

type Connections = HashMap<Uuid, HashMap<ConnectionId, UnboundedSender<ServerEvent>>>;

/// Registry of open chat connections, keyed by user. A user may hold
/// several connections at once (tabs, devices).
#[derive(Clone, Default)]
pub struct ChatHub {
    connections: Arc<RwLock<Connections>>,
    next_id: Arc<AtomicU64>,
}

impl ChatHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection for `user_id`. Returns its id, the receiver
    /// of events pushed to it, and whether it is the user's first.
    pub fn register(
        &self,
        user_id: Uuid,
    ) -> (ConnectionId, UnboundedReceiver<ServerEvent>, bool) {
        let (tx, rx) = unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let user_connections = connections.entry(user_id).or_default();
        let first = user_connections.is_empty();
        user_connections.insert(id, tx);

        debug!("Chat connection {} opened for {}", id, user_id);
        (id, rx, first)
    }

    /// Removes a connection. Returns true when it was the user's last.
    pub fn unregister(&self, user_id: &Uuid, connection_id: ConnectionId) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(user_connections) = connections.get_mut(user_id) else {
            return false;
        };
        user_connections.remove(&connection_id);
        debug!("Chat connection {} closed for {}", connection_id, user_id);

        if user_connections.is_empty() {
            connections.remove(user_id);
            true
        } else {
            false
        }
    }

    /// Pushes an event to every connection of one user. Returns how many
    /// connections accepted it.
    pub fn send_to_user(&self, user_id: &Uuid, event: &ServerEvent) -> usize {
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        connections
            .get(user_id)
            .map(|user_connections| {
                user_connections
                    .values()
                    .filter(|tx| tx.send(event.clone()).is_ok())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Pushes an event to every open connection.
    pub fn broadcast(&self, event: &ServerEvent) {
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        for tx in connections.values().flat_map(|c| c.values()) {
            let _ = tx.send(event.clone());
        }
    }

    /// Tells everyone who is online.
    pub fn broadcast_online_users(&self) {
        self.broadcast(&ServerEvent::OnlineUsers(self.online_users()));
    }

    /// Ids of users with at least one open connection.
    pub fn online_users(&self) -> Vec<Uuid> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Whether the user has an open connection.
    pub fn is_online(&self, user_id: &Uuid) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(user_id)
    }

    /// Fans a stored message out: `receive_message` to the receiver's
    /// connections, `message_sent` to the sender's.
    pub fn deliver(&self, message: &Message) {
        let delivered = self.send_to_user(
            &message.receiver_id,
            &ServerEvent::ReceiveMessage(message.clone()),
        );
        if delivered == 0 {
            debug!("Receiver {} not online", message.receiver_id);
        }
        self.send_to_user(
            &message.sender_id,
            &ServerEvent::MessageSent(message.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(sender: Uuid, receiver: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            receiver_id: receiver,
            text: "hello".to_string(),
            images: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_message_reaches_every_receiver_connection() {
        let hub = ChatHub::new();
        let (sender, receiver) = (Uuid::new_v4(), Uuid::new_v4());

        let (_, mut tab_one, first) = hub.register(receiver);
        let (_, mut tab_two, second_first) = hub.register(receiver);
        let (_, mut sender_rx, _) = hub.register(sender);
        assert!(first);
        assert!(!second_first);

        hub.deliver(&message(sender, receiver));

        assert!(matches!(tab_one.recv().await, Some(ServerEvent::ReceiveMessage(_))));
        assert!(matches!(tab_two.recv().await, Some(ServerEvent::ReceiveMessage(_))));
        assert!(matches!(sender_rx.recv().await, Some(ServerEvent::MessageSent(_))));
    }

    #[test]
    fn test_user_goes_offline_with_last_connection() {
        let hub = ChatHub::new();
        let user = Uuid::new_v4();

        let (first, _rx1, _) = hub.register(user);
        let (second, _rx2, _) = hub.register(user);
        assert!(hub.is_online(&user));

        assert!(!hub.unregister(&user, first));
        assert!(hub.is_online(&user));
        assert!(hub.unregister(&user, second));
        assert!(!hub.is_online(&user));
        assert!(hub.online_users().is_empty());
    }

    #[test]
    fn test_reconnect_after_last_disconnect_is_online_again() {
        let hub = ChatHub::new();
        let user = Uuid::new_v4();

        let (old, _old_rx, _) = hub.register(user);
        assert!(hub.unregister(&user, old));
        assert!(!hub.is_online(&user));

        let (new, _new_rx, first) = hub.register(user);
        assert!(first);
        assert!(hub.is_online(&user));

        assert!(!hub.unregister(&user, old));
        assert!(hub.is_online(&user));
        assert!(hub.unregister(&user, new));
    }

    #[test]
    fn test_send_to_offline_user_delivers_nothing() {
        let hub = ChatHub::new();
        let delivered = hub.send_to_user(
            &Uuid::new_v4(),
            &ServerEvent::MessageError {
                error: "x".to_string(),
            },
        );
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_broadcast_online_users() {
        let hub = ChatHub::new();
        let user = Uuid::new_v4();
        let (_, mut rx, _) = hub.register(user);

        hub.broadcast_online_users();

        match rx.recv().await {
            Some(ServerEvent::OnlineUsers(users)) => assert_eq!(users, vec![user]),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
