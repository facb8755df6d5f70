//! Live stream fan-out to connected clients.

use std::collections::HashMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use kestrel_types::Account;
use tokio::sync::broadcast;

use crate::collab::StreamPusher;
use crate::convert::{ApiConversation, ApiNotification, ApiStatus};

/// Which timeline stream an update belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamKey {
    Home,
    List(String),
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("home"),
            Self::List(id) => write!(f, "list:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Update { stream: String, status: ApiStatus },
    StatusUpdate { stream: String, status: ApiStatus },
    Notification(ApiNotification),
    Delete(String),
    Conversation(ApiConversation),
}

const CHANNEL_CAPACITY: usize = 256;

/// Per-account broadcast channels.
///
/// Pushing to an account without subscribers does nothing. Channels whose
/// receivers are all gone are dropped on the next push to them.
#[derive(Default)]
pub struct StreamHub {
    channels: RwLock<HashMap<String, broadcast::Sender<StreamEvent>>>,
}

impl StreamHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, account_id: &str) -> broadcast::Receiver<StreamEvent> {
        let mut channels = self.write();
        channels
            .entry(account_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Accounts with at least one open subscription.
    pub fn connected_accounts(&self) -> usize {
        self.read()
            .values()
            .filter(|tx| tx.receiver_count() > 0)
            .count()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, broadcast::Sender<StreamEvent>>> {
        match self.channels.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("stream hub lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, broadcast::Sender<StreamEvent>>> {
        match self.channels.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("stream hub lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn send(&self, account_id: &str, event: StreamEvent) {
        let closed = match self.read().get(account_id) {
            Some(tx) => tx.send(event).is_err(),
            None => return,
        };
        if closed {
            let mut channels = self.write();
            if channels
                .get(account_id)
                .is_some_and(|tx| tx.receiver_count() == 0)
            {
                channels.remove(account_id);
                tracing::debug!(account_id, "pruned closed stream");
            }
        }
    }
}

impl StreamPusher for StreamHub {
    fn update(&self, account: &Account, status: ApiStatus, stream: &StreamKey) {
        self.send(
            &account.id,
            StreamEvent::Update {
                stream: stream.to_string(),
                status,
            },
        );
    }

    fn status_update(&self, account: &Account, status: ApiStatus, stream: &StreamKey) {
        self.send(
            &account.id,
            StreamEvent::StatusUpdate {
                stream: stream.to_string(),
                status,
            },
        );
    }

    fn notify(&self, account: &Account, notification: ApiNotification) {
        self.send(&account.id, StreamEvent::Notification(notification));
    }

    fn delete(&self, status_id: &str) {
        let account_ids: Vec<String> = self.read().keys().cloned().collect();
        for account_id in account_ids {
            self.send(&account_id, StreamEvent::Delete(status_id.to_string()));
        }
    }

    fn conversation(&self, account: &Account, conversation: ApiConversation) {
        self.send(&account.id, StreamEvent::Conversation(conversation));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            uri: format!("https://kestrel.test/users/{id}"),
            username: id.to_string(),
            domain: None,
            inbox_uri: String::new(),
            outbox_uri: String::new(),
            followers_uri: String::new(),
            locked: false,
            admin: false,
            also_known_as: Vec::new(),
            moved_to_uri: None,
            move_id: None,
            suspended_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn stream_key_labels() {
        assert_eq!(StreamKey::Home.to_string(), "home");
        assert_eq!(StreamKey::List("l1".to_string()).to_string(), "list:l1");
    }

    #[tokio::test]
    async fn delete_reaches_every_subscriber_and_prunes_closed() {
        let hub = StreamHub::new();
        let mut a = hub.subscribe("a");
        let b = hub.subscribe("b");
        drop(b);

        hub.delete("s1");
        assert_eq!(
            a.recv().await.expect("should receive event"),
            StreamEvent::Delete("s1".to_string())
        );
        assert_eq!(hub.connected_accounts(), 1);
        assert_eq!(hub.read().len(), 1, "closed channel should be pruned");
    }

    #[test]
    fn push_without_subscriber_is_a_no_op() {
        let hub = StreamHub::new();
        hub.notify(
            &account("nobody"),
            ApiNotification {
                id: "n1".to_string(),
                notification_type: "follow".to_string(),
                account_id: "x".to_string(),
                status: None,
                created_at: Utc::now(),
            },
        );
        assert_eq!(hub.connected_accounts(), 0);
    }
}
