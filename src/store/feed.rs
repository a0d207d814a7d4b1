use tokio::sync::broadcast;

use crate::chat::domain::ChatScope;

/// A committed write, published after the transaction that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Users,
    Items,
    Claims,
    Messages(ChatScope),
}

/// Process-wide fan-out of committed changes.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, change: Change) {
        // No receivers is fine: nobody is watching.
        let receivers = self.tx.send(change.clone()).unwrap_or(0);
        tracing::debug!(?change, receivers, "Published change");
    }

    pub fn watch(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    pub fn watcher_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}
