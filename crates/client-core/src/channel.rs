use thiserror::Error;
use tokio::sync::broadcast;

use crate::types::TransportStatus;

/// Receiving end of a transport's status signals, consumed by the supervisor.
pub type StatusStream = broadcast::Receiver<TransportStatus>;

/// Errors returned by status feed operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Nobody is subscribed to the feed.
    #[error("status feed has no subscribers")]
    NoSubscribers,
    /// The supervisor already owns a live subscription.
    #[error("a status subscription is already active")]
    AlreadyAttached,
}

/// Transport-side publisher of status signals.
///
/// Delivery is push-only and in order per subscriber; slow subscribers lag rather than
/// applying backpressure to the transport.
#[derive(Clone, Debug)]
pub struct StatusFeed {
    status_tx: broadcast::Sender<TransportStatus>,
}

impl StatusFeed {
    /// Create a feed retaining up to `buffer` unread signals per subscriber.
    pub fn new(buffer: usize) -> Self {
        let (status_tx, _) = broadcast::channel(buffer.max(1));
        Self { status_tx }
    }

    /// Open a new receiver for subsequent signals.
    pub fn subscribe(&self) -> StatusStream {
        self.status_tx.subscribe()
    }

    /// Number of live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.status_tx.receiver_count()
    }

    /// Publish one status signal to every subscriber.
    pub fn publish(&self, status: TransportStatus) -> Result<(), FeedError> {
        self.status_tx
            .send(status)
            .map(|_| ())
            .map_err(|_| FeedError::NoSubscribers)
    }
}

impl Default for StatusFeed {
    fn default() -> Self {
        Self::new(64)
    }
}
