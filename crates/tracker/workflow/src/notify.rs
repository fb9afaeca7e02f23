//! Notification outlet for post-functions.
//!
//! Dispatch is an enqueue, never a delivery: the executor does not wait on
//! mail servers or webhook endpoints. Whatever drains the outbox owns
//! delivery and retries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracker_types::{IssueId, TransitionId, UserId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A named event for a set of users (mail, in-app).
    Event {
        event: String,
        issue_id: IssueId,
        issue_key: String,
        transition_id: TransitionId,
        actor: UserId,
        recipients: Vec<UserId>,
    },
    /// An outbound HTTP call to an external system.
    Webhook { url: String, payload: Value },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("notification outbox is full")]
    OutboxFull,

    #[error("notification outbox is closed")]
    Closed,
}

pub trait NotificationDispatcher: Send + Sync {
    /// Enqueue without waiting for delivery.
    fn dispatch(&self, notification: Notification) -> Result<(), DispatchError>;
}

/// Bounded in-process outbox. The receiving half goes to whatever delivers
/// notifications.
#[derive(Clone)]
pub struct OutboxDispatcher {
    sender: mpsc::Sender<Notification>,
}

impl OutboxDispatcher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl NotificationDispatcher for OutboxDispatcher {
    fn dispatch(&self, notification: Notification) -> Result<(), DispatchError> {
        match self.sender.try_send(notification) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("notification outbox full, dropping notification");
                Err(DispatchError::OutboxFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DispatchError::Closed),
        }
    }
}
