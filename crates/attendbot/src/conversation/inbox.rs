//! Per-chat mailbox between the dispatcher and one conversation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::error::ConversationError;

/// Dispatcher side.
#[derive(Debug)]
pub struct Mailbox {
    tx: mpsc::Sender<String>,
    awaiting: Arc<AtomicBool>,
}

/// Outcome of handing an event to a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The conversation is busy (verifying, sending); event dropped
    NotAwaiting,
    /// Mailbox full; event dropped
    Full,
    /// Conversation is gone
    Closed,
}

impl Mailbox {
    pub fn is_awaiting(&self) -> bool {
        self.awaiting.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Hands `text` over without waiting.
    pub fn offer(&self, text: String) -> Delivery {
        if self.tx.is_closed() {
            return Delivery::Closed;
        }
        if !self.is_awaiting() {
            return Delivery::NotAwaiting;
        }
        match self.tx.try_send(text) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Conversation side.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::Receiver<String>,
    awaiting: Arc<AtomicBool>,
}

impl Inbox {
    /// Marks whether the conversation currently accepts input.
    pub fn set_awaiting(&self, value: bool) {
        self.awaiting.store(value, Ordering::Release);
    }

    /// Waits up to `deadline` for the next answer.
    ///
    /// Input stops being accepted once this returns.
    pub async fn next(&mut self, deadline: Duration) -> Result<String, ConversationError> {
        let result = tokio::time::timeout(deadline, self.rx.recv()).await;
        self.set_awaiting(false);
        match result {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(ConversationError::Cancelled),
            Err(_) => Err(ConversationError::Timeout),
        }
    }
}

/// Creates a connected mailbox/inbox pair.
pub fn channel(capacity: usize) -> (Mailbox, Inbox) {
    let (tx, rx) = mpsc::channel(capacity);
    let awaiting = Arc::new(AtomicBool::new(false));
    (
        Mailbox {
            tx,
            awaiting: awaiting.clone(),
        },
        Inbox { rx, awaiting },
    )
}
