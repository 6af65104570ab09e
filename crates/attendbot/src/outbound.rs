//! Outbound message capability.

use async_trait::async_trait;
use teloxide::types::ChatId;

/// Keyboard or button attached to a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Markup {
    #[default]
    None,
    /// Reply keyboard with the start and status buttons
    MainKeyboard,
    /// Inline button linking to the channel
    ChannelLink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub markup: Markup,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: Markup::MainKeyboard,
        }
    }

    pub fn channel_link(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: Markup::ChannelLink,
        }
    }
}

/// Fire-and-forget delivery. Implementations log failures and never retry.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send(&self, chat_id: ChatId, reply: Reply);
}
