use teloxide::types::{ChatId, Message, UserId};

/// The `(chat, user)` pair a conversation is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Where replies go
    pub chat_id: ChatId,
    /// Stable principal, used for the membership check
    pub user_id: UserId,
}

/// One inbound text message, stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub identity: Identity,
    pub display_name: String,
    pub text: String,
}

impl InboundEvent {
    pub fn new(identity: Identity, display_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
            text: text.into(),
        }
    }

    /// Builds an event from a Telegram message.
    ///
    /// Returns `None` for messages without text or without a sender
    /// (channel posts).
    pub fn from_message(msg: &Message) -> Option<Self> {
        let text = msg.text()?;
        let user = msg.from.as_ref()?;
        let display_name = user
            .username
            .as_ref()
            .map(|username| format!("@{}", username))
            .unwrap_or_else(|| user.full_name());

        Some(Self::new(
            Identity {
                chat_id: msg.chat.id,
                user_id: user.id,
            },
            display_name,
            text,
        ))
    }
}
