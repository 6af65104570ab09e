use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;

use super::keyboards::Keyboards;
use crate::outbound::{Outbound, Reply};

/// Sends replies through the Bot API.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
    keyboards: Arc<Keyboards>,
}

impl TelegramOutbound {
    pub fn new(bot: Bot, keyboards: Arc<Keyboards>) -> Self {
        Self { bot, keyboards }
    }
}

#[async_trait]
impl Outbound for TelegramOutbound {
    async fn send(&self, chat_id: ChatId, reply: Reply) {
        let request = self.bot.send_message(chat_id, reply.text);
        let result = match self.keyboards.markup(reply.markup) {
            Some(markup) => request.reply_markup(markup).await,
            None => request.await,
        };

        if let Err(e) = result {
            log::error!("Failed to send message to chat {}: {}", chat_id.0, e);
        }
    }
}
