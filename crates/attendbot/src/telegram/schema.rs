//! Dispatcher schema: turns Telegram updates into engine events.

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;
use tokio::sync::mpsc;

use crate::event::InboundEvent;
use crate::outbound::{Outbound, Reply};
use crate::texts;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Creates the handler tree for teloxide's Dispatcher.
///
/// # Arguments
/// * `events` - sending half of the engine's inbound event channel
/// * `outbound` - used directly for the `/start` greeting
pub fn schema(events: mpsc::Sender<InboundEvent>, outbound: Arc<dyn Outbound>) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(start_handler(outbound))
        .branch(forward_handler(events))
}

/// `/start` shows the keyboard; it does not open a conversation
fn start_handler(outbound: Arc<dyn Outbound>) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some_and(is_start_command))
        .endpoint(move |msg: Message| {
            let outbound = outbound.clone();
            async move {
                outbound.send(msg.chat.id, Reply::new(texts::GREETING)).await;
                Ok(())
            }
        })
}

/// Every other text message goes to the engine
fn forward_handler(events: mpsc::Sender<InboundEvent>) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_map(|msg: Message| InboundEvent::from_message(&msg))
        .endpoint(move |event: InboundEvent| {
            let events = events.clone();
            async move {
                let chat_id = event.identity.chat_id;
                if events.send(event).await.is_err() {
                    log::warn!("Conversation engine stopped, message from chat {} dropped", chat_id.0);
                }
                Ok(())
            }
        })
}

fn is_start_command(text: &str) -> bool {
    let first = text.split_whitespace().next().unwrap_or_default();
    first == "/start" || first.starts_with("/start@")
}
