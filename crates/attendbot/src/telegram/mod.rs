//! Telegram integration: bot setup, markups, outbound sends and the update schema

pub mod bot;
pub mod keyboards;
pub mod outbound;
pub mod schema;

pub use bot::{create_bot, setup_bot_commands};
pub use keyboards::Keyboards;
pub use outbound::TelegramOutbound;
pub use schema::{schema, HandlerError};
