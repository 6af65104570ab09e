use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup};
use url::Url;

use crate::outbound::Markup;
use crate::texts;

/// Reply markups, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Keyboards {
    main: KeyboardMarkup,
    channel_link: InlineKeyboardMarkup,
}

impl Keyboards {
    /// # Arguments
    /// * `channel` - channel username, with or without the leading `@`
    pub fn new(channel: &str) -> Result<Self, url::ParseError> {
        let main = KeyboardMarkup::new(vec![
            vec![
                KeyboardButton::new(texts::BUTTON_REGISTER),
                KeyboardButton::new(texts::BUTTON_ENTER),
            ],
            vec![
                KeyboardButton::new(texts::BUTTON_STATUS_ON),
                KeyboardButton::new(texts::BUTTON_STATUS_OFF),
            ],
        ])
        .resize_keyboard();

        let channel_url = channel_url(channel)?;
        let channel_link =
            InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(texts::BUTTON_CHANNEL, channel_url)]]);

        Ok(Self { main, channel_link })
    }

    pub fn markup(&self, markup: Markup) -> Option<ReplyMarkup> {
        match markup {
            Markup::None => None,
            Markup::MainKeyboard => Some(ReplyMarkup::Keyboard(self.main.clone())),
            Markup::ChannelLink => Some(ReplyMarkup::InlineKeyboard(self.channel_link.clone())),
        }
    }
}

/// Public link to the channel.
pub fn channel_url(channel: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("https://t.me/{}", channel.trim_start_matches('@')))
}
