//! Bot instance creation and command registration

use secrecy::ExposeSecret;
use teloxide::prelude::*;
use teloxide::types::BotCommand;

use attendcore::Settings;

/// Creates a Bot instance pointed at the configured API URL
pub fn create_bot(settings: &Settings) -> Bot {
    if settings.bot_api_url.host_str() != Some("api.telegram.org") {
        log::info!("Using custom Bot API URL: {}", settings.bot_api_url);
    }
    Bot::new(settings.bot_token.expose_secret()).set_api_url(settings.bot_api_url.clone())
}

/// Sets up bot commands in Telegram UI
///
/// # Arguments
/// * `bot` - Bot instance to configure
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "показывает главное меню"),
        BotCommand::new("register", "регистрация студента"),
        BotCommand::new("enter", "вход и отметка на паре"),
    ])
    .await?;
    Ok(())
}
