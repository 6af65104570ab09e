use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use attendbot::admin;
use attendbot::cli::{Cli, Commands};
use attendbot::telegram::{create_bot, schema, setup_bot_commands, Keyboards, TelegramOutbound};
use attendbot::{ConversationSettings, Dispatcher, EngineDeps, Outbound, SessionRegistry};
use attendcore::config::{self, dispatcher::EVENT_BUFFER};
use attendcore::logging::{init_logger, log_startup_configuration};
use attendcore::{open_store, Argon2Hasher, CredentialHasher, Settings, SubscriptionVerifier, TelegramMembershipVerifier};

/// Main entry point for the attendance bot
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration, store).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    // Parse first so `--help` and usage errors leave the log file alone
    let cli = Cli::parse_args();

    // Initialize logger (console + file, appending)
    init_logger(&config::LOG_FILE_PATH, &config::LOG_LEVEL)?;

    let settings = Settings::from_env()?;

    match cli.command {
        Some(Commands::Run) | None => run_bot(settings).await,
        Some(Commands::AddGroup { name, relevant }) => {
            let store = open_store(&settings.store, settings.group_policy)?;
            println!("{}", admin::add_group(store.as_ref(), &name, relevant).await?);
            Ok(())
        }
        Some(Commands::Groups) => {
            let store = open_store(&settings.store, settings.group_policy)?;
            println!("{}", admin::list_groups(store.as_ref()).await?.trim_end());
            Ok(())
        }
    }
}

/// Runs the bot until Ctrl-C, then cancels open conversations.
async fn run_bot(settings: Settings) -> Result<()> {
    settings.validate_for_bot()?;
    log_startup_configuration(&settings);

    let store = open_store(&settings.store, settings.group_policy)?;
    let verifier: Arc<dyn SubscriptionVerifier> = Arc::new(TelegramMembershipVerifier::from_settings(&settings)?);
    let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new());

    let bot = create_bot(&settings);
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let keyboards = Arc::new(Keyboards::new(&settings.channel)?);
    let outbound: Arc<dyn Outbound> = Arc::new(TelegramOutbound::new(bot.clone(), keyboards));

    let deps = EngineDeps::new(
        store,
        verifier,
        hasher,
        outbound.clone(),
        Arc::new(SessionRegistry::new()),
        ConversationSettings::from_settings(&settings),
    );

    let shutdown = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let engine = tokio::spawn(
        Dispatcher::new(deps, shutdown.clone())
            .with_drain_grace(settings.shutdown_grace)
            .run(events_rx),
    );

    log::info!("Starting long polling");
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();
    teloxide::dispatching::Dispatcher::builder(bot, schema(events_tx, outbound))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Update listener stopped, shutting down conversations");
    shutdown.cancel();
    if let Err(e) = engine.await {
        log::error!("Conversation dispatcher task failed: {}", e);
    }

    log::info!("Shutdown complete");
    Ok(())
}
