//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup banner describing the effective configuration

use anyhow::Result;
use simplelog::*;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::str::FromStr;

use crate::config::Settings;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `level` - Level name (`error`..`trace`); unknown names fall back to `info`
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to open the file or a logger is already set
pub fn init_logger(log_file_path: &str, level: &str) -> Result<()> {
    let log_file = open_log_file(log_file_path).map_err(|e| anyhow::anyhow!("Failed to open log file: {}", e))?;
    let level = parse_level(level);

    // HTTP stack internals are noise at info level
    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .add_filter_ignore_str("rustls")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(level, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Opens the log file for appending; earlier runs' lines are kept.
fn open_log_file(path: impl AsRef<Path>) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::Info)
}

/// Logs the effective configuration at application startup.
///
/// The bot token is never printed.
pub fn log_startup_configuration(settings: &Settings) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Store:            {}", settings.store);
    log::info!("Group policy:     {}", settings.group_policy);
    log::info!("Input mode:       {}", settings.input_mode);
    log::info!("Channel:          @{}", settings.channel);
    log::info!("Bot API:          {}", settings.bot_api_url);
    log::info!("Step timeout:     {}s", settings.step_timeout.as_secs());
    log::info!("Verify timeout:   {}s", settings.verify_timeout.as_secs());
    log::info!("Shutdown grace:   {}s", settings.shutdown_grace.as_secs());

    if matches!(settings.store, crate::config::StoreLocation::Memory) {
        log::warn!("In-memory store selected: registrations are lost on restart");
    }
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }

    #[test]
    fn test_log_file_keeps_previous_runs() {
        use std::io::Write;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("attendbot.log");
        std::fs::write(&path, "first run\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "second run").unwrap();
        drop(file);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first run\nsecond run\n");
    }

    #[test]
    fn test_log_file_is_created_when_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fresh.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_init_logger_rejects_unwritable_path() {
        let result = init_logger("/nonexistent-dir/for/sure/app.log", "info");
        assert!(result.is_err());
    }
}
