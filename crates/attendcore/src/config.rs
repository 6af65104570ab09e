use once_cell::sync::Lazy;
use secrecy::SecretString;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use strum::{Display, EnumString};
use url::Url;

use crate::error::ConfigError;
use crate::store::GroupPolicy;

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: attendbot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "attendbot.log".to_string()));

/// Log level (error, warn, info, debug, trace)
/// Read from LOG_LEVEL environment variable
/// Default: info
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// Default Bot API base URL
pub const DEFAULT_BOT_API_URL: &str = "https://api.telegram.org";

/// Default credential store location
pub const DEFAULT_STORE_PATH: &str = "data.json";

/// Conversation configuration
pub mod conversation {
    use super::Duration;

    /// How long a conversation waits for each answer (in seconds)
    pub const STEP_TIMEOUT_SECS: u64 = 10;

    /// Per-step input deadline
    pub fn step_timeout() -> Duration {
        Duration::from_secs(STEP_TIMEOUT_SECS)
    }
}

/// Channel membership check configuration
pub mod verifier {
    /// Upper bound for one getChatMember call (in seconds)
    pub const TIMEOUT_SECS: u64 = 5;
}

/// Dispatcher configuration
pub mod dispatcher {
    use super::Duration;

    /// Inbound events buffered between the Telegram listener and the routing loop
    pub const EVENT_BUFFER: usize = 256;

    /// Pending events per conversation before new ones are dropped
    pub const MAILBOX_CAPACITY: usize = 8;

    /// How long shutdown waits for cancelled conversations (in seconds)
    pub const SHUTDOWN_GRACE_SECS: u64 = 3;

    pub fn shutdown_grace() -> Duration {
        Duration::from_secs(SHUTDOWN_GRACE_SECS)
    }

    /// Display names kept for log lines
    pub const NAME_CACHE_CAPACITY: u64 = 10_000;

    /// Display names unused for this long are forgotten (in seconds)
    pub const NAME_CACHE_IDLE_SECS: u64 = 24 * 60 * 60;
}

/// How credentials are collected from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum InputMode {
    /// One prompt per field, one word per answer
    #[default]
    Stepwise,
    /// Legacy: a single "group login password" message
    SingleMessage,
}

/// Where the credential store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Flat JSON file holding the whole snapshot
    Json(PathBuf),
    /// SQLite database file
    Sqlite(PathBuf),
    /// In-process only, lost on exit
    Memory,
}

impl StoreLocation {
    /// Interprets a `STORE_PATH` value.
    ///
    /// `memory:` selects the in-process store, `sqlite:<path>` or a
    /// `.sqlite`/`.sqlite3`/`.db` extension selects SQLite, anything else
    /// is a JSON file.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "memory:" {
            return StoreLocation::Memory;
        }
        if let Some(path) = raw.strip_prefix("sqlite:") {
            return StoreLocation::Sqlite(PathBuf::from(path));
        }
        let path = PathBuf::from(raw);
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("sqlite") | Some("sqlite3") | Some("db") => StoreLocation::Sqlite(path),
            _ => StoreLocation::Json(path),
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::Json(path) => write!(f, "json file {}", path.display()),
            StoreLocation::Sqlite(path) => write!(f, "sqlite {}", path.display()),
            StoreLocation::Memory => write!(f, "in-memory"),
        }
    }
}

/// Runtime settings assembled from the environment.
///
/// Built once at startup and passed down explicitly.
#[derive(Debug)]
pub struct Settings {
    pub bot_token: SecretString,
    /// Channel username without the leading `@`
    pub channel: String,
    pub store: StoreLocation,
    pub group_policy: GroupPolicy,
    pub input_mode: InputMode,
    pub step_timeout: Duration,
    pub verify_timeout: Duration,
    pub shutdown_grace: Duration,
    pub bot_api_url: Url,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_of = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let bot_token = first_of(&["BOT_TOKEN", "TELOXIDE_TOKEN", "token"]).unwrap_or_default();
        let channel = first_of(&["CHANNEL", "channel"])
            .map(|c| c.trim_start_matches('@').to_string())
            .unwrap_or_default();
        let store = StoreLocation::parse(&first_of(&["STORE_PATH"]).unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()));

        let group_policy = parse_enum("GROUP_POLICY", first_of(&["GROUP_POLICY"]))?;
        let input_mode = parse_enum("INPUT_MODE", first_of(&["INPUT_MODE"]))?;

        let step_timeout = parse_secs(
            "STEP_TIMEOUT_SECS",
            first_of(&["STEP_TIMEOUT_SECS"]),
            conversation::STEP_TIMEOUT_SECS,
        )?;
        let verify_timeout = parse_secs(
            "VERIFY_TIMEOUT_SECS",
            first_of(&["VERIFY_TIMEOUT_SECS"]),
            verifier::TIMEOUT_SECS,
        )?;
        let shutdown_grace = parse_secs(
            "SHUTDOWN_GRACE_SECS",
            first_of(&["SHUTDOWN_GRACE_SECS"]),
            dispatcher::SHUTDOWN_GRACE_SECS,
        )?;

        let raw_url = first_of(&["BOT_API_URL"]).unwrap_or_else(|| DEFAULT_BOT_API_URL.to_string());
        let bot_api_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: "BOT_API_URL",
            value: raw_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            channel,
            store,
            group_policy,
            input_mode,
            step_timeout,
            verify_timeout,
            shutdown_grace,
            bot_api_url,
        })
    }

    /// Checks the values only the bot needs (admin commands run without them).
    pub fn validate_for_bot(&self) -> Result<(), ConfigError> {
        use secrecy::ExposeSecret;

        if self.bot_token.expose_secret().is_empty() {
            return Err(ConfigError::Missing("BOT_TOKEN"));
        }
        if self.channel.is_empty() {
            return Err(ConfigError::Missing("CHANNEL"));
        }
        Ok(())
    }
}

fn parse_enum<T: FromStr + Default>(name: &'static str, raw: Option<String>) -> Result<T, ConfigError> {
    match raw {
        None => Ok(T::default()),
        Some(value) => value.to_lowercase().parse::<T>().map_err(|_| ConfigError::Invalid {
            name,
            value,
            reason: "unknown variant".to_string(),
        }),
    }
}

fn parse_secs(name: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let secs = match raw {
        None => default,
        Some(value) => value.parse::<u64>().map_err(|e| ConfigError::Invalid {
            name,
            value: value.clone(),
            reason: e.to_string(),
        })?,
    };
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
            reason: "must be at least one second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.store, StoreLocation::Json(PathBuf::from("data.json")));
        assert_eq!(settings.group_policy, GroupPolicy::RequireExisting);
        assert_eq!(settings.input_mode, InputMode::Stepwise);
        assert_eq!(settings.step_timeout, Duration::from_secs(10));
        assert_eq!(settings.verify_timeout, Duration::from_secs(5));
        assert_eq!(settings.bot_api_url.as_str(), "https://api.telegram.org/");
        assert_eq!(settings.validate_for_bot(), Err(ConfigError::Missing("BOT_TOKEN")));
    }

    #[test]
    fn test_legacy_variable_names_are_accepted() {
        let settings = Settings::from_lookup(lookup(&[("token", "123:abc"), ("channel", "@mychannel")])).unwrap();
        assert_eq!(settings.bot_token.expose_secret(), "123:abc");
        assert_eq!(settings.channel, "mychannel");
        assert!(settings.validate_for_bot().is_ok());
    }

    #[test]
    fn test_missing_channel_is_reported() {
        let settings = Settings::from_lookup(lookup(&[("BOT_TOKEN", "123:abc")])).unwrap();
        assert_eq!(settings.validate_for_bot(), Err(ConfigError::Missing("CHANNEL")));
    }

    #[test]
    fn test_policies_and_modes_parse() {
        let settings = Settings::from_lookup(lookup(&[
            ("GROUP_POLICY", "auto-create"),
            ("INPUT_MODE", "Single-Message"),
            ("STEP_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(settings.group_policy, GroupPolicy::AutoCreate);
        assert_eq!(settings.input_mode, InputMode::SingleMessage);
        assert_eq!(settings.step_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = Settings::from_lookup(lookup(&[("GROUP_POLICY", "sometimes")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "GROUP_POLICY", .. }));

        let err = Settings::from_lookup(lookup(&[("STEP_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STEP_TIMEOUT_SECS", .. }));

        let err = Settings::from_lookup(lookup(&[("BOT_API_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BOT_API_URL", .. }));
    }

    #[test]
    fn test_store_location_parse() {
        assert_eq!(StoreLocation::parse("memory:"), StoreLocation::Memory);
        assert_eq!(
            StoreLocation::parse("sqlite:/var/lib/bot/store"),
            StoreLocation::Sqlite(PathBuf::from("/var/lib/bot/store"))
        );
        assert_eq!(
            StoreLocation::parse("students.db"),
            StoreLocation::Sqlite(PathBuf::from("students.db"))
        );
        assert_eq!(
            StoreLocation::parse(" ./data.json "),
            StoreLocation::Json(PathBuf::from("./data.json"))
        );
    }

    #[test]
    fn test_debug_output_hides_token() {
        let settings = Settings::from_lookup(lookup(&[("BOT_TOKEN", "123:very-secret")])).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("very-secret"));
    }
}
