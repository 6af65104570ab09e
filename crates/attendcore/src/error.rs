use thiserror::Error;

/// Errors produced by credential store backends.
///
/// The first three variants are domain answers; `Unavailable` covers every
/// I/O, decode or pool fault and is the only one that hints at a systemic
/// problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested group does not exist
    #[error("group {0:?} not found")]
    GroupNotFound(String),

    /// No student with this login in the group
    #[error("student {login:?} not found in group {group:?}")]
    StudentNotFound { group: String, login: String },

    /// Login already taken in the group (case-insensitive)
    #[error("login {login:?} already registered in group {group:?}")]
    DuplicateLogin { group: String, login: String },

    /// Persisted data unreadable, corrupt or unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Unavailable(format!("malformed store data: {}", err))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(format!("database error: {}", err))
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Unavailable(format!("database pool error: {}", err))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Unavailable(format!("store task failed: {}", err))
    }
}

/// Password hashing failures.
#[derive(Error, Debug)]
pub enum HashError {
    /// The hashing primitive rejected its input or parameters
    #[error("password hashing failed: {0}")]
    Primitive(String),

    /// The blocking worker running the primitive died
    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Channel membership check failures.
///
/// None of these mean "not subscribed": callers must treat them as
/// "unknown".
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Transport-level failure (URL stripped, it embeds the bot token)
    #[error("membership request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// No answer within the configured bound
    #[error("membership request timed out")]
    Timeout,

    /// Non-success HTTP status without a decodable body
    #[error("membership endpoint answered with status {0}")]
    Status(reqwest::StatusCode),

    /// Body was not the expected JSON shape
    #[error("malformed membership response: {0}")]
    Decode(String),

    /// The API answered `ok: false` for a reason other than "not a member"
    #[error("membership endpoint rejected the query: {0}")]
    Api(String),
}

impl From<reqwest::Error> for VerifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VerifyError::Timeout
        } else if err.is_decode() {
            VerifyError::Decode(err.without_url().to_string())
        } else {
            VerifyError::Http(err.without_url())
        }
    }
}

/// Configuration errors raised while reading the environment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}
