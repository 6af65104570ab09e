//! attendcore - core library for the attendance bot
//!
//! Everything that does not need Telegram lives here: configuration,
//! error types, logging bootstrap, the credential store with its
//! backends, password hashing and the channel membership check.
//!
//! # Module Structure
//!
//! - `config`: environment-driven settings and tunables
//! - `error`: error enums for every layer
//! - `logging`: logger initialization and startup diagnostics
//! - `hashing`: password hashing capability (argon2)
//! - `store`: credential store contract and its backends
//! - `verifier`: channel membership verification

pub mod config;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod store;
pub mod verifier;

// Re-export commonly used types for convenience
pub use config::{InputMode, Settings, StoreLocation};
pub use error::{ConfigError, HashError, StoreError, VerifyError};
pub use hashing::{Argon2Hasher, CredentialHasher};
pub use store::{open_store, CredentialRecord, CredentialStore, GroupPolicy, GroupSummary};
pub use verifier::{Membership, SubscriptionVerifier, TelegramMembershipVerifier};
