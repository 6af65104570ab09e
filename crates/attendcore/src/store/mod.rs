//! Credential store: group → student records.
//!
//! Every backend implements [`CredentialStore`]; all three contract
//! operations are linearizable with respect to each other. Logins are
//! unique per group, compared case-insensitively.

pub mod json_file;
pub mod memory;
pub mod snapshot;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use strum::{Display, EnumString};

use crate::config::StoreLocation;
use crate::error::StoreError;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use snapshot::Snapshot;
pub use sqlite::SqliteStore;

/// One persisted student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub group: String,
    /// Login as originally registered (original casing)
    pub login: String,
    pub password_digest: String,
    /// Attendance flag flipped by the status toggle
    pub subscribed: bool,
}

/// Per-group counters for the admin listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub name: String,
    pub relevance: bool,
    pub students: usize,
    pub present: usize,
}

/// What registration does with a group that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum GroupPolicy {
    /// Registration into an unknown group fails with `GroupNotFound`
    #[default]
    RequireExisting,
    /// The first registration creates the group
    AutoCreate,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Adds a student unless the login is already taken in the group.
    async fn insert_if_absent(&self, group: &str, login: &str, digest: &str) -> Result<(), StoreError>;

    /// Looks a student up by group and login.
    async fn find(&self, group: &str, login: &str) -> Result<CredentialRecord, StoreError>;

    /// Sets the attendance flag; setting the current value again succeeds.
    async fn toggle(&self, group: &str, login: &str, value: bool) -> Result<(), StoreError>;

    /// Creates a group if missing. Returns `true` when it was created.
    async fn ensure_group(&self, group: &str, relevance: bool) -> Result<bool, StoreError>;

    /// Lists groups with their counters, sorted by name.
    async fn groups(&self) -> Result<Vec<GroupSummary>, StoreError>;
}

/// Login comparison used for uniqueness and lookup.
pub fn same_login(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Normalized login used as a lookup key.
pub fn login_key(login: &str) -> String {
    login.to_lowercase()
}

/// Opens the backend selected by `location`.
pub fn open_store(location: &StoreLocation, policy: GroupPolicy) -> Result<Arc<dyn CredentialStore>, StoreError> {
    let store: Arc<dyn CredentialStore> = match location {
        StoreLocation::Json(path) => Arc::new(JsonFileStore::new(path.clone(), policy)),
        StoreLocation::Sqlite(path) => Arc::new(SqliteStore::open(path, policy)?),
        StoreLocation::Memory => Arc::new(MemoryStore::new(policy)),
    };
    log::info!("Opened credential store: {} (group policy: {})", location, policy);
    Ok(store)
}
