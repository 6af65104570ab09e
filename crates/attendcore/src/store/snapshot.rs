//! The full group → students mapping, as persisted by the flat-file store.
//!
//! Layout (compatible with files written by earlier versions of the bot):
//!
//! ```json
//! {
//!   "groups": {
//!     "CS-101": {
//!       "relevance": true,
//!       "users": [
//!         { "login": "alice", "password": "$argon2id$...", "subscription": false }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Fields this code does not know about are kept in `extra` maps at every
//! level, so a write never drops data it did not touch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{same_login, CredentialRecord, GroupPolicy, GroupSummary};
use crate::error::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub groups: BTreeMap<String, Group>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub relevance: bool,
    #[serde(default)]
    pub users: Vec<StudentEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentEntry {
    pub login: String,
    #[serde(rename = "password")]
    pub password_digest: String,
    #[serde(rename = "subscription", default)]
    pub subscribed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Snapshot {
    /// Decodes a persisted snapshot. Blank input is an empty snapshot.
    pub fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encodes the snapshot for persistence.
    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Check-then-insert on the in-memory snapshot.
    pub fn insert_if_absent(
        &mut self,
        group: &str,
        login: &str,
        digest: &str,
        policy: GroupPolicy,
    ) -> Result<(), StoreError> {
        let entry = match (self.groups.contains_key(group), policy) {
            (true, _) | (false, GroupPolicy::AutoCreate) => self.groups.entry(group.to_string()).or_default(),
            (false, GroupPolicy::RequireExisting) => return Err(StoreError::GroupNotFound(group.to_string())),
        };

        if entry.users.iter().any(|user| same_login(&user.login, login)) {
            return Err(StoreError::DuplicateLogin {
                group: group.to_string(),
                login: login.to_string(),
            });
        }

        entry.users.push(StudentEntry {
            login: login.to_string(),
            password_digest: digest.to_string(),
            subscribed: false,
            extra: Map::new(),
        });
        Ok(())
    }

    pub fn find(&self, group: &str, login: &str) -> Result<CredentialRecord, StoreError> {
        let entry = self
            .groups
            .get(group)
            .ok_or_else(|| StoreError::GroupNotFound(group.to_string()))?;

        entry
            .users
            .iter()
            .find(|user| same_login(&user.login, login))
            .map(|user| CredentialRecord {
                group: group.to_string(),
                login: user.login.clone(),
                password_digest: user.password_digest.clone(),
                subscribed: user.subscribed,
            })
            .ok_or_else(|| StoreError::StudentNotFound {
                group: group.to_string(),
                login: login.to_string(),
            })
    }

    pub fn toggle(&mut self, group: &str, login: &str, value: bool) -> Result<(), StoreError> {
        let entry = self
            .groups
            .get_mut(group)
            .ok_or_else(|| StoreError::GroupNotFound(group.to_string()))?;

        let user = entry
            .users
            .iter_mut()
            .find(|user| same_login(&user.login, login))
            .ok_or_else(|| StoreError::StudentNotFound {
                group: group.to_string(),
                login: login.to_string(),
            })?;
        user.subscribed = value;
        Ok(())
    }

    /// Returns `true` when the group was created.
    pub fn ensure_group(&mut self, group: &str, relevance: bool) -> bool {
        if self.groups.contains_key(group) {
            return false;
        }
        self.groups.insert(
            group.to_string(),
            Group {
                relevance,
                ..Group::default()
            },
        );
        true
    }

    pub fn summaries(&self) -> Vec<GroupSummary> {
        self.groups
            .iter()
            .map(|(name, group)| GroupSummary {
                name: name.clone(),
                relevance: group.relevance,
                students: group.users.len(),
                present: group.users.iter().filter(|user| user.subscribed).count(),
            })
            .collect()
    }
}
