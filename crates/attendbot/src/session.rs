//! Session registry: who is mid-conversation, and what they are called.
//!
//! Both maps are advisory. Display names feed log lines only, and the
//! active-session map mirrors the dispatcher's own routing table for
//! observability. Nothing reads them to make a correctness decision, so
//! a stale or evicted entry is harmless.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use moka::sync::Cache;
use std::time::Duration;
use teloxide::types::{ChatId, UserId};

use attendcore::config::dispatcher::{NAME_CACHE_CAPACITY, NAME_CACHE_IDLE_SECS};

use crate::conversation::state::Flow;

#[derive(Debug)]
pub struct ActiveSession {
    pub user_id: UserId,
    pub flow: Flow,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionRegistry {
    /// Every user who writes to the bot lands here, so it must stay bounded
    names: Cache<UserId, String>,
    active: DashMap<ChatId, ActiveSession>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_name_capacity(NAME_CACHE_CAPACITY)
    }

    /// Registry whose display-name cache holds at most `capacity` users.
    pub fn with_name_capacity(capacity: u64) -> Self {
        let names = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(Duration::from_secs(NAME_CACHE_IDLE_SECS))
            .build();
        Self {
            names,
            active: DashMap::new(),
        }
    }

    /// Records the last display name seen for `user_id`.
    pub fn remember_name(&self, user_id: UserId, name: &str) {
        if name.is_empty() {
            return;
        }
        self.names.insert(user_id, name.to_string());
    }

    /// Last known display name, or the numeric id when none was seen.
    pub fn display_name(&self, user_id: UserId) -> String {
        self.names
            .get(&user_id)
            .unwrap_or_else(|| user_id.0.to_string())
    }

    pub fn begin(&self, chat_id: ChatId, user_id: UserId, flow: Flow) {
        self.active.insert(
            chat_id,
            ActiveSession {
                user_id,
                flow,
                started_at: Utc::now(),
            },
        );
    }

    /// Removes the entry and returns how long the session lasted.
    pub fn end(&self, chat_id: ChatId) -> Option<chrono::Duration> {
        self.active
            .remove(&chat_id)
            .map(|(_, session)| Utc::now() - session.started_at)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
