//! Test doubles for the conversation engine.
//!
//! Used by this crate's unit and integration tests; nothing here talks to
//! Telegram.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use attendcore::store::MemoryStore;
use attendcore::{Argon2Hasher, CredentialHasher, GroupPolicy, InputMode, Membership, SubscriptionVerifier, VerifyError};
use teloxide::types::{ChatId, UserId};

use crate::deps::{ConversationSettings, EngineDeps};
use crate::event::{Identity, InboundEvent};
use crate::outbound::{Outbound, Reply};
use crate::session::SessionRegistry;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Outbound that records every reply instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingOutbound {
    sent: Mutex<Vec<(ChatId, Reply)>>,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(ChatId, Reply)> {
        lock(&self.sent).clone()
    }

    pub fn replies_for(&self, chat_id: ChatId) -> Vec<Reply> {
        lock(&self.sent)
            .iter()
            .filter(|(chat, _)| *chat == chat_id)
            .map(|(_, reply)| reply.clone())
            .collect()
    }

    pub fn texts_for(&self, chat_id: ChatId) -> Vec<String> {
        self.replies_for(chat_id).into_iter().map(|reply| reply.text).collect()
    }

    /// Polls until `chat_id` has received at least `count` replies or
    /// `timeout` passes, then returns whatever arrived.
    pub async fn wait_for(&self, chat_id: ChatId, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let texts = self.texts_for(chat_id);
            if texts.len() >= count || tokio::time::Instant::now() >= deadline {
                return texts;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn send(&self, chat_id: ChatId, reply: Reply) {
        lock(&self.sent).push((chat_id, reply));
    }
}

/// Fixed answer returned by [`StaticVerifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierAnswer {
    Subscribed,
    NotSubscribed,
    Fail,
}

/// Membership verifier with a scripted answer and optional per-user delays.
#[derive(Debug)]
pub struct StaticVerifier {
    answer: VerifierAnswer,
    delays: HashMap<u64, Duration>,
    calls: AtomicUsize,
}

impl StaticVerifier {
    pub fn new(answer: VerifierAnswer) -> Self {
        Self {
            answer,
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn subscribed() -> Self {
        Self::new(VerifierAnswer::Subscribed)
    }

    pub fn not_subscribed() -> Self {
        Self::new(VerifierAnswer::NotSubscribed)
    }

    pub fn failing() -> Self {
        Self::new(VerifierAnswer::Fail)
    }

    /// Makes checks for `user_id` take `delay` before answering.
    pub fn with_delay_for(mut self, user_id: u64, delay: Duration) -> Self {
        self.delays.insert(user_id, delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionVerifier for StaticVerifier {
    async fn check(&self, user_id: u64) -> Result<Membership, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&user_id) {
            tokio::time::sleep(*delay).await;
        }
        match self.answer {
            VerifierAnswer::Subscribed => Ok(Membership::Subscribed),
            VerifierAnswer::NotSubscribed => Ok(Membership::NotSubscribed),
            VerifierAnswer::Fail => Err(VerifyError::Timeout),
        }
    }
}

/// Argon2 with minimal cost, so tests do not spend seconds hashing.
pub fn fast_hasher() -> Arc<dyn CredentialHasher> {
    Arc::new(Argon2Hasher::with_params(1024, 1, 1).unwrap_or_default())
}

/// Conversation settings with a short step deadline.
pub fn fast_settings(step_timeout: Duration) -> ConversationSettings {
    ConversationSettings {
        step_timeout,
        input_mode: InputMode::Stepwise,
        ..ConversationSettings::default()
    }
}

pub fn identity(chat: i64, user: u64) -> Identity {
    Identity {
        chat_id: ChatId(chat),
        user_id: UserId(user),
    }
}

pub fn event(chat: i64, user: u64, text: &str) -> InboundEvent {
    InboundEvent::new(identity(chat, user), format!("user{}", user), text)
}

/// Everything a conversation needs, with handles kept for assertions.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub outbound: Arc<RecordingOutbound>,
    pub verifier: Arc<StaticVerifier>,
    pub registry: Arc<SessionRegistry>,
    pub deps: EngineDeps,
}

impl Harness {
    pub fn new(verifier: StaticVerifier, settings: ConversationSettings) -> Self {
        Self::with_policy(verifier, settings, GroupPolicy::RequireExisting)
    }

    pub fn with_policy(verifier: StaticVerifier, settings: ConversationSettings, policy: GroupPolicy) -> Self {
        let store = Arc::new(MemoryStore::new(policy));
        let outbound = Arc::new(RecordingOutbound::new());
        let verifier = Arc::new(verifier);
        let registry = Arc::new(SessionRegistry::new());

        let deps = EngineDeps::new(
            store.clone(),
            verifier.clone(),
            fast_hasher(),
            outbound.clone(),
            registry.clone(),
            settings,
        );

        Self {
            store,
            outbound,
            verifier,
            registry,
            deps,
        }
    }
}
