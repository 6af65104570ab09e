//! Shared collaborators handed to every conversation.

use std::sync::Arc;
use std::time::Duration;

use attendcore::config::dispatcher::MAILBOX_CAPACITY;
use attendcore::{CredentialHasher, CredentialStore, InputMode, Settings, SubscriptionVerifier};

use crate::outbound::Outbound;
use crate::session::SessionRegistry;

/// Per-conversation tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationSettings {
    pub step_timeout: Duration,
    pub input_mode: InputMode,
    pub mailbox_capacity: usize,
}

impl ConversationSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            step_timeout: settings.step_timeout,
            input_mode: settings.input_mode,
            mailbox_capacity: MAILBOX_CAPACITY,
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            step_timeout: attendcore::config::conversation::step_timeout(),
            input_mode: InputMode::default(),
            mailbox_capacity: MAILBOX_CAPACITY,
        }
    }
}

/// Dependencies required by the conversation engine
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn CredentialStore>,
    pub verifier: Arc<dyn SubscriptionVerifier>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub outbound: Arc<dyn Outbound>,
    pub registry: Arc<SessionRegistry>,
    pub settings: ConversationSettings,
}

impl EngineDeps {
    /// Create new engine dependencies
    pub fn new(
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn SubscriptionVerifier>,
        hasher: Arc<dyn CredentialHasher>,
        outbound: Arc<dyn Outbound>,
        registry: Arc<SessionRegistry>,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            store,
            verifier,
            hasher,
            outbound,
            registry,
            settings,
        }
    }
}
