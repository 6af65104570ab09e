//! Channel membership checks against the Telegram Bot API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::config::Settings;
use crate::error::VerifyError;

/// Answer of a membership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Subscribed,
    NotSubscribed,
}

/// Answers "is this user a member of the configured channel?".
///
/// An `Err` means the answer is unknown and must never be read as
/// [`Membership::NotSubscribed`].
#[async_trait]
pub trait SubscriptionVerifier: Send + Sync {
    async fn check(&self, user_id: u64) -> Result<Membership, VerifyError>;
}

/// Verifier backed by the `getChatMember` Bot API method.
pub struct TelegramMembershipVerifier {
    client: reqwest::Client,
    api_base: Url,
    token: SecretString,
    channel: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<ChatMemberInfo>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMemberInfo {
    status: String,
    /// Only present for `restricted` members
    #[serde(default)]
    is_member: Option<bool>,
}

impl TelegramMembershipVerifier {
    /// Builds a verifier whose every call is bounded by `timeout`.
    pub fn new(
        api_base: Url,
        token: SecretString,
        channel: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("attendbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base,
            token,
            channel: channel.into().trim_start_matches('@').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, VerifyError> {
        Self::new(
            settings.bot_api_url.clone(),
            settings.bot_token.clone(),
            settings.channel.clone(),
            settings.verify_timeout,
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/getChatMember",
            self.api_base.as_str().trim_end_matches('/'),
            self.token.expose_secret()
        )
    }
}

#[async_trait]
impl SubscriptionVerifier for TelegramMembershipVerifier {
    async fn check(&self, user_id: u64) -> Result<Membership, VerifyError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("chat_id", format!("@{}", self.channel)),
                ("user_id", user_id.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        // Telegram reports "user not found" as 400 with a JSON body, so the
        // body is decoded before the status is judged
        let parsed = match serde_json::from_slice::<ApiResponse>(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => return Err(VerifyError::Status(status)),
            Err(e) => return Err(VerifyError::Decode(e.to_string())),
        };

        let membership = decide(parsed)?;
        log::debug!("Membership of user {} in @{}: {:?}", user_id, self.channel, membership);
        Ok(membership)
    }
}

fn decide(response: ApiResponse) -> Result<Membership, VerifyError> {
    if !response.ok {
        let description = response.description.unwrap_or_default();
        let lowered = description.to_lowercase();
        if lowered.contains("user not found") || lowered.contains("member not found") {
            return Ok(Membership::NotSubscribed);
        }
        return Err(VerifyError::Api(description));
    }

    let member = response
        .result
        .ok_or_else(|| VerifyError::Decode("response has no result".to_string()))?;

    match member.status.as_str() {
        "creator" | "administrator" | "member" => Ok(Membership::Subscribed),
        "restricted" if member.is_member.unwrap_or(false) => Ok(Membership::Subscribed),
        "restricted" | "left" | "kicked" => Ok(Membership::NotSubscribed),
        other => Err(VerifyError::Decode(format!("unknown member status {:?}", other))),
    }
}
