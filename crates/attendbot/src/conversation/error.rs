use attendcore::{HashError, StoreError, VerifyError};
use thiserror::Error;

use crate::outbound::Reply;
use crate::texts;

/// Everything that can end a conversation early.
///
/// Every variant is terminal for its own conversation only.
#[derive(Error, Debug)]
pub enum ConversationError {
    /// Malformed or incomplete answer; carries the text shown to the user
    #[error("invalid input: {0}")]
    Validation(&'static str),

    #[error("login already registered in the group")]
    DuplicateLogin,

    #[error("group not found")]
    GroupNotFound,

    #[error("student not found")]
    StudentNotFound,

    #[error("wrong password")]
    WrongPassword,

    /// I/O or decode fault in the credential store
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("user is not subscribed to the channel")]
    NotSubscribed,

    /// Membership could not be determined
    #[error("membership check failed: {0}")]
    VerificationFailed(#[source] VerifyError),

    #[error("no answer within the step deadline")]
    Timeout,

    /// Shutdown in progress
    #[error("conversation cancelled")]
    Cancelled,

    /// Hashing failure or another fault on our side
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConversationError {
    /// Text shown to the remote party, if any.
    pub fn user_message(&self) -> Option<&'static str> {
        let text = match self {
            ConversationError::Validation(text) => *text,
            ConversationError::DuplicateLogin => texts::DUPLICATE_LOGIN,
            ConversationError::GroupNotFound => texts::GROUP_NOT_FOUND,
            ConversationError::StudentNotFound => texts::STUDENT_NOT_FOUND,
            ConversationError::WrongPassword => texts::WRONG_PASSWORD,
            ConversationError::StoreUnavailable(_) => texts::STORE_UNAVAILABLE,
            ConversationError::NotSubscribed => texts::NOT_SUBSCRIBED,
            ConversationError::VerificationFailed(_) => texts::VERIFICATION_FAILED,
            ConversationError::Timeout => texts::TIMEOUT,
            ConversationError::Internal(_) => texts::INTERNAL,
            ConversationError::Cancelled => return None,
        };
        Some(text)
    }

    /// The reply sent when the conversation ends with this error.
    pub fn reply(&self) -> Option<Reply> {
        let text = self.user_message()?;
        Some(match self {
            ConversationError::NotSubscribed => Reply::channel_link(text),
            _ => Reply::new(text),
        })
    }

    /// Whether the failure points at our side rather than the user's input.
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            ConversationError::StoreUnavailable(_) | ConversationError::Internal(_)
        )
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            _ if self.is_systemic() => log::Level::Error,
            ConversationError::VerificationFailed(_) => log::Level::Warn,
            ConversationError::Cancelled => log::Level::Debug,
            _ => log::Level::Info,
        }
    }
}

impl From<StoreError> for ConversationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::GroupNotFound(_) => ConversationError::GroupNotFound,
            StoreError::StudentNotFound { .. } => ConversationError::StudentNotFound,
            StoreError::DuplicateLogin { .. } => ConversationError::DuplicateLogin,
            StoreError::Unavailable(reason) => ConversationError::StoreUnavailable(reason),
        }
    }
}

impl From<HashError> for ConversationError {
    fn from(err: HashError) -> Self {
        ConversationError::Internal(err.to_string())
    }
}

impl From<VerifyError> for ConversationError {
    fn from(err: VerifyError) -> Self {
        ConversationError::VerificationFailed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::Markup;

    #[test]
    fn test_store_errors_map_onto_taxonomy() {
        assert!(matches!(
            ConversationError::from(StoreError::GroupNotFound("g".into())),
            ConversationError::GroupNotFound
        ));
        assert!(matches!(
            ConversationError::from(StoreError::Unavailable("disk".into())),
            ConversationError::StoreUnavailable(ref r) if r == "disk"
        ));
    }

    #[test]
    fn test_only_store_and_internal_faults_are_systemic() {
        assert!(ConversationError::StoreUnavailable("x".into()).is_systemic());
        assert!(ConversationError::Internal("x".into()).is_systemic());
        assert!(!ConversationError::WrongPassword.is_systemic());
        assert!(!ConversationError::VerificationFailed(VerifyError::Timeout).is_systemic());
        assert_eq!(ConversationError::StoreUnavailable("x".into()).log_level(), log::Level::Error);
        assert_eq!(ConversationError::Timeout.log_level(), log::Level::Info);
    }

    #[test]
    fn test_replies() {
        assert!(ConversationError::Cancelled.reply().is_none());
        assert_eq!(
            ConversationError::NotSubscribed.reply().map(|r| r.markup),
            Some(Markup::ChannelLink)
        );
        assert_eq!(
            ConversationError::Timeout.reply().map(|r| r.text),
            Some(texts::TIMEOUT.to_string())
        );
        // Internal details never reach the user
        let reply = ConversationError::StoreUnavailable("/var/lib/data.json".into())
            .reply()
            .unwrap();
        assert!(!reply.text.contains("/var/lib"));
    }
}
