use secrecy::SecretString;
use strum::Display;

/// Which dialog a start command opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Flow {
    Register,
    Enter,
}

/// Position of a conversation in its dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Step {
    Idle,
    CollectingGroup,
    CollectingLogin,
    CollectingPassword,
    Verifying,
    AwaitingSubscription,
    AwaitingStatusChoice,
    Done,
    Aborted,
}

/// Explicit store key carried through the dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentKey {
    pub group: String,
    pub login: String,
}

/// Everything collected before verification.
#[derive(Debug)]
pub struct Credentials {
    pub key: StudentKey,
    pub password: SecretString,
}

/// How a conversation that reached `Done` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Registered and subscribed
    Registered(StudentKey),
    /// Attendance flag set to the carried value
    StatusChanged { key: StudentKey, present: bool },
    /// Status step got something other than a status token
    UnrecognizedChoice(StudentKey),
}
