//! One dialog bound to one chat.
//!
//! A [`Conversation`] owns its state outright and runs as a single task:
//! it never runs two steps at once, and it suspends only while waiting for
//! the next answer or for a store/verifier/hasher call. The dispatcher
//! feeds it answers through its [`inbox::Inbox`].
//!
//! Flow:
//! - register: group → login → password → hash + insert → membership check → `Done`
//! - enter: group → login → password → find + verify → membership check →
//!   status choice → toggle → `Done`
//!
//! Any failure ends the dialog in `Aborted` after exactly one message to the
//! user (none on cancellation).

pub mod error;
pub mod inbox;
pub mod state;

use attendcore::hashing::{hash_async, verify_async};
use attendcore::{InputMode, Membership};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use crate::deps::EngineDeps;
use crate::event::Identity;
use crate::outbound::Reply;
use crate::texts;

pub use error::ConversationError;
pub use inbox::{Delivery, Inbox, Mailbox};
pub use state::{Completion, Credentials, Flow, Step, StudentKey};

/// Final report of a finished conversation.
#[derive(Debug)]
pub struct Outcome {
    pub identity: Identity,
    pub flow: Flow,
    /// Terminal step: `Done` or `Aborted`
    pub step: Step,
    /// Step the conversation was in when it ended
    pub last_step: Step,
    pub result: Result<Completion, ConversationError>,
}

pub struct Conversation {
    identity: Identity,
    flow: Flow,
    step: Step,
    inbox: Inbox,
    deps: EngineDeps,
}

impl Conversation {
    pub fn new(identity: Identity, flow: Flow, inbox: Inbox, deps: EngineDeps) -> Self {
        Self {
            identity,
            flow,
            step: Step::Idle,
            inbox,
            deps,
        }
    }

    /// Runs the dialog to a terminal step.
    ///
    /// Cancelling `cancel` drops the dialog at whatever it is awaiting,
    /// including an outstanding store or verifier call.
    pub async fn drive(mut self, cancel: CancellationToken) -> Outcome {
        self.deps
            .registry
            .begin(self.identity.chat_id, self.identity.user_id, self.flow);
        log::info!("Conversation started: {}", self.context());

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ConversationError::Cancelled),
            result = self.run() => result,
        };

        self.finish(result).await
    }

    async fn run(&mut self) -> Result<Completion, ConversationError> {
        let Credentials { key, password } = self.collect_credentials().await?;

        self.enter(Step::Verifying);
        match self.flow {
            Flow::Register => self.register(&key, password).await?,
            Flow::Enter => self.authenticate(&key, password).await?,
        }

        self.enter(Step::AwaitingSubscription);
        match self.deps.verifier.check(self.identity.user_id.0).await? {
            Membership::Subscribed => {}
            Membership::NotSubscribed => return Err(ConversationError::NotSubscribed),
        }

        match self.flow {
            Flow::Register => {
                self.say(texts::SUBSCRIPTION_CONFIRMED).await;
                Ok(Completion::Registered(key))
            }
            Flow::Enter => self.choose_status(key).await,
        }
    }

    async fn collect_credentials(&mut self) -> Result<Credentials, ConversationError> {
        match self.deps.settings.input_mode {
            InputMode::Stepwise => {
                self.enter(Step::CollectingGroup);
                let group = single_token(&self.ask(texts::ASK_GROUP).await?)?;

                self.enter(Step::CollectingLogin);
                let login = single_token(&self.ask(texts::ASK_LOGIN).await?)?;

                self.enter(Step::CollectingPassword);
                let password = SecretString::from(single_token(&self.ask(texts::ASK_PASSWORD).await?)?);

                Ok(Credentials {
                    key: StudentKey { group, login },
                    password,
                })
            }
            InputMode::SingleMessage => {
                self.enter(Step::CollectingGroup);
                let answer = self.ask(texts::ASK_ALL_AT_ONCE).await?;
                let credentials = three_fields(&answer)?;
                self.enter(Step::CollectingPassword);
                Ok(credentials)
            }
        }
    }

    async fn register(&mut self, key: &StudentKey, password: SecretString) -> Result<(), ConversationError> {
        let digest = hash_async(self.deps.hasher.clone(), password).await?;
        self.deps
            .store
            .insert_if_absent(&key.group, &key.login, &digest)
            .await?;

        log::info!("Student registered: {} group={:?} login={:?}", self.context(), key.group, key.login);
        self.say(texts::REGISTERED).await;
        Ok(())
    }

    async fn authenticate(&mut self, key: &StudentKey, password: SecretString) -> Result<(), ConversationError> {
        let record = self.deps.store.find(&key.group, &key.login).await?;
        if !verify_async(self.deps.hasher.clone(), record.password_digest, password).await? {
            return Err(ConversationError::WrongPassword);
        }

        log::info!("Student logged in: {} group={:?} login={:?}", self.context(), key.group, key.login);
        self.say(texts::LOGGED_IN).await;
        Ok(())
    }

    async fn choose_status(&mut self, key: StudentKey) -> Result<Completion, ConversationError> {
        self.enter(Step::AwaitingStatusChoice);
        let answer = self.ask(texts::ASK_STATUS).await?;

        let Some(present) = texts::parse_status(&answer) else {
            self.say(texts::UNKNOWN_COMMAND).await;
            return Ok(Completion::UnrecognizedChoice(key));
        };

        self.deps.store.toggle(&key.group, &key.login, present).await?;
        self.say(if present { texts::STATUS_ON } else { texts::STATUS_OFF })
            .await;
        Ok(Completion::StatusChanged { key, present })
    }

    /// Sends a prompt and waits for the answer.
    ///
    /// Input is accepted from before the prompt goes out, so a fast reply
    /// is never lost.
    async fn ask(&mut self, prompt: &str) -> Result<String, ConversationError> {
        self.inbox.set_awaiting(true);
        self.say(prompt).await;
        self.inbox.next(self.deps.settings.step_timeout).await
    }

    async fn say(&self, text: &str) {
        self.deps
            .outbound
            .send(self.identity.chat_id, Reply::new(text))
            .await;
    }

    fn enter(&mut self, step: Step) {
        log::debug!("Conversation step {} -> {}: {}", self.step, step, self.context());
        self.step = step;
    }

    fn context(&self) -> String {
        format!(
            "chat={} user={} ({}) flow={} step={}",
            self.identity.chat_id.0,
            self.identity.user_id.0,
            self.deps.registry.display_name(self.identity.user_id),
            self.flow,
            self.step
        )
    }

    async fn finish(mut self, result: Result<Completion, ConversationError>) -> Outcome {
        let last_step = self.step;
        self.inbox.set_awaiting(false);

        match &result {
            Ok(completion) => {
                self.enter(Step::Done);
                log::info!("Conversation done: {} ({:?})", self.context(), completion);
            }
            Err(err) => {
                log::log!(err.log_level(), "Conversation aborted: {}: {}", self.context(), err);
                if let Some(reply) = err.reply() {
                    self.deps.outbound.send(self.identity.chat_id, reply).await;
                }
                self.enter(Step::Aborted);
            }
        }

        if let Some(elapsed) = self.deps.registry.end(self.identity.chat_id) {
            log::debug!(
                "Conversation for chat {} lasted {}ms",
                self.identity.chat_id.0,
                elapsed.num_milliseconds()
            );
        }

        Outcome {
            identity: self.identity,
            flow: self.flow,
            step: self.step,
            last_step,
            result,
        }
    }
}

/// Validates a one-field answer.
fn single_token(answer: &str) -> Result<String, ConversationError> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(ConversationError::Validation(texts::EMPTY_ANSWER));
    }
    if answer.split_whitespace().nth(1).is_some() {
        return Err(ConversationError::Validation(texts::ONE_WORD_EXPECTED));
    }
    Ok(answer.to_string())
}

/// Validates a legacy "group login password" answer.
fn three_fields(answer: &str) -> Result<Credentials, ConversationError> {
    let fields: Vec<&str> = answer.split_whitespace().collect();
    match fields.as_slice() {
        [group, login, password] => Ok(Credentials {
            key: StudentKey {
                group: (*group).to_string(),
                login: (*login).to_string(),
            },
            password: SecretString::from((*password).to_string()),
        }),
        _ => Err(ConversationError::Validation(texts::THREE_FIELDS_EXPECTED)),
    }
}
