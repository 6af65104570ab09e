//! End-to-end dialogs against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use attendbot::conversation::{inbox, Completion, Delivery, Mailbox, StudentKey};
use attendbot::testing::{fast_settings, identity, Harness, StaticVerifier};
use attendbot::{texts, Conversation, ConversationError, ConversationSettings, Flow, Markup, Outcome, Step};
use attendcore::store::JsonFileStore;
use attendcore::{CredentialHasher, CredentialStore, GroupPolicy, InputMode};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use teloxide::types::ChatId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CHAT: i64 = 100;
const USER: u64 = 7;
const WAIT: Duration = Duration::from_secs(5);

struct Dialog {
    mailbox: Mailbox,
    handle: JoinHandle<Outcome>,
    cancel: CancellationToken,
}

impl Dialog {
    fn open(harness: &Harness, flow: Flow) -> Self {
        let (mailbox, inbox) = inbox::channel(8);
        let conversation = Conversation::new(identity(CHAT, USER), flow, inbox, harness.deps.clone());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(conversation.drive(cancel.clone()));
        Self {
            mailbox,
            handle,
            cancel,
        }
    }

    fn answer(&self, text: &str) {
        assert_eq!(self.mailbox.offer(text.to_string()), Delivery::Delivered, "answer {text:?}");
    }

    /// Answers as soon as the conversation asks for input.
    async fn answer_when_asked(&self, text: &str) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while !self.mailbox.is_awaiting() {
            assert!(tokio::time::Instant::now() < deadline, "never asked for {text:?}");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.answer(text);
    }

    async fn finish(self) -> Outcome {
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("conversation did not finish")
            .expect("conversation task panicked")
    }
}

/// Waits until the chat has received `count` messages and returns the last one.
async fn nth_message(harness: &Harness, count: usize) -> String {
    let texts = harness.outbound.wait_for(ChatId(CHAT), count, WAIT).await;
    assert!(texts.len() >= count, "expected {count} messages, got {texts:?}");
    texts[count - 1].clone()
}

fn texts_sent(harness: &Harness) -> Vec<String> {
    harness.outbound.texts_for(ChatId(CHAT))
}

/// Runs a full dialog, answering each prompt in turn.
async fn stepwise(harness: &Harness, flow: Flow, answers: &[&str]) -> Outcome {
    let dialog = Dialog::open(harness, flow);
    for answer in answers {
        dialog.answer_when_asked(answer).await;
    }
    dialog.finish().await
}

fn harness() -> Harness {
    Harness::new(StaticVerifier::subscribed(), fast_settings(Duration::from_secs(2)))
}

async fn with_group(harness: &Harness) {
    harness.store.ensure_group("CS-101", true).await.unwrap();
}

fn key(group: &str, login: &str) -> StudentKey {
    StudentKey {
        group: group.to_string(),
        login: login.to_string(),
    }
}

#[tokio::test]
async fn test_registration_then_duplicate() {
    let h = harness();
    with_group(&h).await;

    let outcome = stepwise(&h, Flow::Register, &["CS-101", "alice", "p1"]).await;
    assert_eq!(outcome.step, Step::Done);
    assert!(matches!(outcome.result, Ok(Completion::Registered(ref k)) if *k == key("CS-101", "alice")));
    assert_eq!(
        texts_sent(&h),
        vec![
            texts::ASK_GROUP,
            texts::ASK_LOGIN,
            texts::ASK_PASSWORD,
            texts::REGISTERED,
            texts::SUBSCRIPTION_CONFIRMED,
        ]
    );

    let outcome = stepwise(&h, Flow::Register, &["CS-101", "ALICE", "other"]).await;
    assert_eq!(outcome.step, Step::Aborted);
    assert_eq!(outcome.last_step, Step::Verifying);
    assert!(matches!(outcome.result, Err(ConversationError::DuplicateLogin)));
    assert_eq!(texts_sent(&h).last().map(String::as_str), Some(texts::DUPLICATE_LOGIN));

    // Only the successful registration reached the membership check
    assert_eq!(h.verifier.calls(), 1);
}

#[tokio::test]
async fn test_stored_digest_verifies_only_the_original_password() {
    let h = harness();
    with_group(&h).await;
    stepwise(&h, Flow::Register, &["CS-101", "alice", "p1"]).await;

    let record = h.store.find("CS-101", "alice").await.unwrap();
    assert!(!record.password_digest.contains("p1"));

    let hasher = h.deps.hasher.clone();
    assert!(hasher
        .verify(&record.password_digest, &SecretString::from("p1".to_string()))
        .unwrap());
    assert!(!hasher
        .verify(&record.password_digest, &SecretString::from("p2".to_string()))
        .unwrap());
}

#[tokio::test]
async fn test_login_with_wrong_then_right_password() {
    let h = harness();
    with_group(&h).await;
    stepwise(&h, Flow::Register, &["CS-101", "alice", "p1"]).await;
    let calls_after_register = h.verifier.calls();

    let outcome = stepwise(&h, Flow::Enter, &["CS-101", "alice", "wrong"]).await;
    assert!(matches!(outcome.result, Err(ConversationError::WrongPassword)));
    assert_eq!(texts_sent(&h).last().map(String::as_str), Some(texts::WRONG_PASSWORD));
    assert_eq!(h.verifier.calls(), calls_after_register);

    let before = texts_sent(&h).len();
    let dialog = Dialog::open(&h, Flow::Enter);
    for (i, answer) in ["CS-101", "alice", "p1"].iter().enumerate() {
        nth_message(&h, before + i + 1).await;
        dialog.answer(answer);
    }

    assert_eq!(nth_message(&h, before + 4).await, texts::LOGGED_IN);
    assert_eq!(nth_message(&h, before + 5).await, texts::ASK_STATUS);
    assert_eq!(h.verifier.calls(), calls_after_register + 1);

    dialog.answer(texts::BUTTON_STATUS_OFF);
    let outcome = dialog.finish().await;
    assert!(matches!(
        outcome.result,
        Ok(Completion::StatusChanged { present: false, .. })
    ));
}

#[tokio::test]
async fn test_status_on_marks_attendance() {
    let h = harness();
    with_group(&h).await;
    stepwise(&h, Flow::Register, &["CS-101", "alice", "p1"]).await;

    let outcome = stepwise(&h, Flow::Enter, &["CS-101", "Alice", "p1", texts::BUTTON_STATUS_ON]).await;
    assert_eq!(outcome.step, Step::Done);
    assert!(matches!(
        outcome.result,
        Ok(Completion::StatusChanged { present: true, ref key }) if key.login == "Alice"
    ));
    assert_eq!(texts_sent(&h).last().map(String::as_str), Some(texts::STATUS_ON));
    assert!(h.store.find("CS-101", "alice").await.unwrap().subscribed);
}

#[tokio::test]
async fn test_student_with_bcrypt_digest_from_old_store_logs_in() {
    let h = harness();
    with_group(&h).await;
    // bcrypt digest of "U*U", as written by earlier releases
    let digest = "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW";
    h.store.insert_if_absent("CS-101", "alice", digest).await.unwrap();

    let outcome = stepwise(&h, Flow::Enter, &["CS-101", "alice", "U*U", texts::BUTTON_STATUS_ON]).await;
    assert_eq!(outcome.step, Step::Done);
    assert!(matches!(
        outcome.result,
        Ok(Completion::StatusChanged { present: true, .. })
    ));
    assert!(h.store.find("CS-101", "alice").await.unwrap().subscribed);

    let outcome = stepwise(&h, Flow::Enter, &["CS-101", "alice", "wrong"]).await;
    assert!(matches!(outcome.result, Err(ConversationError::WrongPassword)));
}

#[tokio::test]
async fn test_unrecognized_status_leaves_store_untouched() {
    let h = harness();
    with_group(&h).await;
    stepwise(&h, Flow::Register, &["CS-101", "alice", "p1"]).await;

    let outcome = stepwise(&h, Flow::Enter, &["CS-101", "alice", "p1", "maybe"]).await;
    assert_eq!(outcome.step, Step::Done);
    assert!(matches!(outcome.result, Ok(Completion::UnrecognizedChoice(_))));
    assert_eq!(texts_sent(&h).last().map(String::as_str), Some(texts::UNKNOWN_COMMAND));
    assert!(!h.store.find("CS-101", "alice").await.unwrap().subscribed);
}

#[tokio::test]
async fn test_verification_failure_aborts_before_status_choice() {
    let h = Harness::new(StaticVerifier::failing(), fast_settings(Duration::from_secs(2)));
    with_group(&h).await;
    h.store.insert_if_absent("CS-101", "alice", &digest_of(&h, "p1")).await.unwrap();

    let outcome = stepwise(&h, Flow::Enter, &["CS-101", "alice", "p1"]).await;
    assert_eq!(outcome.step, Step::Aborted);
    assert_eq!(outcome.last_step, Step::AwaitingSubscription);
    assert!(matches!(outcome.result, Err(ConversationError::VerificationFailed(_))));

    let sent = texts_sent(&h);
    assert_eq!(sent.last().map(String::as_str), Some(texts::VERIFICATION_FAILED));
    assert!(!sent.iter().any(|t| t == texts::ASK_STATUS));
    assert!(!h.store.find("CS-101", "alice").await.unwrap().subscribed);
}

#[tokio::test]
async fn test_not_subscribed_sends_channel_link() {
    let h = Harness::new(StaticVerifier::not_subscribed(), fast_settings(Duration::from_secs(2)));
    with_group(&h).await;

    let outcome = stepwise(&h, Flow::Register, &["CS-101", "bob", "pw"]).await;
    assert!(matches!(outcome.result, Err(ConversationError::NotSubscribed)));

    let replies = h.outbound.replies_for(ChatId(CHAT));
    let last = replies.last().unwrap();
    assert_eq!(last.text, texts::NOT_SUBSCRIBED);
    assert_eq!(last.markup, Markup::ChannelLink);

    // The registration itself stands; the user only has to join and log in
    assert!(h.store.find("CS-101", "bob").await.is_ok());
}

#[tokio::test]
async fn test_timeout_sends_exactly_one_message() {
    let h = Harness::new(StaticVerifier::subscribed(), fast_settings(Duration::from_millis(100)));
    let dialog = Dialog::open(&h, Flow::Register);

    let outcome = dialog.finish().await;
    assert_eq!(outcome.step, Step::Aborted);
    assert_eq!(outcome.last_step, Step::CollectingGroup);
    assert!(matches!(outcome.result, Err(ConversationError::Timeout)));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(texts_sent(&h), vec![texts::ASK_GROUP, texts::TIMEOUT]);
}

#[tokio::test]
async fn test_timeout_mid_dialog() {
    let h = Harness::new(StaticVerifier::subscribed(), fast_settings(Duration::from_millis(150)));
    let dialog = Dialog::open(&h, Flow::Enter);
    nth_message(&h, 1).await;
    dialog.answer("CS-101");

    let outcome = dialog.finish().await;
    assert_eq!(outcome.last_step, Step::CollectingLogin);
    assert_eq!(texts_sent(&h), vec![texts::ASK_GROUP, texts::ASK_LOGIN, texts::TIMEOUT]);
}

#[tokio::test]
async fn test_multi_word_answer_is_rejected() {
    let h = harness();
    with_group(&h).await;

    let outcome = stepwise(&h, Flow::Register, &["CS 101"]).await;
    assert_eq!(outcome.step, Step::Aborted);
    assert!(matches!(
        outcome.result,
        Err(ConversationError::Validation(texts::ONE_WORD_EXPECTED))
    ));
    assert_eq!(texts_sent(&h), vec![texts::ASK_GROUP, texts::ONE_WORD_EXPECTED]);
    assert_eq!(h.verifier.calls(), 0);
}

#[tokio::test]
async fn test_unknown_group_is_reported() {
    let h = harness();

    let outcome = stepwise(&h, Flow::Register, &["NOPE", "alice", "p1"]).await;
    assert!(matches!(outcome.result, Err(ConversationError::GroupNotFound)));
    assert_eq!(texts_sent(&h).last().map(String::as_str), Some(texts::GROUP_NOT_FOUND));

    let outcome = stepwise(&h, Flow::Enter, &["NOPE", "alice", "p1"]).await;
    assert!(matches!(outcome.result, Err(ConversationError::GroupNotFound)));
}

#[tokio::test]
async fn test_unknown_student_is_reported() {
    let h = harness();
    with_group(&h).await;

    let outcome = stepwise(&h, Flow::Enter, &["CS-101", "nobody", "p1"]).await;
    assert!(matches!(outcome.result, Err(ConversationError::StudentNotFound)));
    assert_eq!(texts_sent(&h).last().map(String::as_str), Some(texts::STUDENT_NOT_FOUND));
}

#[tokio::test]
async fn test_auto_create_policy_registers_into_new_group() {
    let h = Harness::with_policy(
        StaticVerifier::subscribed(),
        fast_settings(Duration::from_secs(2)),
        GroupPolicy::AutoCreate,
    );

    let outcome = stepwise(&h, Flow::Register, &["MATH-7", "carol", "pw"]).await;
    assert_eq!(outcome.step, Step::Done);
    assert_eq!(h.store.groups().await.unwrap()[0].name, "MATH-7");
}

#[tokio::test]
async fn test_single_message_mode() {
    let settings = ConversationSettings {
        input_mode: InputMode::SingleMessage,
        ..fast_settings(Duration::from_secs(2))
    };
    let h = Harness::new(StaticVerifier::subscribed(), settings);
    with_group(&h).await;

    let outcome = stepwise(&h, Flow::Register, &["CS-101 alice p1"]).await;
    assert_eq!(outcome.step, Step::Done);
    assert_eq!(texts_sent(&h)[0], texts::ASK_ALL_AT_ONCE);
    assert!(h.store.find("CS-101", "alice").await.is_ok());

    let outcome = stepwise(&h, Flow::Enter, &["CS-101 alice"]).await;
    assert!(matches!(
        outcome.result,
        Err(ConversationError::Validation(texts::THREE_FIELDS_EXPECTED))
    ));
}

#[tokio::test]
async fn test_corrupt_store_is_reported_as_unavailable() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(&path, "{ not json").unwrap();

    let mut h = harness();
    h.deps.store = Arc::new(JsonFileStore::new(path, GroupPolicy::RequireExisting));

    let outcome = stepwise(&h, Flow::Enter, &["CS-101", "alice", "p1"]).await;
    match outcome.result {
        Err(ref err @ ConversationError::StoreUnavailable(_)) => assert!(err.is_systemic()),
        ref other => panic!("expected StoreUnavailable, got {:?}", other),
    }
    assert_eq!(texts_sent(&h).last().map(String::as_str), Some(texts::STORE_UNAVAILABLE));
}

#[tokio::test]
async fn test_cancel_while_awaiting_input_sends_nothing() {
    let h = harness();
    let dialog = Dialog::open(&h, Flow::Register);
    nth_message(&h, 1).await;
    assert_eq!(h.registry.active_count(), 1);

    dialog.cancel.cancel();
    let outcome = dialog.finish().await;
    assert_eq!(outcome.step, Step::Aborted);
    assert!(matches!(outcome.result, Err(ConversationError::Cancelled)));
    assert_eq!(texts_sent(&h), vec![texts::ASK_GROUP]);
    assert_eq!(h.registry.active_count(), 0);
}

#[tokio::test]
async fn test_cancel_abandons_slow_verifier_call() {
    let h = Harness::new(
        StaticVerifier::subscribed().with_delay_for(USER, Duration::from_secs(30)),
        fast_settings(Duration::from_secs(2)),
    );
    with_group(&h).await;

    let dialog = Dialog::open(&h, Flow::Register);
    for (i, answer) in ["CS-101", "alice", "p1"].iter().enumerate() {
        nth_message(&h, i + 1).await;
        dialog.answer(answer);
    }
    assert_eq!(nth_message(&h, 4).await, texts::REGISTERED);

    dialog.cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(1), dialog.finish())
        .await
        .expect("cancellation must not wait for the verifier");
    assert_eq!(outcome.last_step, Step::AwaitingSubscription);
    assert!(matches!(outcome.result, Err(ConversationError::Cancelled)));
}

fn digest_of(h: &Harness, password: &str) -> String {
    h.deps
        .hasher
        .hash(&SecretString::from(password.to_string()))
        .unwrap()
}
