//! Routing loop: the single consumer of inbound events.
//!
//! Every active chat gets its own conversation task and a bounded mailbox.
//! The loop only ever does non-blocking work (`try_send`, map updates), so
//! a conversation stuck on a slow store or verifier call never delays
//! other chats.
//!
//! Shutdown cancels: on the shutdown token, or when the event source
//! closes, the loop stops reading, cancels every conversation, waits up to
//! the grace period and aborts whatever is left.

use std::collections::HashMap;
use std::time::Duration;

use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use attendcore::config::dispatcher::shutdown_grace;

use crate::conversation::{inbox, Conversation, Delivery, Flow, Mailbox};
use crate::deps::EngineDeps;
use crate::event::{Identity, InboundEvent};
use crate::texts;

/// Routing entry for one live conversation.
struct Slot {
    /// Distinguishes this conversation from a later one in the same chat
    generation: u64,
    mailbox: Mailbox,
    cancel: CancellationToken,
}

pub struct Dispatcher {
    deps: EngineDeps,
    shutdown: CancellationToken,
    drain_grace: Duration,
    slots: HashMap<ChatId, Slot>,
    tasks: JoinSet<(ChatId, u64)>,
    next_generation: u64,
}

impl Dispatcher {
    pub fn new(deps: EngineDeps, shutdown: CancellationToken) -> Self {
        Self {
            deps,
            shutdown,
            drain_grace: shutdown_grace(),
            slots: HashMap::new(),
            tasks: JoinSet::new(),
            next_generation: 0,
        }
    }

    /// Overrides how long shutdown waits for cancelled conversations.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Routes events until shutdown, then cancels and drains conversations.
    pub async fn run(mut self, mut events: mpsc::Receiver<InboundEvent>) {
        log::info!("Dispatcher started");

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    log::info!("Dispatcher received shutdown signal");
                    break;
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.retire(joined);
                }
                event = events.recv() => match event {
                    Some(event) => self.route(event),
                    None => {
                        log::info!("Event source closed, dispatcher stopping");
                        break;
                    }
                },
            }
        }

        events.close();
        self.drain().await;
    }

    fn route(&mut self, event: InboundEvent) {
        let InboundEvent {
            identity,
            display_name,
            text,
        } = event;
        self.deps.registry.remember_name(identity.user_id, &display_name);

        let chat_id = identity.chat_id;
        let start = texts::parse_start(&text);

        if let Some(slot) = self.slots.get(&chat_id) {
            match slot.mailbox.offer(text) {
                Delivery::Delivered => return,
                Delivery::NotAwaiting => {
                    log::debug!("Chat {} is not awaiting input, event discarded", chat_id.0);
                    return;
                }
                Delivery::Full => {
                    log::warn!("Mailbox of chat {} is full, event dropped", chat_id.0);
                    return;
                }
                Delivery::Closed => {
                    // Finished but not retired yet: the chat is free again
                    self.slots.remove(&chat_id);
                }
            }
        }

        match start {
            Some(flow) => self.start(identity, flow),
            None => log::debug!("No conversation in chat {}, event discarded", chat_id.0),
        }
    }

    fn start(&mut self, identity: Identity, flow: Flow) {
        let generation = self.next_generation;
        self.next_generation += 1;

        let (mailbox, inbox) = inbox::channel(self.deps.settings.mailbox_capacity);
        let cancel = self.shutdown.child_token();
        let conversation = Conversation::new(identity, flow, inbox, self.deps.clone());

        let token = cancel.clone();
        self.tasks.spawn(async move {
            let outcome = conversation.drive(token).await;
            (outcome.identity.chat_id, generation)
        });

        self.slots.insert(
            identity.chat_id,
            Slot {
                generation,
                mailbox,
                cancel,
            },
        );
        log::debug!(
            "Spawned {} conversation #{} for chat {} ({} active)",
            flow,
            generation,
            identity.chat_id.0,
            self.slots.len()
        );
    }

    fn retire(&mut self, joined: Result<(ChatId, u64), JoinError>) {
        match joined {
            Ok((chat_id, generation)) => {
                if self
                    .slots
                    .get(&chat_id)
                    .is_some_and(|slot| slot.generation == generation)
                {
                    self.slots.remove(&chat_id);
                }
            }
            Err(e) => {
                log::error!("Conversation task failed: {}", e);
                // The failed task dropped its inbox; its slot is the closed one
                self.slots.retain(|_, slot| !slot.mailbox.is_closed());
            }
        }
    }

    async fn drain(mut self) {
        let active = self.tasks.len();
        for slot in self.slots.values() {
            slot.cancel.cancel();
        }
        self.slots.clear();

        if active > 0 {
            log::info!("Cancelling {} active conversation(s)", active);
        }

        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(self.drain_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            log::warn!(
                "{} conversation(s) still running after {:?}, aborting",
                self.tasks.len(),
                self.drain_grace
            );
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }

        log::info!("Dispatcher stopped");
    }
}
