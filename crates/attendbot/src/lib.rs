//! attendbot - conversation engine and Telegram front end
//!
//! # Module Structure
//!
//! - `event`: identities and inbound events
//! - `outbound`: outbound message capability and reply markups
//! - `texts`: user-facing texts and keyboard tokens
//! - `session`: display-name cache and active-session registry
//! - `deps`: collaborators shared by conversations
//! - `conversation`: the per-chat dialog state machine
//! - `dispatcher`: routes events to conversations
//! - `telegram`: teloxide integration
//! - `admin`: store administration commands
//! - `cli`: command-line interface
//! - `testing`: test doubles

pub mod admin;
pub mod cli;
pub mod conversation;
pub mod deps;
pub mod dispatcher;
pub mod event;
pub mod outbound;
pub mod session;
pub mod telegram;
pub mod testing;
pub mod texts;

pub use conversation::{Conversation, ConversationError, Flow, Outcome, Step};
pub use deps::{ConversationSettings, EngineDeps};
pub use dispatcher::Dispatcher;
pub use event::{Identity, InboundEvent};
pub use outbound::{Markup, Outbound, Reply};
pub use session::SessionRegistry;
