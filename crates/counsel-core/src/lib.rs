//! # counsel-core
//!
//! Core logic for counsel, a chat front end for a legal-advice assistant.
//!
//! This crate is framework-agnostic. The terminal client in `counsel-cli`
//! drives it, but nothing here touches stdin/stdout.
//!
//! ## Key Concepts
//!
//! - **Turn**: One message from the user or the assistant
//! - **Context**: The first question of a conversation, resent with every follow-up
//! - **ChatView**: The submission state machine (idle / submitting / failed)
//! - **SessionStorage**: Session-scoped key-value storage that survives a restart

pub mod backend;
pub mod config;
pub mod conversation;
pub mod event_bus;
pub mod launcher;
pub mod logging;
pub mod paths;
pub mod prompts;
pub mod reveal;
pub mod session;
pub mod speech;
pub mod storage;
pub mod view;

// Re-export commonly used types
pub use backend::{Backend, BackendError, HttpBackend};
pub use config::Config;
pub use conversation::{Conversation, Role, Turn};
pub use event_bus::{EventBus, ViewEvent};
pub use prompts::{FollowUp, FollowUpAction};
pub use session::SessionId;
pub use view::{ChatView, SubmitOutcome, ViewStatus};
