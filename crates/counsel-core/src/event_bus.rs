//! View event broadcasting.
//!
//! The chat view publishes what happens to it (status changes, each revealed
//! chunk of a reply, resets) on an [`EventBus`]. Front ends subscribe and
//! render; the view never writes to a terminal itself.
//!
//! # Example
//!
//! ```rust
//! use counsel_core::event_bus::{EventBus, ViewEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.emit(ViewEvent::ConversationReset);
//! assert_eq!(rx.try_recv().unwrap(), ViewEvent::ConversationReset);
//! ```

use serde::Serialize;
use tokio::sync::broadcast;

use crate::view::ViewStatus;

/// Default channel capacity for the event bus.
/// A subscriber further behind than this misses events (lag).
const DEFAULT_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ViewEvent {
    /// The submission status changed.
    StatusChanged { status: ViewStatus },

    /// The displayed reply was cleared ahead of a new one.
    ReplyCleared,

    /// Text appended to the displayed reply by the typewriter.
    ReplyDelta { text: String },

    /// The displayed reply is final: the full reply, or the fallback message.
    ReplyComplete { text: String },

    /// A running reveal was stopped before finishing.
    RevealCancelled,

    /// Conversation, context and reply were cleared.
    ConversationReset,
}

/// Broadcast channel for [`ViewEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<ViewEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it. With no
    /// subscribers the event is dropped.
    pub fn emit(&self, event: ViewEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
