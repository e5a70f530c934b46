//! Event system for scheduler progress
//!
//! In-process event bus over `tokio::sync::broadcast`. The engines emit as
//! they go; embedding applications subscribe for live updates. Emitting with
//! no subscribers drops the event, and lagging subscribers never block the
//! scheduler.
//!
//! # Example
//!
//! ```no_run
//! use libpostpilot::service::events::{EventBus, Event};
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(Event::PostClaimed {
//!     post_id: "abc123".to_string(),
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::service::publish::PlatformOutcome;
use crate::types::PostStatus;

/// Event receiver type alias
pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the specified capacity
    ///
    /// The capacity determines how many events can be buffered per subscriber
    /// before older events are dropped (if the subscriber is lagging).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive all events emitted after this call
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: Event) {
        // send() only fails when nobody is listening
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// This process won the claim on a due post
    PostClaimed { post_id: String },

    /// Fan-out finished and the outcome was persisted
    PostPublished {
        post_id: String,
        status: PostStatus,
        outcomes: Vec<PlatformOutcome>,
        error_message: Option<String>,
    },

    /// A reply was posted and its reservation completed
    CommentReplied {
        post_id: String,
        comment_id: String,
        platform: String,
        response_id: Option<String>,
    },

    /// Both phases of a tick ran
    TickCompleted {
        due: usize,
        claimed: usize,
        replies_posted: usize,
    },
}
