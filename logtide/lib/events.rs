//! Collector event broadcasting.

use tokio::sync::broadcast;

use crate::models::Issue;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const EVENT_CHANNEL_CAPACITY: usize = 256;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An observable event emitted by the collector.
#[derive(Debug, Clone)]
pub enum CollectorEvent {
    /// A batch of log records was acknowledged by the storage sink.
    RecordsWritten {
        /// The host the records came from.
        host: String,

        /// The container the records belong to.
        container_id: String,

        /// How many records the sink acknowledged.
        count: usize,
    },

    /// A new issue was opened.
    IssueDetected(Issue),

    /// An existing issue recurred or changed.
    IssueUpdated(Issue),
}

/// Fans collector events out to any number of subscribers.
///
/// Delivery is best-effort: a subscriber that falls behind loses the oldest
/// events instead of blocking collection.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CollectorEvent>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribes to all events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<CollectorEvent> {
        self.sender.subscribe()
    }

    /// Emits an event. Without subscribers the event is dropped.
    pub fn emit(&self, event: CollectorEvent) {
        let _ = self.sender.send(event);
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
