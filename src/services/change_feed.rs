//! In-process change feed backing the realtime SSE endpoints.
//!
//! Writers publish after their transaction commits; slow subscribers that
//! fall behind the channel capacity lose the oldest events.

use tokio::sync::broadcast;

use crate::domain::realtime::ChangeEvent;

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let name = event.event_name();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = %name, receivers, "Change published"),
            Err(_) => tracing::trace!(event = %name, "Change dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
