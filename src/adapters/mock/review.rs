//! Review sink that keeps what it is given.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::review::ModerationEvent;
use crate::traits::ReviewSink;

#[derive(Clone, Default)]
pub struct RecordingReviewSink {
    events: Arc<Mutex<Vec<ModerationEvent>>>,
    notify: Arc<Notify>,
}

impl RecordingReviewSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ModerationEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Wait until at least `count` events were submitted.
    pub async fn wait_for_count(&self, count: usize) -> Vec<ModerationEvent> {
        loop {
            let notified = self.notify.notified();
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ReviewSink for RecordingReviewSink {
    async fn submit(&self, event: ModerationEvent) {
        self.events.lock().unwrap().push(event);
        self.notify.notify_waiters();
    }
}
