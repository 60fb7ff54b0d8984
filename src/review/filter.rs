//! Account-age gate in front of a review sink.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::ModerationEvent;
use crate::traits::{AccountDirectory, ReviewSink};

/// Logins whose creation time is remembered before the oldest is dropped.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Creation times by login, evicted oldest first.
#[derive(Debug)]
struct CreationCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, Option<DateTime<Utc>>>,
}

impl CreationCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn get(&self, login: &str) -> Option<Option<DateTime<Utc>>> {
        self.entries.get(login).copied()
    }

    fn insert(&mut self, login: &str, created: Option<DateTime<Utc>>) {
        if self.entries.insert(login.to_string(), created).is_some() {
            return;
        }
        self.order.push_back(login.to_string());
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

/// Forwards an event only when the chatter's account is younger than
/// `min_age`.
///
/// Creation dates never change, so each login is looked up once while it
/// stays in a bounded cache. A failed
/// lookup forwards the event: a missed review is worse than an extra one.
pub struct AccountAgeFilter<S> {
    inner: S,
    directory: Arc<dyn AccountDirectory>,
    min_age: Duration,
    created_at: Mutex<CreationCache>,
}

impl<S: ReviewSink> AccountAgeFilter<S> {
    pub fn new(inner: S, directory: Arc<dyn AccountDirectory>, min_age: Duration) -> Self {
        Self {
            inner,
            directory,
            min_age,
            created_at: Mutex::new(CreationCache::new(DEFAULT_CACHE_CAPACITY)),
        }
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.created_at = Mutex::new(CreationCache::new(capacity));
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Cached creation time for `login`, looking it up on first use.
    async fn lookup(&self, login: &str) -> Result<Option<DateTime<Utc>>, crate::error::ApiError> {
        if let Some(cached) = self.created_at.lock().await.get(login) {
            return Ok(cached);
        }
        let created = self.directory.account_created_at(login).await?;
        self.created_at
            .lock()
            .await
            .insert(login, created);
        Ok(created)
    }

    fn is_young(&self, created: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match (now - created).to_std() {
            Ok(age) => age < self.min_age,
            // Created "in the future": clock skew, treat as brand new.
            Err(_) => true,
        }
    }
}

#[async_trait]
impl<S: ReviewSink> ReviewSink for AccountAgeFilter<S> {
    async fn submit(&self, event: ModerationEvent) {
        let forward = match self.lookup(&event.chatter_login).await {
            Ok(Some(created)) => self.is_young(created, event.received_at),
            Ok(None) => {
                debug!(login = %event.chatter_login, "Account not found, forwarding");
                true
            }
            Err(e) => {
                warn!(login = %event.chatter_login, error = %e, "Account lookup failed, forwarding");
                true
            }
        };

        if forward {
            self.inner.submit(event).await;
        } else {
            debug!(login = %event.chatter_login, "Account old enough, skipping review");
        }
    }
}
