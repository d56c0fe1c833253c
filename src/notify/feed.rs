use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::models::notification::Notification;
use crate::notify::classify::RECENCY_WINDOW_HOURS;

pub const DEFAULT_FEED_CAPACITY: usize = 10;

// Newest-first ring of operational notifications with append-if-new
// semantics. The seen set outlives feed eviction so a capped-out key cannot
// re-enter while its underlying change is still inside the recency window.
pub struct NotificationFeed {
    entries: VecDeque<Notification>,
    seen: HashMap<String, DateTime<Utc>>,
    capacity: usize,
}

impl NotificationFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            seen: HashMap::new(),
            capacity,
        }
    }

    pub fn append_if_new(&mut self, notification: Notification, now: DateTime<Utc>) -> bool {
        self.prune_seen(now);

        if self.seen.contains_key(&notification.id) {
            return false;
        }

        self.seen.insert(notification.id.clone(), now);
        self.entries.push_front(notification);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }

        true
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|n| !n.read).count()
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.entries.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for notification in &mut self.entries {
            notification.read = true;
        }
    }

    fn prune_seen(&mut self, now: DateTime<Utc>) {
        self.seen
            .retain(|_, first_seen| {
                now.signed_duration_since(*first_seen) <= Duration::hours(RECENCY_WINDOW_HOURS)
            });
    }
}
