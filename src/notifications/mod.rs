//! Process-wide toast queue.
//!
//! Editors publish short success/error messages; each one is removed
//! automatically after the configured delay. Nothing is persisted.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Wall-clock milliseconds, bumped when two publishes share a millisecond.
    pub id: i64,
    pub message: String,
    pub kind: NotificationKind,
}

#[derive(Clone)]
pub struct NotificationChannel {
    queue: Arc<Mutex<Vec<Notification>>>,
    last_id: Arc<AtomicI64>,
    ttl: Duration,
}

impl NotificationChannel {
    pub fn new(ttl: Duration) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Vec::new())),
            last_id: Arc::new(AtomicI64::new(0)),
            ttl,
        }
    }

    fn next_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_id.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last_id
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// Append a message and schedule its removal. Returns the message id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn publish(&self, message: impl Into<String>, kind: NotificationKind) -> i64 {
        let notification = Notification {
            id: self.next_id(),
            message: message.into(),
            kind,
        };
        let id = notification.id;

        match kind {
            NotificationKind::Success => tracing::info!("Notification {}: {}", id, notification.message),
            NotificationKind::Error => tracing::warn!("Notification {}: {}", id, notification.message),
        }

        if let Ok(mut queue) = self.queue.lock() {
            queue.push(notification);
        }

        let channel = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(channel.ttl).await;
            channel.dismiss(id);
        });

        id
    }

    pub fn success(&self, message: impl Into<String>) -> i64 {
        self.publish(message, NotificationKind::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> i64 {
        self.publish(message, NotificationKind::Error)
    }

    /// Remove one message; returns whether it was still queued.
    pub fn dismiss(&self, id: i64) -> bool {
        let Ok(mut queue) = self.queue.lock() else {
            return false;
        };
        let before = queue.len();
        queue.retain(|n| n.id != id);
        queue.len() != before
    }

    /// Queued messages in publish order.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.queue.lock().map(|q| q.clone()).unwrap_or_default()
    }
}
