//! Auto-expiring notifications.
//!
//! Every notification owns its own timer. When a timer fires it reports the
//! id it was armed for, so an expiry can only ever clear the notification
//! that created it.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;

pub type NotificationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub level: Level,
    pub message: String,
    /// The job the causing event was about, if any.
    pub job_id: Option<String>,
}

pub struct Notifier {
    ttl: Duration,
    next_id: NotificationId,
    active: Vec<Notification>,
    timers: HashMap<NotificationId, JoinHandle<()>>,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_id: 1,
            active: Vec::new(),
            timers: HashMap::new(),
        }
    }

    /// Show a notification and arm its timer. `on_expire` runs once, after the
    /// ttl, unless the notification is dismissed first. Must be called from
    /// inside a tokio runtime.
    pub fn push<F>(
        &mut self,
        level: Level,
        message: impl Into<String>,
        job_id: Option<String>,
        on_expire: F,
    ) -> NotificationId
    where
        F: FnOnce(NotificationId) + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        self.active.push(Notification {
            id,
            level,
            message: message.into(),
            job_id,
        });

        let ttl = self.ttl;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            on_expire(id);
        });
        self.timers.insert(id, timer);
        id
    }

    /// Clear a notification whose timer fired. Returns false if it was
    /// already dismissed.
    pub fn expire(&mut self, id: NotificationId) -> bool {
        self.timers.remove(&id);
        self.remove(id)
    }

    /// Clear a notification early and cancel its timer.
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        if let Some(timer) = self.timers.remove(&id) {
            timer.abort();
        }
        self.remove(id)
    }

    pub fn dismiss_latest(&mut self) -> bool {
        match self.active.last().map(|n| n.id) {
            Some(id) => self.dismiss(id),
            None => false,
        }
    }

    pub fn active(&self) -> &[Notification] {
        &self.active
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Drop every notification and cancel every pending timer.
    pub fn clear(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        self.active.clear();
    }

    fn remove(&mut self, id: NotificationId) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        self.active.len() != before
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.clear();
    }
}
