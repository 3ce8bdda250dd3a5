use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

/// A transient user-visible banner (success green / error red).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Holds at most one active notice. Notices auto-clear once the configured
/// TTL has elapsed; they never block further interaction.
#[derive(Clone)]
pub struct NoticeBoard {
    inner: Arc<Mutex<Option<(Notice, Instant)>>>,
    ttl: Duration,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            ttl,
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.raise(NoticeKind::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.raise(NoticeKind::Error, message.into());
    }

    fn raise(&self, kind: NoticeKind, message: String) {
        let mut slot = self.inner.lock().unwrap();
        *slot = Some((Notice { kind, message }, Instant::now()));
    }

    /// The currently visible notice, if any. Expired notices are dropped.
    pub fn current(&self) -> Option<Notice> {
        let mut slot = self.inner.lock().unwrap();
        match slot.as_ref() {
            Some((_, raised_at)) if raised_at.elapsed() >= self.ttl => {
                *slot = None;
                None
            }
            Some((notice, _)) => Some(notice.clone()),
            None => None,
        }
    }
}
