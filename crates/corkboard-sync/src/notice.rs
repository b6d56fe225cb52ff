//! User-facing notices for failed writes.
//!
//! Controllers publish a [`Notice`] whenever a durable write fails and the
//! cache rolls back. Any number of views can subscribe; with no subscribers
//! notices are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::card::CardId;

/// What kind of write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    WriteFailed,
    CreateFailed,
    DeleteFailed,
}

/// A non-blocking failure message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub card_id: CardId,
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(card_id: CardId, kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            card_id,
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self.kind {
            NoticeKind::WriteFailed => "Could not save card",
            NoticeKind::CreateFailed => "Could not add card",
            NoticeKind::DeleteFailed => "Could not delete card",
        };
        write!(f, "{what} {}: {}", self.card_id, self.message)
    }
}

/// Fan-out of notices to subscribed views.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Publish a notice. Dropped silently when nobody listens.
    pub fn publish(&self, notice: Notice) {
        trace!(card = %notice.card_id, kind = ?notice.kind, "Publishing notice");
        let _ = self.tx.send(notice);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_fine() {
        Notifier::default().publish(Notice::new("a".into(), NoticeKind::WriteFailed, "x"));
    }

    #[test]
    fn subscribers_receive_notices() {
        let notifier = Notifier::new(4);
        let mut rx = notifier.subscribe();
        notifier.publish(Notice::new("a".into(), NoticeKind::DeleteFailed, "offline"));
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.kind, NoticeKind::DeleteFailed);
        assert_eq!(notice.to_string(), "Could not delete card a: offline");
    }
}
