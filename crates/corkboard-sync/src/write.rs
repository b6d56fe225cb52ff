//! Background settlement of optimistic writes.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::cache::Settlement;
use crate::notice::{Notice, NoticeKind, Notifier};

/// Handle to a write settling in the background.
///
/// Awaiting it is optional; the cache is reconciled either way.
pub type WriteHandle = JoinHandle<Settlement>;

/// Result of a gesture that may or may not need a durable write.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The card already had the requested value; nothing was written.
    Unchanged,
    Committed(WriteHandle),
}

impl WriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn into_handle(self) -> Option<WriteHandle> {
        match self {
            Self::Unchanged => None,
            Self::Committed(handle) => Some(handle),
        }
    }
}

/// Drive `settle` on the local executor and publish a notice if the write
/// was rolled back.
pub(crate) fn spawn_write<F>(settle: F, notifier: Notifier, kind: NoticeKind) -> WriteHandle
where
    F: Future<Output = Settlement> + 'static,
{
    tokio::task::spawn_local(async move {
        let settlement = settle.await;
        if settlement.is_rolled_back() {
            if let Some(err) = &settlement.error {
                notifier.publish(Notice::new(settlement.card_id.clone(), kind, err.to_string()));
            }
        }
        settlement
    })
}
