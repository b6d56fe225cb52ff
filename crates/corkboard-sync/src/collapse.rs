//! Collapse toggles.

use std::future::Future;
use std::rc::Rc;

use corkboard_geometry::AnchorReconciler;
use tracing::debug;

use crate::cache::{OptimisticCache, Settlement};
use crate::card::{CardId, CardPatch};
use crate::error::Result;
use crate::notice::{NoticeKind, Notifier};
use crate::store::CardStore;
use crate::write::{spawn_write, WriteHandle, WriteOutcome};

/// Flips cards between collapsed and expanded.
///
/// The write carries `is_collapsed` and, only when the anchor convention
/// demands it, an adjusted position. Under center anchoring a toggle never
/// touches `x` or `y`.
pub struct CollapseController<S> {
    cache: OptimisticCache,
    store: Rc<S>,
    reconciler: AnchorReconciler,
    notifier: Notifier,
}

impl<S> std::fmt::Debug for CollapseController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollapseController")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

impl<S: CardStore + 'static> CollapseController<S> {
    pub fn new(cache: OptimisticCache, store: Rc<S>, reconciler: AnchorReconciler, notifier: Notifier) -> Self {
        Self {
            cache,
            store,
            reconciler,
            notifier,
        }
    }

    /// Toggle `id`, or set it to `explicit` when given.
    ///
    /// The current state is read from the cache at call time. Setting a card
    /// to the state it already has writes nothing.
    pub fn toggle(&self, id: &CardId, explicit: Option<bool>) -> Result<WriteOutcome> {
        let reconciler = self.reconciler;
        let store = Rc::clone(&self.store);
        let target = id.clone();

        let settle = self.cache.mutate_with(
            id,
            |card| {
                let next = explicit.unwrap_or(!card.is_collapsed);
                if next == card.is_collapsed {
                    return None;
                }
                let mut patch = CardPatch::collapsed(next);
                let stored = card.position();
                let adjusted = reconciler.apply(stored, card.is_collapsed, next);
                if adjusted != stored {
                    patch = patch.with_position(adjusted);
                }
                debug!(card = %card.id, collapsed = next, moved = adjusted != stored, "Toggle committed");
                Some(patch)
            },
            move |patch| {
                let store = Rc::clone(&store);
                let target = target.clone();
                async move { store.upsert_card(&target, patch).await }
            },
        )?;

        Ok(match settle {
            Some(settle) => WriteOutcome::Committed(self.spawn(settle)),
            None => WriteOutcome::Unchanged,
        })
    }

    pub fn set_collapsed(&self, id: &CardId, is_collapsed: bool) -> Result<WriteOutcome> {
        self.toggle(id, Some(is_collapsed))
    }

    fn spawn(&self, settle: impl Future<Output = Settlement> + 'static) -> WriteHandle {
        spawn_write(settle, self.notifier.clone(), NoticeKind::WriteFailed)
    }
}
