//! Drag gestures.
//!
//! A drag is previewed locally while the pointer moves and committed once,
//! on release. The committed position is computed from the card as the
//! cache holds it at release time, never from a copy taken when the drag
//! started, so a collapse toggle or remote update that landed mid-drag is
//! never overwritten. Only `x` and `y` are written.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use corkboard_geometry::{ContainerSize, CoordinateTransformer, PixelDelta, RenderPercent};
use tracing::{debug, warn};

use crate::cache::OptimisticCache;
use crate::card::{CardId, CardPatch};
use crate::error::{Error, Result};
use crate::notice::{NoticeKind, Notifier};
use crate::store::CardStore;
use crate::write::{spawn_write, WriteHandle};

/// What a drag release did.
#[derive(Debug)]
pub enum DragOutcome {
    /// Zero movement, or the clamped target equals the current position.
    Unchanged,
    /// The container has not been measured; the drag is kept and committed
    /// by the next [`DragController::set_container_size`].
    Deferred,
    Committed(WriteHandle),
}

impl DragOutcome {
    pub fn into_handle(self) -> Option<WriteHandle> {
        match self {
            Self::Committed(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Turns pointer drags into position writes.
pub struct DragController<S> {
    cache: OptimisticCache,
    store: Rc<S>,
    transformer: CoordinateTransformer,
    notifier: Notifier,
    container: Cell<ContainerSize>,
    sessions: RefCell<HashMap<CardId, PixelDelta>>,
    deferred: RefCell<BTreeMap<CardId, PixelDelta>>,
}

impl<S> std::fmt::Debug for DragController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragController")
            .field("container", &self.container.get())
            .field("dragging", &self.sessions.borrow().len())
            .field("deferred", &self.deferred.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<S: CardStore + 'static> DragController<S> {
    pub fn new(
        cache: OptimisticCache,
        store: Rc<S>,
        transformer: CoordinateTransformer,
        notifier: Notifier,
    ) -> Self {
        Self {
            cache,
            store,
            transformer,
            notifier,
            container: Cell::new(ContainerSize::UNMEASURED),
            sessions: RefCell::new(HashMap::new()),
            deferred: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn container_size(&self) -> ContainerSize {
        self.container.get()
    }

    /// Record a new container size and commit drags parked while it was
    /// unmeasured.
    pub fn set_container_size(&self, size: ContainerSize) -> Vec<(CardId, DragOutcome)> {
        self.container.set(size);
        if !size.is_measured() {
            return Vec::new();
        }

        let parked = std::mem::take(&mut *self.deferred.borrow_mut());
        let mut outcomes = Vec::with_capacity(parked.len());
        for (id, delta) in parked {
            match self.commit(&id, delta, size) {
                Ok(outcome) => outcomes.push((id, outcome)),
                Err(err) => warn!(card = %id, error = %err, "Dropping deferred drag"),
            }
        }
        outcomes
    }

    pub fn on_drag_start(&self, id: &CardId) -> Result<()> {
        if self.cache.with_card(id, |_| ()).is_none() {
            return Err(Error::CardNotFound(id.clone()));
        }
        self.sessions.borrow_mut().insert(id.clone(), PixelDelta::ZERO);
        Ok(())
    }

    /// Update the preview. Never writes.
    pub fn on_drag_move(&self, id: &CardId, delta: PixelDelta) {
        if let Some(current) = self.sessions.borrow_mut().get_mut(id) {
            *current = delta;
        }
    }

    /// Abandon a drag without writing.
    pub fn cancel_drag(&self, id: &CardId) {
        self.sessions.borrow_mut().remove(id);
    }

    /// Drop drags in progress and drags parked for measurement. The
    /// container size is kept.
    pub fn reset(&self) {
        let dragging = std::mem::take(&mut *self.sessions.borrow_mut()).len();
        let parked = std::mem::take(&mut *self.deferred.borrow_mut()).len();
        if dragging + parked > 0 {
            debug!(dragging, parked, "Drag state dropped");
        }
    }

    pub fn is_dragging(&self, id: &CardId) -> bool {
        self.sessions.borrow().contains_key(id)
    }

    pub fn is_deferred(&self, id: &CardId) -> bool {
        self.deferred.borrow().contains_key(id)
    }

    /// Commit a drag of `delta` pixels.
    ///
    /// A release while the container is unmeasured parks the delta. A second
    /// release for the same card replaces the parked delta, since both are
    /// relative to the same stored position.
    pub fn on_drag_end(&self, id: &CardId, delta: PixelDelta) -> Result<DragOutcome> {
        self.sessions.borrow_mut().remove(id);
        if delta.is_zero() {
            return Ok(DragOutcome::Unchanged);
        }

        let container = self.container.get();
        if !container.is_measured() {
            if self.cache.with_card(id, |_| ()).is_none() {
                return Err(Error::CardNotFound(id.clone()));
            }
            warn!(card = %id, ?container, "Container not measured; deferring drag");
            self.deferred.borrow_mut().insert(id.clone(), delta);
            return Ok(DragOutcome::Deferred);
        }
        self.commit(id, delta, container)
    }

    /// Render position of a card being dragged, or `None` if it is not.
    pub fn preview_position(&self, id: &CardId) -> Option<RenderPercent> {
        let delta = *self.sessions.borrow().get(id)?;
        let from = self.cache.with_card(id, |card| card.position())?;
        let container = self.container.get();
        if !container.is_measured() {
            return Some(self.transformer.render_percent(from));
        }
        self.transformer.preview_percent(from, delta, container).ok()
    }

    fn commit(&self, id: &CardId, delta: PixelDelta, container: ContainerSize) -> Result<DragOutcome> {
        let logical = self.transformer.to_logical_delta(delta, container)?;
        let transformer = self.transformer;
        let store = Rc::clone(&self.store);
        let target = id.clone();

        let settle = self.cache.mutate_with(
            id,
            |card| {
                let from = card.position();
                let to = transformer.clamp(from.offset(logical));
                if to == from {
                    return None;
                }
                debug!(card = %card.id, %from, %to, "Drag committed");
                Some(CardPatch::position(to))
            },
            move |patch| {
                let store = Rc::clone(&store);
                let target = target.clone();
                async move { store.upsert_card(&target, patch).await }
            },
        )?;

        Ok(match settle {
            Some(settle) => DragOutcome::Committed(spawn_write(
                settle,
                self.notifier.clone(),
                NoticeKind::WriteFailed,
            )),
            None => DragOutcome::Unchanged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{BoardId, Card, RemoteCard};
    use crate::memory::MemoryStore;
    use corkboard_geometry::{LogicalPoint, LogicalSpace};
    use tokio::task::LocalSet;

    fn setup(cards: &[Card]) -> (Rc<MemoryStore>, OptimisticCache, DragController<MemoryStore>) {
        let store = Rc::new(MemoryStore::new());
        for card in cards {
            store.insert_row(card.clone());
        }
        let cache = OptimisticCache::for_board(BoardId::new("b"));
        cache
            .replace_from_remote(cards.iter().cloned().map(RemoteCard::from))
            .unwrap();
        let transformer = CoordinateTransformer::new(LogicalSpace::default()).unwrap();
        let drag = DragController::new(cache.clone(), Rc::clone(&store), transformer, Notifier::default());
        (store, cache, drag)
    }

    fn card(x: i32, y: i32) -> Card {
        Card::new("a".into(), "b".into(), x, y)
    }

    #[tokio::test]
    async fn drag_writes_scaled_position() {
        LocalSet::new()
            .run_until(async {
                let (store, cache, drag) = setup(&[card(300, 200)]);
                drag.set_container_size(ContainerSize::new(1040.0, 1040.0));

                drag.on_drag_start(&"a".into()).unwrap();
                drag.on_drag_move(&"a".into(), PixelDelta::new(40.0, 0.0));
                assert!(drag.preview_position(&"a".into()).is_some());
                assert_eq!(store.write_count(), 0);

                let handle = drag
                    .on_drag_end(&"a".into(), PixelDelta::new(100.0, 0.0))
                    .unwrap()
                    .into_handle()
                    .unwrap();
                assert_eq!(cache.get(&"a".into()).unwrap().position(), LogicalPoint::new(350, 200));
                assert!(handle.await.unwrap().is_ok());
                assert_eq!(store.row(&"a".into()).unwrap().x, 350);
                assert!(!drag.is_dragging(&"a".into()));
            })
            .await;
    }

    #[tokio::test]
    async fn zero_and_clamped_drags_write_nothing() {
        LocalSet::new()
            .run_until(async {
                let (store, _cache, drag) = setup(&[card(540, -20)]);
                drag.set_container_size(ContainerSize::new(520.0, 520.0));

                assert!(matches!(
                    drag.on_drag_end(&"a".into(), PixelDelta::ZERO).unwrap(),
                    DragOutcome::Unchanged
                ));
                assert!(matches!(
                    drag.on_drag_end(&"a".into(), PixelDelta::new(50.0, -50.0)).unwrap(),
                    DragOutcome::Unchanged
                ));
                assert_eq!(store.write_count(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn unmeasured_container_defers_until_measured() {
        LocalSet::new()
            .run_until(async {
                let (store, cache, drag) = setup(&[card(0, 0)]);

                let outcome = drag.on_drag_end(&"a".into(), PixelDelta::new(52.0, 52.0)).unwrap();
                assert!(matches!(outcome, DragOutcome::Deferred));
                assert!(drag.is_deferred(&"a".into()));
                assert_eq!(cache.get(&"a".into()).unwrap().position(), LogicalPoint::ORIGIN);

                let mut flushed = drag.set_container_size(ContainerSize::new(520.0, 520.0));
                assert_eq!(flushed.len(), 1);
                let handle = flushed.remove(0).1.into_handle().unwrap();
                handle.await.unwrap();
                assert_eq!(store.row(&"a".into()).unwrap().position(), LogicalPoint::new(52, 52));
                assert!(!drag.is_deferred(&"a".into()));
            })
            .await;
    }

    #[tokio::test]
    async fn failed_drag_rolls_back_and_notifies() {
        LocalSet::new()
            .run_until(async {
                let (store, cache, drag) = setup(&[card(10, 10)]);
                let mut notices = drag.notifier.subscribe();
                drag.set_container_size(ContainerSize::new(520.0, 520.0));
                store.fail_next_writes(1);

                let handle = drag
                    .on_drag_end(&"a".into(), PixelDelta::new(20.0, 0.0))
                    .unwrap()
                    .into_handle()
                    .unwrap();
                let settlement = handle.await.unwrap();
                assert!(settlement.is_rolled_back());
                assert_eq!(cache.get(&"a".into()).unwrap().position(), LogicalPoint::new(10, 10));
                assert_eq!(notices.try_recv().unwrap().kind, NoticeKind::WriteFailed);
            })
            .await;
    }

    #[test]
    fn unknown_card_cannot_start_a_drag() {
        let (_store, _cache, drag) = setup(&[]);
        assert!(matches!(drag.on_drag_start(&"zz".into()), Err(Error::CardNotFound(_))));
    }

    #[tokio::test]
    async fn reset_drops_parked_and_active_drags() {
        LocalSet::new()
            .run_until(async {
                let (store, cache, drag) = setup(&[card(100, 100)]);
                drag.on_drag_start(&"a".into()).unwrap();
                drag.on_drag_move(&"a".into(), PixelDelta::new(10.0, 0.0));
                assert!(matches!(
                    drag.on_drag_end(&"a".into(), PixelDelta::new(200.0, 0.0)).unwrap(),
                    DragOutcome::Deferred
                ));
                drag.on_drag_start(&"a".into()).unwrap();

                drag.reset();
                assert!(!drag.is_deferred(&"a".into()));
                assert!(!drag.is_dragging(&"a".into()));
                assert!(drag.preview_position(&"a".into()).is_none());

                assert!(drag.set_container_size(ContainerSize::new(520.0, 520.0)).is_empty());
                assert_eq!(store.write_count(), 0);
                assert_eq!(cache.get(&"a".into()).unwrap().position(), LogicalPoint::new(100, 100));
            })
            .await;
    }
}
