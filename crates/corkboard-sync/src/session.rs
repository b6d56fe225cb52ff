//! One client's view of one board.
//!
//! [`BoardSession`] wires the cache, the coordinator and the gesture
//! controllers together around a shared store and exposes the handful of
//! calls a board view needs: render positions, gestures, card lifecycle and
//! change subscriptions.

use std::rc::Rc;

use corkboard_geometry::{AnchorReconciler, BoxOrigin, ContainerSize, CoordinateTransformer, LogicalPoint, PixelDelta, RenderPercent};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::cache::{MergeReport, OptimisticCache};
use crate::card::{BoardId, Card, CardId, CardPatch};
use crate::collapse::CollapseController;
use crate::config::SyncConfig;
use crate::coordinator::RealTimeSyncCoordinator;
use crate::drag::{DragController, DragOutcome};
use crate::error::{Error, Result};
use crate::notice::{Notice, NoticeKind, Notifier};
use crate::store::CardStore;
use crate::write::{spawn_write, WriteHandle, WriteOutcome};

/// A board view's engine.
///
/// Must be driven from within a [`tokio::task::LocalSet`].
pub struct BoardSession<S> {
    store: Rc<S>,
    cache: OptimisticCache,
    transformer: CoordinateTransformer,
    reconciler: AnchorReconciler,
    notifier: Notifier,
    coordinator: RealTimeSyncCoordinator<S>,
    drag: DragController<S>,
    collapse: CollapseController<S>,
}

impl<S> std::fmt::Debug for BoardSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardSession")
            .field("board", &self.cache.board())
            .field("cards", &self.cache.len())
            .field("drag", &self.drag)
            .finish_non_exhaustive()
    }
}

impl<S: CardStore + 'static> BoardSession<S> {
    pub fn new(store: Rc<S>, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let transformer = config.transformer()?;
        let reconciler = config.reconciler();
        let notifier = Notifier::new(config.notice_capacity);
        let cache = OptimisticCache::new();

        Ok(Self {
            coordinator: RealTimeSyncCoordinator::new(Rc::clone(&store), cache.clone()),
            drag: DragController::new(cache.clone(), Rc::clone(&store), transformer, notifier.clone()),
            collapse: CollapseController::new(cache.clone(), Rc::clone(&store), reconciler, notifier.clone()),
            store,
            cache,
            transformer,
            reconciler,
            notifier,
        })
    }

    // --- Board lifecycle ---

    /// Open `board`, replacing whatever board was open.
    pub async fn open(&mut self, board: BoardId) -> Result<MergeReport> {
        self.drag.reset();
        self.coordinator.subscribe(board).await
    }

    /// Close the board. Cached cards, pending writes and parked drags are
    /// dropped.
    pub fn close(&mut self) {
        self.drag.reset();
        self.coordinator.unsubscribe();
    }

    pub async fn resync(&self) -> Result<MergeReport> {
        self.coordinator.resync().await
    }

    pub fn board(&self) -> Option<BoardId> {
        self.cache.board()
    }

    // --- Reads ---

    pub fn cache(&self) -> &OptimisticCache {
        &self.cache
    }

    pub fn card(&self, id: &CardId) -> Option<Card> {
        self.cache.get(id)
    }

    pub fn cards(&self) -> Vec<Card> {
        self.cache.cards()
    }

    /// Where to draw a card, as a percentage of the container.
    ///
    /// Follows the pointer while the card is being dragged.
    pub fn get_render_position(&self, id: &CardId) -> Option<RenderPercent> {
        self.drag.preview_position(id).or_else(|| {
            self.cache
                .with_card(id, |card| self.transformer.render_percent(card.position()))
        })
    }

    /// Top-left corner of a card's box in logical units.
    pub fn render_anchor(&self, id: &CardId) -> Option<BoxOrigin> {
        self.cache.with_card(id, |card| {
            self.reconciler.render_anchor(card.position(), card.is_collapsed)
        })
    }

    /// Revision counter bumped after every visible change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.cache.subscribe_changes()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    // --- Gestures ---

    pub fn set_container_size(&self, size: ContainerSize) -> Vec<(CardId, DragOutcome)> {
        self.drag.set_container_size(size)
    }

    pub fn on_drag_start(&self, id: &CardId) -> Result<()> {
        self.drag.on_drag_start(id)
    }

    pub fn on_drag_move(&self, id: &CardId, delta: PixelDelta) {
        self.drag.on_drag_move(id, delta);
    }

    pub fn on_drag_end(&self, id: &CardId, delta: PixelDelta) -> Result<DragOutcome> {
        self.drag.on_drag_end(id, delta)
    }

    pub fn cancel_drag(&self, id: &CardId) {
        self.drag.cancel_drag(id);
    }

    pub fn toggle(&self, id: &CardId) -> Result<WriteOutcome> {
        self.collapse.toggle(id, None)
    }

    pub fn set_collapsed(&self, id: &CardId, is_collapsed: bool) -> Result<WriteOutcome> {
        self.collapse.set_collapsed(id, is_collapsed)
    }

    // --- Card lifecycle ---

    /// Add an expanded card at `at`, clamped into the board.
    pub fn add_card(&self, at: LogicalPoint, title: impl Into<String>) -> Result<(CardId, WriteHandle)> {
        let board = self.cache.board().ok_or(Error::NoActiveBoard)?;
        let id = CardId::generate();
        let at = self.transformer.clamp(at);
        let card = Card::new(id.clone(), board, at.x, at.y).with_title(title);

        let store = Rc::clone(&self.store);
        let target = id.clone();
        let settle = self
            .cache
            .insert(card, move |patch| async move { store.upsert_card(&target, patch).await })?;
        info!(card = %id, "Card added");
        Ok((id, spawn_write(settle, self.notifier.clone(), NoticeKind::CreateFailed)))
    }

    pub fn delete_card(&self, id: &CardId) -> Result<WriteHandle> {
        self.drag.cancel_drag(id);
        let store = Rc::clone(&self.store);
        let target = id.clone();
        let settle = self
            .cache
            .remove(id, move || async move { store.delete_card(&target).await })?;
        info!(card = %id, "Card deleted");
        Ok(spawn_write(settle, self.notifier.clone(), NoticeKind::DeleteFailed))
    }

    /// Set a card's title. The same title writes nothing.
    pub fn rename(&self, id: &CardId, title: impl Into<String>) -> Result<WriteOutcome> {
        let title = title.into();
        let store = Rc::clone(&self.store);
        let target = id.clone();
        let settle = self.cache.mutate_with(
            id,
            |card| (card.title != title).then(|| CardPatch::title(title.clone())),
            move |patch| {
                let store = Rc::clone(&store);
                let target = target.clone();
                async move { store.upsert_card(&target, patch).await }
            },
        )?;
        Ok(match settle {
            Some(settle) => {
                debug!(card = %id, "Card renamed");
                WriteOutcome::Committed(spawn_write(settle, self.notifier.clone(), NoticeKind::WriteFailed))
            }
            None => WriteOutcome::Unchanged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use tokio::task::LocalSet;

    #[tokio::test]
    async fn open_render_and_close() {
        LocalSet::new()
            .run_until(async {
                let store = Rc::new(MemoryStore::new());
                store.insert_row(Card::new("a".into(), "b".into(), 260, 130).collapsed(true));
                let mut session = BoardSession::new(store, SyncConfig::default()).unwrap();

                assert_eq!(session.open("b".into()).await.unwrap().added, 1);
                let render = session.get_render_position(&"a".into()).unwrap();
                assert_eq!((render.x_percent, render.y_percent), (50.0, 25.0));
                assert_eq!(
                    session.render_anchor(&"a".into()),
                    Some(BoxOrigin { left: 200.0, top: 110.0 })
                );

                session.close();
                assert!(session.cards().is_empty());
                assert!(session.get_render_position(&"a".into()).is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn add_rename_delete() {
        LocalSet::new()
            .run_until(async {
                let store = Rc::new(MemoryStore::new());
                let mut session = BoardSession::new(Rc::clone(&store), SyncConfig::default()).unwrap();
                session.open("b".into()).await.unwrap();

                let (id, handle) = session.add_card(LogicalPoint::new(900, 10), "note").unwrap();
                assert!(handle.await.unwrap().is_ok());
                let row = store.row(&id).unwrap();
                assert_eq!((row.x, row.y, row.title.as_str()), (540, 10, "note"));

                assert!(!session.rename(&id, "note").unwrap().is_committed());
                let handle = session.rename(&id, "todo").unwrap().into_handle().unwrap();
                handle.await.unwrap();
                assert_eq!(store.row(&id).unwrap().title, "todo");

                session.delete_card(&id).unwrap().await.unwrap();
                assert!(store.row(&id).is_none());
                assert!(session.card(&id).is_none());
            })
            .await;
    }

    #[test]
    fn add_without_board_fails() {
        let session = BoardSession::new(Rc::new(MemoryStore::new()), SyncConfig::default()).unwrap();
        assert!(matches!(
            session.add_card(LogicalPoint::ORIGIN, ""),
            Err(Error::NoActiveBoard)
        ));
    }
}
