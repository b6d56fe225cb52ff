//! Real-time board subscription.
//!
//! The [`RealTimeSyncCoordinator`] owns the push channel for the active
//! board. On subscribe it resets the cache, opens the feed, loads the
//! initial card set and spawns a pump that merges every later event into
//! the cache. Events always go through the merge rules, so an echo of an
//! older write never overwrites a newer optimistic value.

use std::rc::Rc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{MergeReport, OptimisticCache};
use crate::card::{BoardId, RemoteCard, RemoteEvent};
use crate::error::{Error, Result};
use crate::store::{CardStore, RemoteFeed};

#[derive(Debug)]
struct ActiveBoard {
    board: BoardId,
    pump: JoinHandle<()>,
}

/// Keeps the cache in sync with one board at a time.
///
/// Must be used from within a [`tokio::task::LocalSet`]; the pump is spawned
/// with [`tokio::task::spawn_local`].
pub struct RealTimeSyncCoordinator<S> {
    store: Rc<S>,
    cache: OptimisticCache,
    active: Option<ActiveBoard>,
}

impl<S> std::fmt::Debug for RealTimeSyncCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealTimeSyncCoordinator")
            .field("board", &self.active.as_ref().map(|a| &a.board))
            .finish_non_exhaustive()
    }
}

impl<S: CardStore + 'static> RealTimeSyncCoordinator<S> {
    pub fn new(store: Rc<S>, cache: OptimisticCache) -> Self {
        Self {
            store,
            cache,
            active: None,
        }
    }

    pub fn cache(&self) -> &OptimisticCache {
        &self.cache
    }

    /// The board currently subscribed to.
    pub fn board(&self) -> Option<&BoardId> {
        self.active.as_ref().map(|active| &active.board)
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.as_ref().is_some_and(|active| !active.pump.is_finished())
    }

    /// Subscribe to `board`, replacing any previous subscription.
    ///
    /// The feed is opened before the initial fetch so no change between the
    /// two is lost. Returns the report of the initial merge.
    pub async fn subscribe(&mut self, board: BoardId) -> Result<MergeReport> {
        self.unsubscribe();
        self.cache.reset(board.clone());

        let feed = match self.store.subscribe(&board) {
            Ok(feed) => feed,
            Err(err) => {
                self.cache.release();
                return Err(err);
            }
        };
        let cards = match self.store.fetch_cards(&board).await {
            Ok(cards) => cards,
            Err(err) => {
                self.cache.release();
                return Err(err);
            }
        };
        let report = self
            .cache
            .replace_from_remote(cards.into_iter().map(RemoteCard::from))?;

        let pump = tokio::task::spawn_local(pump(
            self.cache.clone(),
            board.clone(),
            self.cache.epoch(),
            feed,
        ));
        info!(board = %board, cards = self.cache.len(), "Subscribed to board");
        self.active = Some(ActiveBoard { board, pump });
        Ok(report)
    }

    /// Stop receiving events and drop all cached state for the board.
    ///
    /// Writes still in flight settle against a newer epoch and are ignored.
    pub fn unsubscribe(&mut self) {
        if let Some(active) = self.active.take() {
            active.pump.abort();
            self.cache.release();
            info!(board = %active.board, "Unsubscribed from board");
        }
    }

    /// Merge one event for the subscribed board, as the pump does.
    pub fn apply(&self, event: RemoteEvent) -> Result<MergeReport> {
        let board = self.board().ok_or(Error::NoActiveBoard)?;
        apply_event(&self.cache, board, event)
    }

    /// Re-fetch the board and merge it as a snapshot.
    pub async fn resync(&self) -> Result<MergeReport> {
        let board = self.board().cloned().ok_or(Error::NoActiveBoard)?;
        let epoch = self.cache.epoch();
        let cards = self.store.fetch_cards(&board).await?;
        if self.cache.epoch() != epoch {
            debug!(board = %board, "Board changed during resync; dropped");
            return Ok(MergeReport::default());
        }
        self.cache
            .replace_from_remote(cards.into_iter().map(RemoteCard::from))
    }
}

impl<S> Drop for RealTimeSyncCoordinator<S> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.pump.abort();
        }
    }
}

/// Merge one remote event into the cache.
///
/// Events for another board are ignored.
pub fn apply_event(cache: &OptimisticCache, board: &BoardId, event: RemoteEvent) -> Result<MergeReport> {
    if event.board_id() != board {
        debug!(expected = %board, actual = %event.board_id(), "Event for another board; ignored");
        return Ok(MergeReport::default());
    }
    match event {
        RemoteEvent::Snapshot { cards, .. } => cache.replace_from_remote(cards),
        RemoteEvent::Upsert { cards, .. } => cache.merge_partial(cards),
        RemoteEvent::Removed { ids, .. } => cache.remove_from_remote(ids),
    }
}

async fn pump(cache: OptimisticCache, board: BoardId, epoch: u64, mut feed: RemoteFeed) {
    while let Some(event) = feed.recv().await {
        if cache.epoch() != epoch {
            debug!(board = %board, "Cache moved to another board; stopping feed");
            return;
        }
        if let Err(err) = apply_event(&cache, &board, event) {
            warn!(board = %board, error = %err, "Failed to apply remote event");
        }
    }
    warn!(board = %board, "Remote feed closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Card, CardPatch};
    use crate::memory::MemoryStore;
    use tokio::task::LocalSet;

    fn board() -> BoardId {
        BoardId::new("b")
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn subscribe_loads_and_follows_the_board() {
        LocalSet::new()
            .run_until(async {
                let store = Rc::new(MemoryStore::new());
                store.insert_row(Card::new("a".into(), board(), 1, 1));
                store.insert_row(Card::new("x".into(), "other".into(), 1, 1));

                let mut coordinator = RealTimeSyncCoordinator::new(Rc::clone(&store), OptimisticCache::new());
                let report = coordinator.subscribe(board()).await.unwrap();
                assert_eq!(report.added, 1);
                assert!(coordinator.is_subscribed());

                store.update_row(&"a".into(), CardPatch::collapsed(true)).unwrap();
                settle().await;
                assert!(coordinator.cache().get(&"a".into()).unwrap().is_collapsed);
            })
            .await;
    }

    #[tokio::test]
    async fn unsubscribe_stops_merging() {
        LocalSet::new()
            .run_until(async {
                let store = Rc::new(MemoryStore::new());
                store.insert_row(Card::new("a".into(), board(), 1, 1));
                let cache = OptimisticCache::new();
                let mut coordinator = RealTimeSyncCoordinator::new(Rc::clone(&store), cache.clone());
                coordinator.subscribe(board()).await.unwrap();

                coordinator.unsubscribe();
                assert!(cache.is_empty());
                assert!(cache.board().is_none());

                store.update_row(&"a".into(), CardPatch::title("late")).unwrap();
                settle().await;
                assert!(cache.is_empty());
                assert_eq!(store.feed_count(&board()), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn switching_boards_resets_the_cache() {
        LocalSet::new()
            .run_until(async {
                let store = Rc::new(MemoryStore::new());
                store.insert_row(Card::new("a".into(), board(), 1, 1));
                store.insert_row(Card::new("z".into(), "second".into(), 2, 2));
                let mut coordinator = RealTimeSyncCoordinator::new(Rc::clone(&store), OptimisticCache::new());

                coordinator.subscribe(board()).await.unwrap();
                coordinator.subscribe("second".into()).await.unwrap();
                let ids: Vec<_> = coordinator.cache().cards().into_iter().map(|c| c.id).collect();
                assert_eq!(ids, vec![crate::card::CardId::new("z")]);

                // Events for the old board no longer reach the cache.
                store.update_row(&"a".into(), CardPatch::title("stale")).unwrap();
                settle().await;
                assert!(coordinator.cache().get(&"a".into()).is_none());
            })
            .await;
    }

    #[test]
    fn foreign_events_are_ignored() {
        let cache = OptimisticCache::for_board(board());
        let event = RemoteEvent::snapshot("other".into(), [Card::new("q".into(), "other".into(), 0, 0)]);
        let report = apply_event(&cache, &board(), event).unwrap();
        assert!(report.is_noop());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn apply_dispatches_by_event_kind() {
        LocalSet::new()
            .run_until(async {
                let store = Rc::new(MemoryStore::new());
                store.insert_row(Card::new("a".into(), board(), 1, 1));
                store.insert_row(Card::new("b".into(), board(), 2, 2));
                let mut coordinator = RealTimeSyncCoordinator::new(Rc::clone(&store), OptimisticCache::new());
                coordinator.subscribe(board()).await.unwrap();

                let upsert = RemoteEvent::Upsert {
                    board_id: board(),
                    cards: vec![RemoteCard::from(Card::new("c".into(), board(), 3, 3))],
                };
                assert_eq!(coordinator.apply(upsert).unwrap().added, 1);
                assert_eq!(coordinator.cache().len(), 3);

                let removed = RemoteEvent::Removed {
                    board_id: board(),
                    ids: vec!["a".into()],
                };
                assert_eq!(coordinator.apply(removed).unwrap().removed, 1);

                let snapshot = RemoteEvent::snapshot(board(), [Card::new("b".into(), board(), 9, 9)]);
                let report = coordinator.apply(snapshot).unwrap();
                assert_eq!((report.updated, report.removed), (1, 1));
                assert_eq!(coordinator.cache().get(&"b".into()).unwrap().x, 9);
            })
            .await;
    }

    #[tokio::test]
    async fn resync_requires_a_board() {
        let coordinator = RealTimeSyncCoordinator::new(Rc::new(MemoryStore::new()), OptimisticCache::new());
        assert!(matches!(coordinator.resync().await, Err(Error::NoActiveBoard)));
    }
}
