//! In-process [`CardStore`] for tests, demos and the simulator.
//!
//! Rows live in a `BTreeMap`; every write is pushed to the board's feeds as
//! a full snapshot. Writes can be delayed, failed on demand, or held until
//! the caller releases them one by one, which is how interleavings between
//! concurrent writes are reproduced deterministically.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::card::{BoardId, Card, CardId, CardPatch, RemoteEvent};
use crate::error::{Error, Result};
use crate::store::{CardStore, RemoteFeed};

/// Behaviour knobs for [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Delay applied to every read and write.
    pub latency: Duration,
    /// Push a snapshot to subscribers after each write.
    pub echo_writes: bool,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            echo_writes: true,
        }
    }
}

/// How a held write should end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteVerdict {
    Commit,
    Fail(String),
}

#[derive(Debug)]
struct HeldWrite {
    card_id: CardId,
    verdict: oneshot::Sender<WriteVerdict>,
}

/// A single-process card table with a push channel.
#[derive(Debug, Default)]
pub struct MemoryStore {
    config: MemoryStoreConfig,
    rows: RefCell<BTreeMap<CardId, Card>>,
    feeds: RefCell<Vec<(BoardId, mpsc::UnboundedSender<RemoteEvent>)>>,
    fail_next: Cell<usize>,
    hold: Cell<bool>,
    held: RefCell<Vec<HeldWrite>>,
    writes: Cell<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    // --- Test controls ---

    /// Fail the next `count` writes with a store error.
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_next.set(count);
    }

    /// While enabled, writes wait for [`release_write`](Self::release_write).
    pub fn hold_writes(&self, hold: bool) {
        self.hold.set(hold);
    }

    /// Card ids of writes currently held, in arrival order.
    pub fn held_writes(&self) -> Vec<CardId> {
        self.held.borrow().iter().map(|w| w.card_id.clone()).collect()
    }

    /// Yield until at least `count` writes are held.
    pub async fn wait_for_held(&self, count: usize) {
        while self.held.borrow().len() < count {
            tokio::task::yield_now().await;
        }
    }

    /// Settle the `index`-th held write. Returns `false` if there is none.
    pub fn release_write(&self, index: usize, verdict: WriteVerdict) -> bool {
        let mut held = self.held.borrow_mut();
        if index >= held.len() {
            return false;
        }
        let write = held.remove(index);
        trace!(card = %write.card_id, ?verdict, "Releasing held write");
        write.verdict.send(verdict).is_ok()
    }

    /// Settle every held write with the same verdict.
    pub fn release_all(&self, verdict: WriteVerdict) -> usize {
        let held: Vec<HeldWrite> = self.held.borrow_mut().drain(..).collect();
        let count = held.len();
        for write in held {
            let _ = write.verdict.send(verdict.clone());
        }
        count
    }

    // --- Direct table access ---

    /// Seed a row without notifying anyone.
    pub fn insert_row(&self, card: Card) {
        self.rows.borrow_mut().insert(card.id.clone(), card);
    }

    /// Write a row as another client would, then push a snapshot.
    pub fn update_row(&self, id: &CardId, patch: CardPatch) -> Result<Card> {
        let card = self.write_row(id, patch)?;
        self.publish_snapshot(&card.board_id);
        Ok(card)
    }

    /// Delete every card on a board, as a cascading board delete would.
    pub fn remove_board(&self, board: &BoardId) -> usize {
        let ids: Vec<CardId> = {
            let mut rows = self.rows.borrow_mut();
            let ids: Vec<CardId> = rows
                .values()
                .filter(|card| card.board_id == *board)
                .map(|card| card.id.clone())
                .collect();
            for id in &ids {
                rows.remove(id);
            }
            ids
        };
        debug!(board = %board, removed = ids.len(), "Board removed");
        let count = ids.len();
        self.push_raw(RemoteEvent::Removed {
            board_id: board.clone(),
            ids,
        });
        count
    }

    /// Deliver an arbitrary event to the board's subscribers.
    pub fn push_raw(&self, event: RemoteEvent) {
        let board = event.board_id().clone();
        self.feeds.borrow_mut().retain(|(feed_board, tx)| {
            if *feed_board == board {
                tx.send(event.clone()).is_ok()
            } else {
                !tx.is_closed()
            }
        });
    }

    /// Push the current rows of `board` as a snapshot.
    pub fn publish_snapshot(&self, board: &BoardId) {
        self.push_raw(RemoteEvent::snapshot(board.clone(), self.rows(board)));
    }

    pub fn row(&self, id: &CardId) -> Option<Card> {
        self.rows.borrow().get(id).cloned()
    }

    pub fn rows(&self, board: &BoardId) -> Vec<Card> {
        self.rows
            .borrow()
            .values()
            .filter(|card| card.board_id == *board)
            .cloned()
            .collect()
    }

    /// Writes that reached the table.
    pub fn write_count(&self) -> u64 {
        self.writes.get()
    }

    /// Open feeds for `board`.
    pub fn feed_count(&self, board: &BoardId) -> usize {
        self.feeds
            .borrow()
            .iter()
            .filter(|(b, tx)| b == board && !tx.is_closed())
            .count()
    }

    // --- Internals ---

    async fn delay(&self) {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
    }

    async fn gate(&self, id: &CardId) -> Result<()> {
        self.delay().await;

        if self.hold.get() {
            let (tx, rx) = oneshot::channel();
            self.held.borrow_mut().push(HeldWrite {
                card_id: id.clone(),
                verdict: tx,
            });
            match rx.await {
                Ok(WriteVerdict::Commit) => {}
                Ok(WriteVerdict::Fail(reason)) => return Err(Error::Store(reason)),
                Err(_) => return Err(Error::Store("held write abandoned".into())),
            }
        }

        let failures = self.fail_next.get();
        if failures > 0 {
            self.fail_next.set(failures - 1);
            return Err(Error::Store("injected failure".into()));
        }
        Ok(())
    }

    fn write_row(&self, id: &CardId, patch: CardPatch) -> Result<Card> {
        let card = {
            let mut rows = self.rows.borrow_mut();
            match rows.get_mut(id) {
                Some(card) => {
                    patch.apply_to(card);
                    card.clone()
                }
                None => {
                    let board = patch.board_id.clone().ok_or_else(|| Error::Rejected {
                        id: id.clone(),
                        reason: "new card needs a board".into(),
                    })?;
                    let card = patch.into_card(id.clone(), board).ok_or_else(|| Error::Rejected {
                        id: id.clone(),
                        reason: "new card needs a position".into(),
                    })?;
                    rows.insert(id.clone(), card.clone());
                    card
                }
            }
        };
        self.writes.set(self.writes.get() + 1);
        Ok(card)
    }
}

impl CardStore for MemoryStore {
    async fn fetch_cards(&self, board: &BoardId) -> Result<Vec<Card>> {
        self.delay().await;
        Ok(self.rows(board))
    }

    async fn upsert_card(&self, id: &CardId, patch: CardPatch) -> Result<Card> {
        self.gate(id).await?;
        let card = self.write_row(id, patch)?;
        trace!(card = %id, x = card.x, y = card.y, collapsed = card.is_collapsed, "Row written");
        if self.config.echo_writes {
            self.publish_snapshot(&card.board_id);
        }
        Ok(card)
    }

    async fn delete_card(&self, id: &CardId) -> Result<()> {
        self.gate(id).await?;
        let removed = self.rows.borrow_mut().remove(id);
        if let Some(card) = removed {
            self.writes.set(self.writes.get() + 1);
            trace!(card = %id, "Row deleted");
            if self.config.echo_writes {
                self.publish_snapshot(&card.board_id);
            }
        }
        Ok(())
    }

    fn subscribe(&self, board: &BoardId) -> Result<RemoteFeed> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.borrow_mut().push((board.clone(), tx));
        debug!(board = %board, "Feed opened");
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    fn board() -> BoardId {
        BoardId::new("b")
    }

    #[tokio::test]
    async fn create_needs_a_position() {
        let store = MemoryStore::new();
        let patch = CardPatch {
            board_id: Some(board()),
            ..CardPatch::collapsed(true)
        };
        let err = store.upsert_card(&"a".into(), patch).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));

        let card = Card::new("a".into(), board(), 1, 2);
        let stored = store.upsert_card(&card.id, CardPatch::full(&card)).await.unwrap();
        assert_eq!(stored, card);
    }

    #[tokio::test]
    async fn partial_update_touches_only_listed_fields() {
        let store = MemoryStore::new();
        store.insert_row(Card::new("a".into(), board(), 1, 2).with_title("t"));
        let stored = store
            .upsert_card(&"a".into(), CardPatch::collapsed(true))
            .await
            .unwrap();
        assert_eq!((stored.x, stored.y, stored.title.as_str()), (1, 2, "t"));
        assert!(stored.is_collapsed);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn writes_echo_snapshots_to_the_board() {
        let store = MemoryStore::new();
        store.insert_row(Card::new("a".into(), board(), 1, 2));
        let mut feed = store.subscribe(&board()).unwrap();
        let mut other = store.subscribe(&"other".into()).unwrap();

        store.upsert_card(&"a".into(), CardPatch::title("new")).await.unwrap();

        match feed.try_recv().unwrap() {
            RemoteEvent::Snapshot { cards, .. } => {
                assert_eq!(cards.len(), 1);
                assert_eq!(cards[0].title.as_deref(), Some("new"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn injected_failures_are_counted_down() {
        let store = MemoryStore::new();
        store.insert_row(Card::new("a".into(), board(), 0, 0));
        store.fail_next_writes(1);
        assert!(store.upsert_card(&"a".into(), CardPatch::title("x")).await.is_err());
        assert!(store.upsert_card(&"a".into(), CardPatch::title("x")).await.is_ok());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.insert_row(Card::new("a".into(), board(), 0, 0));
        store.delete_card(&"a".into()).await.unwrap();
        store.delete_card(&"a".into()).await.unwrap();
        assert!(store.row(&"a".into()).is_none());
    }

    #[tokio::test]
    async fn remove_board_cascades() {
        let store = MemoryStore::new();
        store.insert_row(Card::new("a".into(), board(), 0, 0));
        store.insert_row(Card::new("b".into(), board(), 0, 0));
        store.insert_row(Card::new("c".into(), "other".into(), 0, 0));
        let mut feed = store.subscribe(&board()).unwrap();

        assert_eq!(store.remove_board(&board()), 2);
        assert!(store.rows(&board()).is_empty());
        assert_eq!(store.rows(&"other".into()).len(), 1);
        assert!(matches!(feed.try_recv().unwrap(), RemoteEvent::Removed { ids, .. } if ids.len() == 2));
    }

    #[tokio::test]
    async fn held_writes_settle_in_release_order() {
        LocalSet::new()
            .run_until(async {
                let store = Rc::new(MemoryStore::new());
                store.insert_row(Card::new("a".into(), board(), 0, 0));
                store.hold_writes(true);

                let s1 = Rc::clone(&store);
                let first = tokio::task::spawn_local(async move {
                    s1.upsert_card(&"a".into(), CardPatch::title("first")).await
                });
                store.wait_for_held(1).await;
                let s2 = Rc::clone(&store);
                let second = tokio::task::spawn_local(async move {
                    s2.upsert_card(&"a".into(), CardPatch::title("second")).await
                });
                store.wait_for_held(2).await;
                assert_eq!(store.held_writes().len(), 2);

                assert!(store.release_write(1, WriteVerdict::Commit));
                assert_eq!(second.await.unwrap().unwrap().title, "second");
                assert!(store.release_write(0, WriteVerdict::Fail("boom".into())));
                assert!(first.await.unwrap().is_err());
                assert_eq!(store.row(&"a".into()).unwrap().title, "second");
            })
            .await;
    }

    #[test]
    fn closed_feeds_are_pruned() {
        let store = MemoryStore::new();
        let feed = store.subscribe(&board()).unwrap();
        assert_eq!(store.feed_count(&board()), 1);
        drop(feed);
        store.publish_snapshot(&board());
        assert_eq!(store.feed_count(&board()), 0);
    }
}
