//! Optimistic card cache.
//!
//! The [`OptimisticCache`] is the single render-truth for the active board.
//! Local mutations land in it synchronously; remote snapshots are merged into
//! it field by field.
//!
//! # Pending Writes
//!
//! Every optimistic mutation gets a sequence number and leaves one
//! [`PendingWrite`] per patched field, recording the value it replaced.
//! Writes to the same field stack up, newest last:
//!
//! - The newest write settling successfully adopts the server's value. With
//!   nothing older in flight the stack is cleared; otherwise the write stays
//!   on the stack marked confirmed, and the field remains protected until the
//!   older writes settle.
//! - The newest write failing pops itself and restores its previous value,
//!   which is the optimistic value of the write beneath it (if any).
//! - An older write settling never touches the card. On failure it hands its
//!   previous value up to the write above it, so a later rollback of that
//!   write lands on the last value the server actually had.
//! - An older write landing after a newer one was confirmed has overwritten
//!   it at the store. Confirmed entries above it are dropped, and if nothing
//!   newer is still in flight the card's value is written again under a
//!   fresh sequence number.
//! - A remote merge never overwrites a field with a non-empty stack. It
//!   rebases the bottom entry's previous value instead, so a rollback lands
//!   on what the server now holds.
//!
//! # Epochs
//!
//! [`OptimisticCache::reset`] and [`OptimisticCache::release`] bump the
//! epoch and drop the pending table. Settlements from an older epoch are
//! detached and change nothing.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::card::{BoardId, Card, CardId, CardPatch, Field, FieldValue, RemoteCard};
use crate::error::{Error, Result};

/// One outstanding optimistic write to one field.
#[derive(Debug, Clone)]
struct PendingWrite {
    seq: u64,
    previous: FieldValue,
    value: FieldValue,
    /// Landed at the store while older writes were still in flight.
    confirmed: bool,
}

impl PendingWrite {
    fn new(seq: u64, previous: FieldValue, value: FieldValue) -> Self {
        Self {
            seq,
            previous,
            value,
            confirmed: false,
        }
    }
}

/// A card deleted locally whose delete has not been confirmed.
#[derive(Debug)]
struct Tombstone {
    seq: u64,
    card: Card,
}

#[derive(Debug, Default)]
struct CacheState {
    board: Option<BoardId>,
    epoch: u64,
    next_seq: u64,
    cards: BTreeMap<CardId, Card>,
    pending: HashMap<CardId, BTreeMap<Field, Vec<PendingWrite>>>,
    creating: HashMap<CardId, u64>,
    tombstones: HashMap<CardId, Tombstone>,
}

impl CacheState {
    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn is_pending(&self, id: &CardId, field: Field) -> bool {
        self.pending
            .get(id)
            .and_then(|fields| fields.get(&field))
            .is_some_and(|stack| !stack.is_empty())
    }

    fn has_pending(&self, id: &CardId) -> bool {
        self.creating.contains_key(id)
            || self
                .pending
                .get(id)
                .is_some_and(|fields| fields.values().any(|stack| !stack.is_empty()))
    }

    fn clear(&mut self) {
        self.cards.clear();
        self.pending.clear();
        self.creating.clear();
        self.tombstones.clear();
    }

    /// Settle one field of write `seq`.
    fn resolve(&mut self, id: &CardId, field: Field, seq: u64, server: Option<&Card>) -> Resolution {
        let Some(fields) = self.pending.get_mut(id) else {
            return Resolution::Superseded;
        };
        let Some(stack) = fields.get_mut(&field) else {
            return Resolution::Superseded;
        };
        let Some(pos) = stack.iter().position(|write| write.seq == seq && !write.confirmed) else {
            return Resolution::Superseded;
        };
        let is_newest = pos + 1 == stack.len();

        let resolution = match (server, is_newest) {
            (Some(server), true) => {
                if pos == 0 {
                    stack.clear();
                } else {
                    stack[pos].confirmed = true;
                }
                let changed = self
                    .cards
                    .get_mut(id)
                    .is_some_and(|card| card.set(server.get(field)));
                Resolution::Confirmed { changed }
            }
            (None, true) => {
                let changed = match stack.pop() {
                    Some(write) => self
                        .cards
                        .get_mut(id)
                        .is_some_and(|card| card.set(write.previous)),
                    None => false,
                };
                Resolution::RolledBack { changed }
            }
            (Some(_), false) => {
                // The store now holds this write's value. Newer writes that
                // already landed were overwritten by it.
                let landed = stack.remove(pos).value;
                let above = stack.split_off(pos);
                stack.extend(above.into_iter().filter(|write| !write.confirmed));
                match stack.get_mut(pos) {
                    Some(next) => {
                        next.previous = landed;
                        Resolution::Superseded
                    }
                    None => Resolution::Overwritten { server: landed },
                }
            }
            (None, false) => {
                let failed = stack.remove(pos);
                // `pos` now indexes the write that sat above the failed one.
                stack[pos].previous = failed.previous;
                Resolution::Superseded
            }
        };

        // A confirmed write with nothing older beneath it is simply settled.
        while stack.first().is_some_and(|write| write.confirmed) {
            stack.remove(0);
        }
        if stack.is_empty() {
            fields.remove(&field);
        }
        if fields.is_empty() {
            self.pending.remove(id);
        }
        resolution
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Confirmed { changed: bool },
    RolledBack { changed: bool },
    Superseded,
    /// An older write replaced a confirmed newer value at the store, which
    /// now holds `server`.
    Overwritten { server: FieldValue },
}

/// A write of the card's current values issued after an older write
/// overwrote them at the store.
#[derive(Debug)]
struct Reassert {
    seq: u64,
    patch: CardPatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeMode {
    Replace,
    Partial,
}

/// How one durable write ended, field by field.
#[derive(Debug)]
pub struct Settlement {
    pub card_id: CardId,
    pub seq: u64,
    /// Fields whose newest write this was, now matching the server.
    pub confirmed: Vec<Field>,
    /// Fields restored to their previous value after a failure.
    pub rolled_back: Vec<Field>,
    /// Fields a newer write (or a reset) took over; left untouched.
    pub superseded: Vec<Field>,
    /// Newer values this write overwrote at the store, written again and
    /// confirmed.
    pub reasserted: Vec<Field>,
    /// The store's error, if the write or its re-assertion failed.
    pub error: Option<Error>,
    /// The cache was reset before the write settled.
    pub detached: bool,
}

impl Settlement {
    fn new(card_id: CardId, seq: u64) -> Self {
        Self {
            card_id,
            seq,
            confirmed: Vec::new(),
            rolled_back: Vec::new(),
            superseded: Vec::new(),
            reasserted: Vec::new(),
            error: None,
            detached: false,
        }
    }

    /// Fold in the outcome of a re-assertion issued by this write.
    fn absorb(&mut self, reassert: Settlement) {
        self.reasserted.extend(reassert.confirmed);
        self.rolled_back.extend(reassert.rolled_back);
        if self.error.is_none() {
            self.error = reassert.error;
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The write failed and at least one field was reverted.
    pub fn is_rolled_back(&self) -> bool {
        !self.rolled_back.is_empty()
    }
}

/// Counts from one remote merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Field values ignored because a local write to that field is pending.
    pub preserved: usize,
    /// Rows dropped as malformed, foreign or locally deleted.
    pub skipped: usize,
}

impl MergeReport {
    /// Nothing visible changed.
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

/// Shared handle to the board's card collection.
///
/// Clones share the same state. Every read-modify-write goes through
/// [`mutate_with`](Self::mutate_with), which computes the patch from the live
/// card inside the same borrow that applies it.
#[derive(Debug, Clone)]
pub struct OptimisticCache {
    inner: Rc<RefCell<CacheState>>,
    changes: Rc<watch::Sender<u64>>,
}

impl Default for OptimisticCache {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimisticCache {
    /// An empty cache with no active board.
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Rc::new(RefCell::new(CacheState::default())),
            changes: Rc::new(changes),
        }
    }

    /// An empty cache for `board`.
    pub fn for_board(board: BoardId) -> Self {
        let cache = Self::new();
        cache.reset(board);
        cache
    }

    // --- Reads ---

    /// Current card state, including optimistic writes.
    pub fn get(&self, id: &CardId) -> Option<Card> {
        self.inner.borrow().cards.get(id).cloned()
    }

    /// Read a card without cloning it.
    pub fn with_card<R>(&self, id: &CardId, f: impl FnOnce(&Card) -> R) -> Option<R> {
        self.inner.borrow().cards.get(id).map(f)
    }

    /// All cards, ordered by id.
    pub fn cards(&self) -> Vec<Card> {
        self.inner.borrow().cards.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().cards.is_empty()
    }

    pub fn board(&self) -> Option<BoardId> {
        self.inner.borrow().board.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.inner.borrow().epoch
    }

    /// Fields of `id` with an unconfirmed local write.
    pub fn pending_fields(&self, id: &CardId) -> Vec<Field> {
        let state = self.inner.borrow();
        Field::ALL
            .into_iter()
            .filter(|field| state.is_pending(id, *field))
            .collect()
    }

    /// `id` has an unconfirmed write, create or delete.
    pub fn has_pending(&self, id: &CardId) -> bool {
        let state = self.inner.borrow();
        state.has_pending(id) || state.tombstones.contains_key(id)
    }

    /// Number of cards with unconfirmed writes.
    pub fn pending_count(&self) -> usize {
        let state = self.inner.borrow();
        let mut ids: HashSet<&CardId> = state.pending.keys().collect();
        ids.extend(state.creating.keys());
        ids.extend(state.tombstones.keys());
        ids.len()
    }

    // --- Change notification ---

    /// Receiver that observes a new revision after every visible change.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    fn notify(&self) {
        self.changes.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    // --- Lifecycle ---

    /// Switch to `board`: drop all cards and pending state.
    pub fn reset(&self, board: BoardId) {
        {
            let mut state = self.inner.borrow_mut();
            state.clear();
            state.epoch += 1;
            debug!(board = %board, epoch = state.epoch, "Cache reset");
            state.board = Some(board);
        }
        self.notify();
    }

    /// Leave the board: drop all cards and the pending-operation table.
    pub fn release(&self) {
        {
            let mut state = self.inner.borrow_mut();
            state.clear();
            state.epoch += 1;
            debug!(epoch = state.epoch, "Cache released");
            state.board = None;
        }
        self.notify();
    }

    // --- Local mutations ---

    /// Apply `patch` now and settle it when `commit` resolves.
    ///
    /// The patch is applied and recorded before this returns; `commit` is
    /// called with the patch to start the durable write. The returned future
    /// awaits the write and reconciles the outcome; it must be driven for the
    /// pending record to clear. `commit` is called again if the write has to
    /// re-assert a newer value it overwrote.
    pub fn mutate<F, Fut>(
        &self,
        id: &CardId,
        patch: CardPatch,
        commit: F,
    ) -> Result<impl Future<Output = Settlement> + 'static>
    where
        F: Fn(CardPatch) -> Fut + 'static,
        Fut: Future<Output = Result<Card>> + 'static,
    {
        if patch.is_empty() {
            return Err(Error::EmptyPatch(id.clone()));
        }
        self.mutate_with(id, move |_| Some(patch), commit)?
            .ok_or_else(|| Error::EmptyPatch(id.clone()))
    }

    /// Like [`mutate`](Self::mutate), with the patch computed from the live
    /// card.
    ///
    /// `build` runs inside the same borrow that applies its result, so it can
    /// never see a card older than the cache. Returning `None` (or an empty
    /// patch) writes nothing and yields `Ok(None)`.
    pub fn mutate_with<B, F, Fut>(
        &self,
        id: &CardId,
        build: B,
        commit: F,
    ) -> Result<Option<impl Future<Output = Settlement> + 'static>>
    where
        B: FnOnce(&Card) -> Option<CardPatch>,
        F: Fn(CardPatch) -> Fut + 'static,
        Fut: Future<Output = Result<Card>> + 'static,
    {
        let (epoch, seq, patch) = {
            let mut guard = self.inner.borrow_mut();
            let state = &mut *guard;
            let Some(card) = state.cards.get_mut(id) else {
                return Err(Error::CardNotFound(id.clone()));
            };
            let patch = match build(&*card) {
                Some(patch) if !patch.is_empty() => patch,
                _ => return Ok(None),
            };

            let previous: Vec<FieldValue> = patch.fields().into_iter().map(|f| card.get(f)).collect();
            patch.apply_to(card);
            let values: Vec<FieldValue> = previous.iter().map(|value| card.get(value.field())).collect();

            let seq = state.bump_seq();
            let fields = state.pending.entry(id.clone()).or_default();
            for (value, next) in previous.into_iter().zip(values) {
                let superseding = fields.get(&value.field()).is_some_and(|stack| !stack.is_empty());
                if superseding {
                    trace!(card = %id, field = %value.field(), seq, "Superseding in-flight write");
                }
                fields
                    .entry(value.field())
                    .or_default()
                    .push(PendingWrite::new(seq, value, next));
            }
            (state.epoch, seq, patch)
        };

        self.notify();
        let fields = patch.fields();
        debug!(card = %id, seq, fields = ?fields, "Applied optimistic mutation");

        let write = commit(patch);
        let cache = self.clone();
        let id = id.clone();
        Ok(Some(async move {
            let (mut settlement, mut reassert) = cache.settle(&id, epoch, seq, &fields, write.await);
            while let Some(Reassert { seq, patch }) = reassert.take() {
                let fields = patch.fields();
                let result = commit(patch).await;
                let (again, next) = cache.settle(&id, epoch, seq, &fields, result);
                settlement.absorb(again);
                reassert = next;
            }
            settlement
        }))
    }

    fn settle(
        &self,
        id: &CardId,
        epoch: u64,
        seq: u64,
        fields: &[Field],
        result: Result<Card>,
    ) -> (Settlement, Option<Reassert>) {
        let mut settlement = Settlement::new(id.clone(), seq);
        let mut changed = false;
        let mut reassert = None;
        {
            let mut guard = self.inner.borrow_mut();
            let state = &mut *guard;
            if state.epoch != epoch {
                settlement.detached = true;
                settlement.superseded = fields.to_vec();
            } else {
                let server = result.as_ref().ok();
                let mut overwritten = Vec::new();
                for &field in fields {
                    match state.resolve(id, field, seq, server) {
                        Resolution::Confirmed { changed: c } => {
                            changed |= c;
                            settlement.confirmed.push(field);
                        }
                        Resolution::RolledBack { changed: c } => {
                            changed |= c;
                            settlement.rolled_back.push(field);
                        }
                        Resolution::Superseded => settlement.superseded.push(field),
                        Resolution::Overwritten { server: landed } => {
                            settlement.superseded.push(field);
                            overwritten.push(landed);
                        }
                    }
                }
                let current = state.cards.get(id).map(|card| {
                    overwritten
                        .into_iter()
                        .map(|landed| (card.get(landed.field()), landed))
                        .filter(|(value, landed)| value != landed)
                        .collect::<Vec<_>>()
                });
                if let Some(lost) = current.filter(|lost| !lost.is_empty()) {
                    let patch: CardPatch = lost.iter().map(|(value, _)| value.clone()).collect();
                    let next = state.bump_seq();
                    let stacks = state.pending.entry(id.clone()).or_default();
                    for (value, landed) in lost {
                        stacks
                            .entry(value.field())
                            .or_default()
                            .push(PendingWrite::new(next, landed, value));
                    }
                    debug!(card = %id, seq, reassert = next, fields = ?patch.fields(), "Older write overwrote a newer one; re-asserting");
                    reassert = Some(Reassert { seq: next, patch });
                }
            }
        }
        settlement.error = result.err();

        if settlement.detached {
            debug!(card = %id, seq, "Write settled after cache reset; ignored");
        } else if let Some(err) = &settlement.error {
            warn!(
                card = %id,
                seq,
                rolled_back = ?settlement.rolled_back,
                superseded = ?settlement.superseded,
                error = %err,
                "Durable write failed"
            );
        } else {
            trace!(
                card = %id,
                seq,
                confirmed = ?settlement.confirmed,
                superseded = ?settlement.superseded,
                "Durable write confirmed"
            );
        }

        if changed {
            self.notify();
        }
        (settlement, reassert)
    }

    /// Add a card now and settle it when `commit` resolves.
    ///
    /// `commit` receives a patch carrying every field. On failure the card is
    /// removed again unless it was deleted in the meantime.
    pub fn insert<F, Fut>(
        &self,
        card: Card,
        commit: F,
    ) -> Result<impl Future<Output = Settlement> + 'static>
    where
        F: FnOnce(CardPatch) -> Fut,
        Fut: Future<Output = Result<Card>> + 'static,
    {
        let (epoch, seq) = {
            let mut guard = self.inner.borrow_mut();
            let state = &mut *guard;
            let Some(board) = state.board.as_ref() else {
                return Err(Error::NoActiveBoard);
            };
            if card.board_id != *board {
                return Err(Error::BoardMismatch {
                    expected: board.clone(),
                    actual: card.board_id.clone(),
                });
            }
            if state.cards.contains_key(&card.id) || state.tombstones.contains_key(&card.id) {
                return Err(Error::CardExists(card.id.clone()));
            }
            let seq = state.bump_seq();
            state.creating.insert(card.id.clone(), seq);
            state.cards.insert(card.id.clone(), card.clone());
            (state.epoch, seq)
        };

        self.notify();
        debug!(card = %card.id, seq, x = card.x, y = card.y, "Inserted optimistic card");

        let write = commit(CardPatch::full(&card));
        let cache = self.clone();
        let id = card.id;
        Ok(async move {
            let result = write.await;
            cache.settle_insert(&id, epoch, seq, result)
        })
    }

    fn settle_insert(&self, id: &CardId, epoch: u64, seq: u64, result: Result<Card>) -> Settlement {
        let mut settlement = Settlement::new(id.clone(), seq);
        let mut changed = false;
        {
            let mut guard = self.inner.borrow_mut();
            let state = &mut *guard;
            let current = state.epoch == epoch && state.creating.get(id) == Some(&seq);
            if !current {
                settlement.detached = state.epoch != epoch;
                settlement.superseded = Field::ALL.to_vec();
            } else {
                state.creating.remove(id);
                match &result {
                    Ok(server) => {
                        for field in Field::ALL {
                            if state.is_pending(id, field) {
                                settlement.superseded.push(field);
                                continue;
                            }
                            if let Some(card) = state.cards.get_mut(id) {
                                changed |= card.set(server.get(field));
                            }
                            settlement.confirmed.push(field);
                        }
                    }
                    Err(_) => {
                        state.pending.remove(id);
                        changed = state.cards.remove(id).is_some();
                        settlement.rolled_back = Field::ALL.to_vec();
                    }
                }
            }
        }
        settlement.error = result.err();

        match &settlement.error {
            Some(err) if settlement.is_rolled_back() => {
                warn!(card = %id, seq, error = %err, "Card creation failed; removed");
            }
            Some(err) => debug!(card = %id, seq, error = %err, "Superseded creation failed"),
            None => trace!(card = %id, seq, "Card creation confirmed"),
        }

        if changed {
            self.notify();
        }
        settlement
    }

    /// Remove a card now and settle it when `commit` resolves.
    ///
    /// Until the delete settles the card is tombstoned so a snapshot that
    /// still lists it cannot bring it back. On failure it is restored.
    pub fn remove<F, Fut>(
        &self,
        id: &CardId,
        commit: F,
    ) -> Result<impl Future<Output = Settlement> + 'static>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>> + 'static,
    {
        let (epoch, seq) = {
            let mut guard = self.inner.borrow_mut();
            let state = &mut *guard;
            let Some(card) = state.cards.remove(id) else {
                return Err(Error::CardNotFound(id.clone()));
            };
            state.pending.remove(id);
            state.creating.remove(id);
            let seq = state.bump_seq();
            state.tombstones.insert(id.clone(), Tombstone { seq, card });
            (state.epoch, seq)
        };

        self.notify();
        debug!(card = %id, seq, "Removed card optimistically");

        let write = commit();
        let cache = self.clone();
        let id = id.clone();
        Ok(async move {
            let result = write.await;
            cache.settle_remove(&id, epoch, seq, result)
        })
    }

    fn settle_remove(&self, id: &CardId, epoch: u64, seq: u64, result: Result<()>) -> Settlement {
        let mut settlement = Settlement::new(id.clone(), seq);
        let mut changed = false;
        {
            let mut guard = self.inner.borrow_mut();
            let state = &mut *guard;
            let current = state.epoch == epoch
                && state.tombstones.get(id).is_some_and(|stone| stone.seq == seq);
            if !current {
                settlement.detached = state.epoch != epoch;
                settlement.superseded = Field::ALL.to_vec();
            } else if let Some(stone) = state.tombstones.remove(id) {
                if result.is_ok() {
                    settlement.confirmed = Field::ALL.to_vec();
                } else {
                    state.cards.entry(id.clone()).or_insert(stone.card);
                    settlement.rolled_back = Field::ALL.to_vec();
                    changed = true;
                }
            }
        }
        settlement.error = result.err();

        match &settlement.error {
            Some(err) => warn!(card = %id, seq, error = %err, "Card delete failed; restored"),
            None => trace!(card = %id, seq, "Card delete confirmed"),
        }

        if changed {
            self.notify();
        }
        settlement
    }

    // --- Remote merges ---

    /// Merge the authoritative card set for the active board.
    ///
    /// Per field: a pending local write wins, otherwise the remote value
    /// does; a missing remote field changes nothing. Remote-only cards are
    /// added; local-only cards with nothing pending are removed.
    pub fn replace_from_remote(
        &self,
        cards: impl IntoIterator<Item = RemoteCard>,
    ) -> Result<MergeReport> {
        self.merge(cards, MergeMode::Replace)
    }

    /// Merge changed rows without removing anything.
    pub fn merge_partial(&self, cards: impl IntoIterator<Item = RemoteCard>) -> Result<MergeReport> {
        self.merge(cards, MergeMode::Partial)
    }

    fn merge(
        &self,
        rows: impl IntoIterator<Item = RemoteCard>,
        mode: MergeMode,
    ) -> Result<MergeReport> {
        let report = {
            let mut guard = self.inner.borrow_mut();
            let state = &mut *guard;
            let board = state.board.clone().ok_or(Error::NoActiveBoard)?;
            let mut report = MergeReport::default();
            let mut seen: HashSet<CardId> = HashSet::new();

            for row in rows {
                if row.board_id.as_ref().is_some_and(|b| *b != board) {
                    report.skipped += 1;
                    continue;
                }
                seen.insert(row.id.clone());
                if state.tombstones.contains_key(&row.id) {
                    report.skipped += 1;
                    continue;
                }

                match state.cards.get_mut(&row.id) {
                    Some(card) => {
                        let mut changed = false;
                        for value in row.values() {
                            let stack = state
                                .pending
                                .get_mut(&row.id)
                                .and_then(|fields| fields.get_mut(&value.field()))
                                .filter(|stack| !stack.is_empty());
                            match stack {
                                Some(stack) => {
                                    // The server moved on underneath the write; a
                                    // rollback must land on the new server value.
                                    stack[0].previous = value;
                                    report.preserved += 1;
                                }
                                None => changed |= card.set(value),
                            }
                        }
                        if changed {
                            report.updated += 1;
                        }
                    }
                    None => {
                        let id = row.id.clone();
                        match row.into_card(&board) {
                            Some(card) => {
                                state.cards.insert(id, card);
                                report.added += 1;
                            }
                            None => {
                                warn!(card = %id, "Remote row without a position; skipped");
                                report.skipped += 1;
                            }
                        }
                    }
                }
            }

            if mode == MergeMode::Replace {
                let stale: Vec<CardId> = state
                    .cards
                    .keys()
                    .filter(|id| !seen.contains(*id) && !state.has_pending(id))
                    .cloned()
                    .collect();
                for id in stale {
                    state.cards.remove(&id);
                    report.removed += 1;
                }
            }
            report
        };

        trace!(?mode, ?report, "Merged remote rows");
        if !report.is_noop() {
            self.notify();
        }
        Ok(report)
    }

    /// Apply remote deletions. Cards with a pending local write are kept.
    pub fn remove_from_remote(&self, ids: impl IntoIterator<Item = CardId>) -> Result<MergeReport> {
        let report = {
            let mut guard = self.inner.borrow_mut();
            let state = &mut *guard;
            if state.board.is_none() {
                return Err(Error::NoActiveBoard);
            }
            let mut report = MergeReport::default();
            for id in ids {
                if state.has_pending(&id) {
                    report.preserved += 1;
                } else if state.cards.remove(&id).is_some() {
                    report.removed += 1;
                } else {
                    report.skipped += 1;
                }
            }
            report
        };

        trace!(?report, "Applied remote removals");
        if !report.is_noop() {
            self.notify();
        }
        Ok(report)
    }
}
