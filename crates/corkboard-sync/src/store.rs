//! The durable storage collaborator.
//!
//! The engine never talks to a database directly. It issues writes and
//! reads through [`CardStore`] and receives change notifications through the
//! [`RemoteFeed`] returned by [`CardStore::subscribe`]. Writes are
//! last-write-wins at the store; ordering between concurrent writes from
//! different clients is the store's business.

use std::future::Future;

use tokio::sync::mpsc;

use crate::card::{BoardId, Card, CardId, CardPatch, RemoteEvent};
use crate::error::Result;

/// Stream of change notifications for one board.
///
/// The feed ends (returns `None`) when the store closes it.
pub type RemoteFeed = mpsc::UnboundedReceiver<RemoteEvent>;

/// Durable card storage with a push channel.
///
/// Implementations are driven from a single-threaded executor, so the
/// returned futures need not be `Send`.
pub trait CardStore {
    /// Every card on `board`.
    fn fetch_cards(&self, board: &BoardId) -> impl Future<Output = Result<Vec<Card>>>;

    /// Create or update a card. Only the fields present in `patch` are
    /// written; a new card needs at least a position. Returns the row as
    /// stored.
    fn upsert_card(&self, id: &CardId, patch: CardPatch) -> impl Future<Output = Result<Card>>;

    /// Delete a card. Deleting a missing card succeeds.
    fn delete_card(&self, id: &CardId) -> impl Future<Output = Result<()>>;

    /// Open the push channel for `board`.
    fn subscribe(&self, board: &BoardId) -> Result<RemoteFeed>;
}
