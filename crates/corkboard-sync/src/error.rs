//! Error types for corkboard-sync.

use thiserror::Error;

use crate::card::{BoardId, CardId};

/// Result type for corkboard-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while mutating or synchronizing a board.
#[derive(Debug, Error)]
pub enum Error {
    /// The card is not in the cache (or the store).
    #[error("card not found: {0}")]
    CardNotFound(CardId),

    /// A card with this id already exists.
    #[error("card already exists: {0}")]
    CardExists(CardId),

    /// A mutation carried no fields.
    #[error("empty patch for card {0}")]
    EmptyPatch(CardId),

    /// No board is currently open.
    #[error("no active board")]
    NoActiveBoard,

    /// A card or event belongs to a different board than the active one.
    #[error("board mismatch: expected {expected}, got {actual}")]
    BoardMismatch { expected: BoardId, actual: BoardId },

    /// The storage collaborator failed (network, timeout, unavailable).
    #[error("store error: {0}")]
    Store(String),

    /// The storage collaborator refused the write.
    #[error("write rejected for card {id}: {reason}")]
    Rejected { id: CardId, reason: String },

    /// The push channel closed underneath a subscription.
    #[error("push channel closed for board {0}")]
    FeedClosed(BoardId),

    /// Coordinate conversion failed.
    #[error("geometry error: {0}")]
    Geometry(#[from] corkboard_geometry::GeometryError),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Failures that a later identical write could plausibly get past.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_) | Self::FeedClosed(_))
    }
}
