//! Corkboard Sync
//!
//! Optimistic, conflict-aware synchronization of card state for a shared
//! idea board.
//!
//! # Architecture
//!
//! ```text
//!   pointer / clicks               push channel
//!         │                             │
//!         ▼                             ▼
//!   DragController             RealTimeSyncCoordinator
//!   CollapseController                  │ merge
//!         │ mutate                      ▼
//!         └──────────────────► OptimisticCache ──► render
//!                                       │ commit
//!                                       ▼
//!                                   CardStore
//! ```
//!
//! Every local mutation is applied to the [`OptimisticCache`] before the
//! durable write starts, and the write only ever carries the fields the
//! gesture changed. Remote snapshots are merged field by field: a field with
//! an unconfirmed local write keeps its local value until that write
//! settles, so a stale echo can never undo a newer edit.
//!
//! # Concurrency
//!
//! The engine is single-threaded. State lives behind `Rc<RefCell<_>>`,
//! background work is spawned with [`tokio::task::spawn_local`], and no
//! borrow is held across an await point. Drive it from a
//! [`tokio::task::LocalSet`].

mod cache;
mod card;
mod collapse;
mod config;
mod coordinator;
mod drag;
mod error;
mod memory;
mod notice;
mod session;
mod store;
mod write;

pub use cache::{MergeReport, OptimisticCache, Settlement};
pub use card::{
    BoardId, Card, CardId, CardPatch, Field, FieldGroup, FieldValue, RemoteCard, RemoteEvent,
};
pub use collapse::CollapseController;
pub use config::SyncConfig;
pub use coordinator::{apply_event, RealTimeSyncCoordinator};
pub use drag::{DragController, DragOutcome};
pub use error::{Error, Result};
pub use memory::{MemoryStore, MemoryStoreConfig, WriteVerdict};
pub use notice::{Notice, NoticeKind, Notifier};
pub use session::BoardSession;
pub use store::{CardStore, RemoteFeed};
pub use write::{WriteHandle, WriteOutcome};

pub use corkboard_geometry as geometry;
