//! Randomized multi-client board session.

use std::rc::Rc;
use std::time::Duration;

use corkboard_geometry::{ContainerSize, LogicalPoint, PixelDelta, DEFAULT_MAX_LOGICAL, DEFAULT_MIN_LOGICAL};
use corkboard_sync::{
    BoardId, BoardSession, Card, CardId, MemoryStore, MemoryStoreConfig, Notice, Result, SyncConfig,
    WriteHandle,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Configuration for the simulation.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Seed for deterministic runs
    pub seed: u64,
    /// Concurrent clients on the board
    pub clients: usize,
    /// Cards seeded on the board
    pub cards: usize,
    /// Gestures issued across all clients
    pub rounds: usize,
    /// Probability that a gesture's write is failed by the store (0.0 - 1.0)
    pub failure_rate: f64,
    /// Store latency per read and write
    pub latency: Duration,
    /// Re-fetch the board on every client once all writes settled
    pub resync: bool,
    /// Engine settings shared by every client
    pub sync: SyncConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            clients: 3,
            cards: 8,
            rounds: 200,
            failure_rate: 0.1,
            latency: Duration::ZERO,
            resync: true,
            sync: SyncConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// `failure_rate` clamped to `[0, 1]`; a non-finite rate injects nothing.
    pub fn failure_probability(&self) -> f64 {
        if self.failure_rate.is_finite() {
            self.failure_rate.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationReport {
    pub rounds: usize,
    pub drags: usize,
    pub toggles: usize,
    pub renames: usize,
    /// Gestures that needed no write.
    pub unchanged: usize,
    pub writes: usize,
    pub rolled_back: usize,
    pub notices: usize,
    pub store_writes: u64,
    /// Every client's cards equal the store's rows.
    pub converged: bool,
    /// `client:card` pairs that disagree with the store.
    pub divergent: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Gesture {
    Drag,
    Toggle,
    Rename,
}

/// Runs gestures from several clients against one store.
pub struct Simulation {
    config: SimulationConfig,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        if !config.failure_rate.is_finite() {
            warn!(failure_rate = config.failure_rate, "Ignoring non-finite failure rate");
        }
        let rng = StdRng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run to completion. Must be called inside a `LocalSet`.
    pub async fn run(&mut self) -> Result<SimulationReport> {
        let board = BoardId::new("sim-board");
        let store = Rc::new(MemoryStore::with_config(MemoryStoreConfig {
            latency: self.config.latency,
            echo_writes: true,
        }));
        self.seed_cards(&store, &board);

        let mut sessions = Vec::with_capacity(self.config.clients);
        let mut notices: Vec<broadcast::Receiver<Notice>> = Vec::with_capacity(self.config.clients);
        for client in 0..self.config.clients {
            let mut session = BoardSession::new(Rc::clone(&store), self.config.sync.clone())?;
            session.open(board.clone()).await?;
            let width = self.rng.gen_range(480.0..1600.0);
            session.set_container_size(ContainerSize::new(width, width * 0.75));
            debug!(client, width, "Client joined");
            notices.push(session.notices());
            sessions.push(session);
        }
        if sessions.is_empty() {
            warn!("No clients configured");
        }

        let mut report = SimulationReport {
            rounds: self.config.rounds,
            ..SimulationReport::default()
        };
        let mut handles: Vec<WriteHandle> = Vec::new();
        let failure_probability = self.config.failure_probability();

        for round in 0..self.config.rounds {
            if sessions.is_empty() {
                break;
            }
            let client = self.rng.gen_range(0..sessions.len());
            let session = &sessions[client];
            let cards = session.cards();
            if cards.is_empty() {
                continue;
            }
            let card = cards[self.rng.gen_range(0..cards.len())].id.clone();

            if self.rng.gen_bool(failure_probability) {
                store.fail_next_writes(1);
            }

            let gesture = match self.rng.gen_range(0..10) {
                0..=5 => Gesture::Drag,
                6..=8 => Gesture::Toggle,
                _ => Gesture::Rename,
            };
            let handle = match gesture {
                Gesture::Drag => {
                    report.drags += 1;
                    let delta = PixelDelta::new(self.rng.gen_range(-240.0..240.0), self.rng.gen_range(-240.0..240.0));
                    session.on_drag_start(&card)?;
                    session.on_drag_move(&card, PixelDelta::new(delta.dx / 2.0, delta.dy / 2.0));
                    session.on_drag_end(&card, delta)?.into_handle()
                }
                Gesture::Toggle => {
                    report.toggles += 1;
                    session.toggle(&card)?.into_handle()
                }
                Gesture::Rename => {
                    report.renames += 1;
                    session.rename(&card, format!("round {round}"))?.into_handle()
                }
            };
            match handle {
                Some(handle) => handles.push(handle),
                None => report.unchanged += 1,
            }

            // Let some writes and echoes interleave with later gestures.
            for _ in 0..self.rng.gen_range(0..3) {
                tokio::task::yield_now().await;
            }
        }

        report.writes = handles.len();
        for handle in handles {
            match handle.await {
                Ok(settlement) if settlement.is_rolled_back() => report.rolled_back += 1,
                Ok(_) => {}
                Err(err) => warn!(error = %err, "Write task failed"),
            }
        }
        settle().await;

        if self.config.resync {
            for session in &sessions {
                session.resync().await?;
            }
        }

        for rx in &mut notices {
            while rx.try_recv().is_ok() {
                report.notices += 1;
            }
        }

        let expected = store.rows(&board);
        for (client, session) in sessions.iter().enumerate() {
            let actual = session.cards();
            for card in &expected {
                if actual.iter().find(|c| c.id == card.id) != Some(card) {
                    report.divergent.push(format!("{client}:{}", card.id));
                }
            }
            for card in actual.iter().filter(|c| !expected.iter().any(|e| e.id == c.id)) {
                report.divergent.push(format!("{client}:{}", card.id));
            }
        }
        report.converged = report.divergent.is_empty();
        report.store_writes = store.write_count();

        info!(
            writes = report.writes,
            rolled_back = report.rolled_back,
            converged = report.converged,
            "Simulation finished"
        );
        Ok(report)
    }

    fn seed_cards(&mut self, store: &MemoryStore, board: &BoardId) {
        for i in 0..self.config.cards {
            let point = LogicalPoint::new(
                self.rng.gen_range(DEFAULT_MIN_LOGICAL..=DEFAULT_MAX_LOGICAL),
                self.rng.gen_range(DEFAULT_MIN_LOGICAL..=DEFAULT_MAX_LOGICAL),
            );
            let card = Card::new(CardId::new(format!("card-{i:03}")), board.clone(), point.x, point.y)
                .collapsed(self.rng.gen_bool(0.5))
                .with_title(format!("card {i}"));
            store.insert_row(card);
        }
    }
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
