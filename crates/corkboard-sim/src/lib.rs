//! Corkboard Simulator
//!
//! Drives several [`BoardSession`](corkboard_sync::BoardSession)s against
//! one in-memory store with random drags, toggles and renames, injects
//! write failures, and checks that every client ends up showing what the
//! store holds.

mod simulation;

pub use simulation::{Simulation, SimulationConfig, SimulationReport};
