//! Corkboard convergence simulator
//!
//! Usage: `corkboard-sim [clients] [rounds] [seed] [failure_rate] [sync-config.json]`

use std::env;
use std::time::Duration;

use corkboard_sim::{Simulation, SimulationConfig};
use corkboard_sync::SyncConfig;
use tokio::task::LocalSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corkboard_sim=info,corkboard_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let defaults = SimulationConfig::default();

    let clients: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(defaults.clients);
    let rounds: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(defaults.rounds);
    let seed: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(defaults.seed);
    let failure_rate: f64 = args
        .get(4)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|rate| rate.is_finite())
        .unwrap_or(defaults.failure_rate);
    let sync = match args.get(5) {
        Some(path) => SyncConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => SyncConfig::default(),
    };
    let latency_ms: u64 = env::var("CORKBOARD_SIM_LATENCY_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let config = SimulationConfig {
        seed,
        clients,
        rounds,
        failure_rate,
        latency: Duration::from_millis(latency_ms),
        sync,
        ..defaults
    };

    println!("Corkboard Sync Simulator");
    println!("========================");
    println!(
        "{} clients, {} rounds, seed {}, failure rate {:.2}",
        config.clients, config.rounds, config.seed, config.failure_rate
    );
    println!();

    let mut sim = Simulation::new(config);
    let report = LocalSet::new().run_until(sim.run()).await?;

    println!("Gestures:   {} drags, {} toggles, {} renames", report.drags, report.toggles, report.renames);
    println!("Writes:     {} issued, {} rolled back, {} no-ops", report.writes, report.rolled_back, report.unchanged);
    println!("Notices:    {}", report.notices);
    println!("Converged:  {}", report.converged);
    println!();
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.converged {
        std::process::exit(1);
    }
    Ok(())
}
