//! cc-miner worker agent entry point.
//!
//! Connects to the coordinator named by `COORDINATOR_URL`, registers as
//! `WORKER_ID`, and runs commands against a simulated turtle until the
//! coordinator goes away or the process is interrupted.

use anyhow::Context;

use cc_miner::agent::{Agent, Rig};
use cc_miner::config::WorkerConfig;
use cc_miner::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env().context("loading worker configuration")?;
    init_tracing(config.log);
    tracing::info!(
        worker = %config.worker_id,
        coordinator = %config.coordinator_url,
        reconnect = config.reconnect.enabled,
        "starting worker agent"
    );

    let rig = Rig::new(config.turtle_fuel);
    let agent = Agent::with_rig(config, &rig);

    tokio::select! {
        result = agent.run() => result.context("worker agent stopped")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
    }

    Ok(())
}
