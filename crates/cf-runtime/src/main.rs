//! # CF Runtime
//!
//! Hosts the transfer scheduler with a loopback engine.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging
//! 2. Load runtime settings and the scheduler table
//! 3. Attach handshake tokens to gated channels
//! 4. Run the wakeup loop until Ctrl+C
//! 5. Log final housekeeping

use anyhow::{Context, Result};
use cf_runtime::{flush_output, LoopbackEngine, RuntimeSettings, TracingSink};
use cf_scheduler::{EntityId, FileScheduler, LocalFileStore, SchedulerApi, SemaphoreToken};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  CF Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let settings = RuntimeSettings::from_env();
    let config = settings
        .scheduler_config()
        .context("failed to load scheduler table")?;
    let flight = EntityId::parse(&config.flight_entity_id)?;

    // Gated channels share one token between the scheduler and the sink.
    let gated: Vec<(u8, SemaphoreToken)> = config
        .channels
        .iter()
        .enumerate()
        .filter(|(_, c)| c.in_use && c.handshake.is_some())
        .map(|(i, _)| (i as u8, SemaphoreToken::new(settings.handshake_permits)))
        .collect();

    let sink = gated
        .iter()
        .fold(TracingSink::new(), |sink, (channel, token)| {
            sink.with_token(*channel, token.clone())
        });
    let engine = LoopbackEngine::new(flight, settings.receive_root.clone());
    let mut scheduler = FileScheduler::new(config, engine, LocalFileStore::new(), sink)?;
    for (channel, token) in gated {
        scheduler.attach_handshake(channel, Arc::new(token))?;
    }

    info!(
        flight = %flight,
        wakeup_ms = settings.wakeup_interval.as_millis() as u64,
        receive_root = %settings.receive_root.display(),
        "Runtime started. Press Ctrl+C to stop."
    );

    let mut ticker = tokio::time::interval(settings.wakeup_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                scheduler.wakeup();
                flush_output(&mut scheduler);
            }
            result = &mut shutdown => {
                result.context("failed to listen for Ctrl+C")?;
                info!("Shutdown signal received");
                break;
            }
        }
    }

    let housekeeping = scheduler.housekeeping();
    info!(
        housekeeping = %serde_json::to_string(&housekeeping)?,
        "Final housekeeping"
    );
    Ok(())
}
