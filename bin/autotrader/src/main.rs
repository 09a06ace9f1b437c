use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use common::{BroadcastEmitter, Config, Result};
use engine::{Launcher, MarketRegistry};
use storage::{MemoryStorage, SqliteStorage, StorageRegistry};
use strategy::{RunFileConfig, StrategyRegistry};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "Autotrader failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    info!(mode = %cfg.trading_mode, runs = %cfg.runs_config_path, "Autotrader starting");

    // ── Storages ──────────────────────────────────────────────────────────────
    let storages = match &cfg.database_url {
        Some(url) => {
            let sqlite = Arc::new(SqliteStorage::connect(url).await?);
            let memory = Arc::new(MemoryStorage::new());
            let mut storages = StorageRegistry::new(sqlite.clone(), sqlite.clone());
            storages
                .register_candles("sqlite", sqlite.clone())
                .register_orders("sqlite", sqlite)
                .register_candles("memory", memory.clone())
                .register_orders("memory", memory);
            storages
        }
        None => {
            warn!("DATABASE_URL not set, only in-memory storage is available");
            StorageRegistry::in_memory().0
        }
    };

    // ── Composition root ──────────────────────────────────────────────────────
    let events = BroadcastEmitter::new(cfg.event_channel_capacity);
    let launcher = Arc::new(Launcher::new(
        MarketRegistry::with_builtins(),
        StrategyRegistry::with_builtins(),
        storages,
        Arc::new(events.clone()),
    ));

    // ── Strategy runs ─────────────────────────────────────────────────────────
    let runs_file = RunFileConfig::load(&cfg.runs_config_path)?;
    let mut handles = Vec::with_capacity(runs_file.runs.len());
    for entry in &runs_file.runs {
        let run = entry.to_strategy_run(Uuid::new_v4(), Utc::now())?;
        handles.push(launcher.launch(run, cfg.trading_mode).await?);
    }
    info!(count = handles.len(), "Strategy runs launched");

    for handle in handles {
        tokio::spawn(async move {
            // join() logs the outcome
            let _ = handle.join().await;
        });
    }

    // ── Dashboard API ─────────────────────────────────────────────────────────
    let api_state = api::AppState {
        launcher: launcher.clone(),
        events,
        trading_mode: cfg.trading_mode,
        dashboard_token: cfg.dashboard_token.clone(),
    };
    let port = cfg.dashboard_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "Dashboard API stopped");
        }
    });

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting.");
    Ok(())
}
