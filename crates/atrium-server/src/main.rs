//! atrium-server -- the multi-tenant game-server binary (§5, §6).
//!
//! Boots one [`atrium_fleet::prelude::Fleet`], reconciles persisted instance
//! rows left over from a previous process, then runs three independent
//! background loops (tick dispatch, GC/AFK sweep, persistence flush) behind
//! one axum HTTP/WebSocket API.

mod config;
mod error;
mod routes;
mod state;

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use atrium_fleet::prelude::Fleet;
use atrium_persistence::prelude::{run_flush_loop, FileBackend, PersistenceStore};

use crate::config::RuntimeConfig;
use crate::state::AppState;

fn init_tracing() {
    let filter = std::env::var("ATRIUM_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::from(2);
        }
    };

    let persistence = match config.persistence_dir.clone() {
        Some(dir) => Some(Arc::new(PersistenceStore::new(FileBackend::new(dir)))),
        None => None,
    };

    let fleet = Fleet::new(config.blueprints_root.clone(), persistence.clone()).with_config(config.fleet_config());
    fleet.reconcile_on_start().await;
    let fleet = Arc::new(fleet);

    if let Some(persistence) = persistence.clone() {
        let interval = config.flush_interval;
        tokio::spawn(async move {
            run_flush_loop(persistence, interval).await;
        });
    }

    spawn_tick_loop(fleet.clone(), config.tick_period());
    spawn_gc_loop(fleet.clone(), config.gc_interval);

    let state = AppState {
        fleet,
        config: Arc::new(config.clone()),
    };
    let app = routes::router(state);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %config.bind_addr, "failed to bind listener");
            return ExitCode::from(3);
        }
    };

    tracing::info!(addr = %config.bind_addr, "atrium-server listening");
    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = serve.await {
        tracing::error!(error = %err, "server exited with error");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

fn spawn_tick_loop(fleet: Arc<Fleet>, tick_period: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick_period);
        loop {
            ticker.tick().await;
            fleet.tick_all();
        }
    });
}

fn spawn_gc_loop(fleet: Arc<Fleet>, gc_interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(gc_interval);
        loop {
            ticker.tick().await;
            fleet.evict_idle_players();
            fleet.garbage_collect();
        }
    });
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
