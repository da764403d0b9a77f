//! cadence-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Build the inference engine and the WAV artifact store.
//! 4. Start the job orchestrator.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use cadence_core::artifact::WavFileStore;
use cadence_core::{Orchestrator, OrchestratorConfig};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: CADENCE_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "cadence-server starting");

    // ── 3. Engine and artifact store ───────────────────────────────────────────
    let engine = cfg.engine_config()?.build();
    let artifacts = WavFileStore::new(&cfg.output_dir)?;
    info!(
        engine = engine.name(),
        output_dir = %cfg.output_dir.display(),
        "engine and artifact store ready"
    );

    // ── 4. Orchestrator ────────────────────────────────────────────────────────
    let jobs = Orchestrator::new(
        engine,
        Arc::new(artifacts),
        OrchestratorConfig {
            max_concurrent_jobs: cfg.max_concurrent_jobs,
            ..OrchestratorConfig::default()
        },
    );
    if let Err(e) = jobs.probe_engine().await {
        warn!(error = %e, "engine is not reachable yet; jobs will fail until it is");
    }
    info!(max_concurrent_jobs = cfg.max_concurrent_jobs, "orchestrator ready");

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        jobs: jobs.clone(),
    });

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Queued jobs still waiting for a dispatch slot are marked cancelled.
    jobs.shutdown();

    info!("cadence-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
