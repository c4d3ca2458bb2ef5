//! RDA Server - HTTP entry point
//!
//! Serves intake (`POST /rda`), the query API and operational endpoints.
//! Queue consumption runs in the separate `rda-worker` binary, except on the
//! in-memory backend where the queue only exists inside this process and the
//! worker runs alongside the HTTP server.

use anyhow::Context;
use clap::Parser;
use rda_pipeline::{
    api::create_router,
    config::{BackendKind, Config},
    logging, signals,
    state::AppState,
};
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "rda-server", version, about = "RDA intake and query HTTP server")]
struct Args {
    /// Path to a TOML config file (defaults to `RDA_CONFIG` or `config.toml`)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match args.config.as_deref() {
        Some(path) => {
            dotenvy::dotenv().ok();
            Config::load_from(path)
        }
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let _telemetry_guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging/telemetry")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.logging.deployment_environment,
        backend = ?config.backend,
        "Starting RDA server"
    );

    let addr = config
        .socket_addr()
        .context("Failed to determine socket address")?;

    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;

    let (worker_shutdown, worker_rx) = watch::channel(false);
    let embedded_worker = match (state.config.backend, state.backends.queue.is_some()) {
        (BackendKind::Memory, true) => {
            tracing::info!("In-memory backend: running the queue worker in-process");
            let handle = state
                .backends
                .spawn_worker(&state.config, worker_rx)
                .context("Failed to start the embedded worker")?;
            Some(handle)
        }
        (BackendKind::Memory, false) => {
            tracing::warn!("queue.url is empty; intake will reject every document");
            None
        }
        (BackendKind::Postgres, _) => None,
    };

    let app = create_router(state);

    tracing::info!("RDA server listening on http://{}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener on {addr}"))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(signals::shutdown_signal())
        .await;

    let _ = worker_shutdown.send(true);
    if let Some(handle) = embedded_worker {
        match handle.await {
            Ok(Ok(stats)) => tracing::info!(
                batches = stats.batches,
                processed = stats.processed,
                errors = stats.errors,
                "Embedded worker stopped"
            ),
            Ok(Err(e)) => tracing::error!(error = %e, "Embedded worker stopped on a queue failure"),
            Err(e) => tracing::error!(error = %e, "Embedded worker task panicked"),
        }
    }

    if let Err(e) = served {
        tracing::error!(error = %e, "Server terminated unexpectedly");
        return Err(e.into());
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
