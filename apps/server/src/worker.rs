//! RDA Worker - queue consumer entry point
//!
//! Long-polls the processing queue, turns each message into a stored record and
//! acknowledges it. Stops after the in-flight batch when SIGINT/SIGTERM arrives.
//! Worker counters are scraped from `/metrics` on `worker.metrics_port`.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;

use rda_pipeline::{
    config::Config,
    api, logging, signals,
    state::Backends,
    workers::{poll_once, run_worker, DocumentWorker, Worker, WorkerConfig},
};

#[derive(Parser, Debug)]
#[command(name = "rda-worker", version, about = "RDA queue worker")]
struct Args {
    /// Path to a TOML config file (defaults to `RDA_CONFIG` or `config.toml`)
    #[arg(short, long)]
    config: Option<String>,

    /// Process at most one batch and exit
    #[arg(long)]
    once: bool,
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

    config
        .ensure_shared_backend()
        .context("rda-worker cannot consume this backend")?;

    let _telemetry_guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging/telemetry")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        queue = config.queue.url,
        batch_size = config.queue.batch_size,
        "Starting RDA worker"
    );

    let backends = Backends::connect(&config)
        .await
        .context("Failed to connect backends")?;
    let queue = backends.require_queue()?;
    let worker: Arc<dyn Worker> =
        Arc::new(DocumentWorker::new(backends.store.clone(), queue.clone()));
    let worker_config = WorkerConfig::from_config(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_server = match config
        .worker_metrics_addr()
        .context("Failed to determine metrics address")?
    {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind metrics listener on {addr}"))?;
            tracing::info!("Worker metrics on http://{}/metrics", addr);
            let service = Arc::new(backends.metrics_service());
            Some(tokio::spawn(api::serve_metrics(
                listener,
                service,
                shutdown_rx.clone(),
            )))
        }
        None => None,
    };

    if args.once {
        let report = poll_once(worker.as_ref(), queue.as_ref(), &worker_config.receive)
            .await
            .context("Queue poll failed")?;
        tracing::info!(
            received = report.received,
            processed = report.processed,
            errors = report.errors,
            "Single batch complete"
        );
        let _ = shutdown_tx.send(true);
        stop_metrics_server(metrics_server).await;
        return Ok(());
    }

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        signals::shutdown_signal().await;
        let _ = signal_tx.send(true);
    });

    let outcome = run_worker(worker, queue, worker_config, shutdown_rx).await;
    // A queue failure also ends the loop without a signal.
    let _ = shutdown_tx.send(true);
    stop_metrics_server(metrics_server).await;
    let stats = outcome.context("Worker stopped on a queue failure")?;

    tracing::info!(
        batches = stats.batches,
        processed = stats.processed,
        errors = stats.errors,
        "Worker shutdown complete"
    );
    Ok(())
}

async fn stop_metrics_server(handle: Option<tokio::task::JoinHandle<std::io::Result<()>>>) {
    let Some(handle) = handle else { return };
    match handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Metrics listener failed"),
        Err(e) => tracing::error!(error = %e, "Metrics listener task panicked"),
    }
}
