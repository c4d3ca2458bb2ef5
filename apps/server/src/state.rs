//! Shared application state and backend wiring

use axum::extract::FromRef;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    config::BackendKind,
    db::{DocumentStore, InMemoryDocumentStore, MetricsRepository, PostgresDocumentStore},
    queue::{InMemoryMessageQueue, MessageQueue, PostgresMessageQueue},
    services::{IntakeGateway, MetricsService, QueryRouter},
    workers::{run_worker, DocumentWorker, Worker, WorkerConfig, WorkerStats},
    Config, Error, Result,
};

/// Queue and store clients for the configured backend.
#[derive(Clone)]
pub struct Backends {
    /// `None` when `queue.url` is empty.
    pub queue: Option<Arc<dyn MessageQueue>>,
    pub store: Arc<dyn DocumentStore>,
    pub db_pool: Option<PgPool>,
}

impl Backends {
    /// Connect to the configured backend and create tables that do not exist yet.
    pub async fn connect(config: &Config) -> Result<Self> {
        match config.backend {
            BackendKind::Postgres => Self::connect_postgres(config).await,
            BackendKind::Memory => Ok(Self::in_memory(config)),
        }
    }

    /// Process-local queue and store.
    pub fn in_memory(config: &Config) -> Self {
        let queue: Option<Arc<dyn MessageQueue>> = if config.queue.is_configured() {
            Some(Arc::new(InMemoryMessageQueue::new(config.queue.url.clone())))
        } else {
            None
        };

        Self {
            queue,
            store: Arc::new(InMemoryDocumentStore::new()),
            db_pool: None,
        }
    }

    async fn connect_postgres(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.pool_max_size)
            .acquire_timeout(Duration::from_secs(config.database.pool_timeout_seconds))
            .connect(&config.database.url)
            .await
            .map_err(Error::Database)?;
        tracing::info!("Database connection pool created");

        let store = PostgresDocumentStore::new(pool.clone(), config.store.table.clone());
        store.ensure_schema().await?;

        let queue: Option<Arc<dyn MessageQueue>> = if config.queue.is_configured() {
            let queue = PostgresMessageQueue::new(
                pool.clone(),
                config.queue.url.clone(),
                config.queue.table.clone(),
            );
            queue.ensure_schema().await?;
            Some(Arc::new(queue))
        } else {
            tracing::warn!("queue.url is empty; intake will reject every document");
            None
        };

        Ok(Self {
            queue,
            store: Arc::new(store),
            db_pool: Some(pool),
        })
    }

    /// Run the document worker as a task of the current process until `shutdown` fires.
    ///
    /// `rda-server` does this on the memory backend, where no other process can reach the
    /// queue.
    pub fn spawn_worker(
        &self,
        config: &Config,
        shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<Result<WorkerStats>>> {
        let queue = self.require_queue()?;
        let worker: Arc<dyn Worker> =
            Arc::new(DocumentWorker::new(self.store.clone(), queue.clone()));
        Ok(tokio::spawn(run_worker(
            worker,
            queue,
            WorkerConfig::from_config(config),
            shutdown,
        )))
    }

    /// Gauges sampled from these backends at scrape time.
    pub fn metrics_service(&self) -> MetricsService {
        MetricsService::new(
            self.db_pool.clone().map(MetricsRepository::new),
            self.queue.clone(),
            self.store.clone(),
        )
    }

    /// The queue, or a configuration error for components that cannot run without one.
    pub fn require_queue(&self) -> Result<Arc<dyn MessageQueue>> {
        self.queue
            .clone()
            .ok_or_else(|| Error::Config("queue.url must be set".into()))
    }
}

/// State shared by all HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub intake: Arc<IntakeGateway>,
    pub query: Arc<QueryRouter>,
    pub metrics_service: Arc<MetricsService>,
    pub backends: Backends,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let backends = Backends::connect(&config).await?;
        Ok(Self::from_backends(config, backends))
    }

    pub fn from_backends(config: Config, backends: Backends) -> Self {
        let intake = IntakeGateway::new(backends.queue.clone());
        let query = QueryRouter::new(backends.store.clone(), config.query.scan_limit);
        let metrics_service = backends.metrics_service();

        Self {
            config: Arc::new(config),
            intake: Arc::new(intake),
            query: Arc::new(query),
            metrics_service: Arc::new(metrics_service),
            backends,
        }
    }
}

impl FromRef<AppState> for Arc<MetricsService> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics_service.clone()
    }
}
