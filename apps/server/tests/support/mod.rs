pub mod assertions;
pub mod fixtures;
pub mod shared;

use anyhow::Context as _;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use futures::FutureExt as _;
use rda_pipeline::{
    api::create_router,
    config::BackendKind,
    queue::ReceiveOptions,
    state::Backends,
    workers::{poll_once, BatchReport, DocumentWorker, Worker},
    AppState, Config,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt as _;
use uuid::Uuid;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// `None` when the config leaves the queue unconfigured.
    pub worker: Option<Arc<dyn Worker>>,
    /// Receive options used by [`TestApp::drain_queue`]: no long poll, short visibility.
    pub receive: ReceiveOptions,
}

impl TestApp {
    /// In-memory queue and store.
    pub fn new() -> anyhow::Result<Self> {
        Self::new_with_config(|_| {})
    }

    pub fn new_with_config(configure: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        let mut config = shared::base_config();
        config.backend = BackendKind::Memory;
        configure(&mut config);

        let backends = Backends::in_memory(&config);
        Ok(Self::from_backends(config, backends))
    }

    /// Wire the app around caller-supplied backends (fakes, Postgres).
    pub fn from_backends(config: Config, backends: Backends) -> Self {
        let worker = backends.queue.clone().map(|queue| {
            Arc::new(DocumentWorker::new(backends.store.clone(), queue)) as Arc<dyn Worker>
        });
        let state = AppState::from_backends(config, backends);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            worker,
            receive: ReceiveOptions {
                max_messages: 10,
                wait_time: Duration::ZERO,
                visibility_timeout: Duration::from_millis(200),
            },
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let request = Request::builder()
            .method(method)
            .uri(path_and_query)
            .header("host", "example.org")
            .header("content-type", "application/json")
            .body(match body {
                Some(bytes) => Body::from(bytes),
                None => Body::empty(),
            })
            .context("build request")?;

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("dispatch request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .context("read response body")?;

        Ok((status, headers, body))
    }

    /// `POST /rda` with a JSON document.
    pub async fn submit(&self, document: &Value) -> anyhow::Result<(StatusCode, Value)> {
        let (status, _headers, body) = self
            .request(Method::POST, "/rda", Some(to_json_body(document)?))
            .await?;
        Ok((status, parse_json(&body)?))
    }

    /// `GET` a path and parse the JSON response.
    pub async fn get_json(&self, path_and_query: &str) -> anyhow::Result<(StatusCode, Value)> {
        let (status, _headers, body) = self.request(Method::GET, path_and_query, None).await?;
        Ok((status, parse_json(&body)?))
    }

    /// Poll the queue until a receive comes back empty, summing the batch reports.
    pub async fn drain_queue(&self) -> anyhow::Result<BatchReport> {
        let queue = self.state.backends.require_queue()?;
        let worker = self.worker.as_deref().context("app has no worker")?;
        let mut total = BatchReport::default();
        loop {
            let report = poll_once(worker, queue.as_ref(), &self.receive).await?;
            if report.received == 0 {
                return Ok(total);
            }
            total.received += report.received;
            total.processed += report.processed;
            total.errors += report.errors;
        }
    }

    /// Submit, expect 202, and process the queue.
    pub async fn ingest(&self, document: &Value) -> anyhow::Result<()> {
        let (status, body) = self.submit(document).await?;
        assert_status(status, StatusCode::ACCEPTED, &format!("submit: {body}"));
        self.drain_queue().await?;
        Ok(())
    }
}

pub async fn with_test_app<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    with_test_app_with_config(|_| {}, f).await
}

pub async fn with_test_app_with_config<C, F>(configure: C, f: F) -> anyhow::Result<()>
where
    C: FnOnce(&mut Config),
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    let app = TestApp::new_with_config(configure)?;
    f(&app).await
}

/// PostgreSQL-backed app on throwaway tables. Skips (returns `Ok`) when
/// `RDA_TEST_DATABASE_URL` is unset.
pub async fn with_postgres_app<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    let Some(database_url) = shared::test_database_url() else {
        eprintln!("RDA_TEST_DATABASE_URL not set; skipping PostgreSQL test");
        return Ok(());
    };

    let suffix = Uuid::new_v4().simple().to_string();
    let mut config = shared::base_config();
    config.backend = BackendKind::Postgres;
    config.database.url = database_url;
    config.database.pool_max_size = 4;
    config.store.table = format!("test_docs_{suffix}");
    config.queue.table = format!("test_queue_{suffix}");

    let backends = Backends::connect(&config)
        .await
        .context("connect PostgreSQL backends")?;
    let pool = backends
        .db_pool
        .clone()
        .context("postgres backend exposes its pool")?;
    let tables = [config.store.table.clone(), config.queue.table.clone()];
    let app = TestApp::from_backends(config, backends);

    let result = std::panic::AssertUnwindSafe(f(&app)).catch_unwind().await;

    for table in tables {
        if let Err(e) = sqlx::query(&format!(r#"DROP TABLE IF EXISTS "{table}""#))
            .execute(&pool)
            .await
        {
            eprintln!("test table cleanup failed: {e:?}");
        }
    }
    pool.close().await;

    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
