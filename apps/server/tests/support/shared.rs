use rda_pipeline::Config;
use std::sync::OnceLock;

pub const TEST_DATABASE_URL_ENV: &str = "RDA_TEST_DATABASE_URL";

/// Built-in defaults tuned for fast tests (no long poll). Initialises tracing once.
pub fn base_config() -> Config {
    init_tracing();

    let mut config = Config::default();
    config.queue.url = "rda-test-queue".to_string();
    config.queue.wait_time_seconds = 0;
    config.queue.visibility_timeout_seconds = 1;
    config.worker.poll_interval_seconds = 0;
    config
}

pub fn test_database_url() -> Option<String> {
    std::env::var(TEST_DATABASE_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
}

fn init_tracing() {
    use tracing_subscriber::prelude::*;
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "rda_pipeline=info,sqlx=warn".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
