//! Metrics service for collecting application metrics

use std::sync::Arc;

use crate::{
    db::{DocumentStore, MetricsRepository},
    queue::MessageQueue,
};

/// Refreshes gauges that are sampled at scrape time rather than updated inline
pub struct MetricsService {
    repo: Option<MetricsRepository>,
    queue: Option<Arc<dyn MessageQueue>>,
    store: Arc<dyn DocumentStore>,
}

impl MetricsService {
    pub fn new(
        repo: Option<MetricsRepository>,
        queue: Option<Arc<dyn MessageQueue>>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self { repo, queue, store }
    }

    /// Update database connection pool metrics
    pub fn update_db_connection_metrics(&self) {
        let Some(repo) = &self.repo else {
            return;
        };
        let pool_size = repo.get_pool_size();
        let idle = repo.get_num_idle() as u32;

        crate::metrics::DB_CONNECTIONS_ACTIVE.set(pool_size.saturating_sub(idle) as i64);
        crate::metrics::DB_CONNECTIONS_IDLE.set(idle as i64);
    }

    /// Update queue depth gauges
    pub async fn update_queue_metrics(&self) {
        let Some(queue) = &self.queue else {
            return;
        };
        match queue.depth().await {
            Ok(depth) => {
                crate::metrics::QUEUE_DEPTH
                    .with_label_values(&["visible"])
                    .set(depth.visible);
                crate::metrics::QUEUE_DEPTH
                    .with_label_values(&["in_flight"])
                    .set(depth.in_flight);
            }
            Err(e) => tracing::warn!("Failed to read queue depth: {}", e),
        }
    }

    /// Update the stored record gauge
    pub async fn update_store_metrics(&self) {
        match self.store.count().await {
            Ok(count) => crate::metrics::STORE_RECORDS.set(count),
            Err(e) => tracing::warn!("Failed to count stored records: {}", e),
        }
    }

    /// Refresh sampled gauges and render the service info line
    pub async fn collect_custom_metrics(&self, server_version: &str) -> String {
        self.update_db_connection_metrics();
        self.update_queue_metrics().await;
        self.update_store_metrics().await;

        let mut output = String::new();
        output.push_str("# HELP rda_server_info RDA pipeline server information\n");
        output.push_str("# TYPE rda_server_info gauge\n");
        output.push_str(&format!(
            "rda_server_info{{version=\"{}\"}} 1\n",
            server_version
        ));
        output
    }
}
