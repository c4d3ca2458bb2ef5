//! Metrics repository - connection pool statistics for monitoring

use sqlx::PgPool;

/// Read-only view of the database pool used when exporting metrics
#[derive(Clone)]
pub struct MetricsRepository {
    pool: PgPool,
}

impl MetricsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get connection pool size (for metrics)
    pub fn get_pool_size(&self) -> u32 {
        self.pool.size()
    }

    /// Get number of idle connections (for metrics)
    pub fn get_num_idle(&self) -> usize {
        self.pool.num_idle()
    }
}
