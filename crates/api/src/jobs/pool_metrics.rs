//! Connection pool gauges.

use std::time::Duration;

use domain::errors::StoreError;
use sqlx::PgPool;

use super::scheduler::Job;

/// Publishes the connection pool gauges every few seconds.
pub struct PoolMetricsJob {
    pool: PgPool,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn period(&self) -> Duration {
        Duration::from_secs(15)
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<usize, StoreError> {
        persistence::metrics::record_pool_metrics(&self.pool);
        Ok(0)
    }
}
