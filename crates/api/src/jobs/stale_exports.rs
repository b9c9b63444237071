//! Stale export reaper.
//!
//! Fails export jobs left `queued` or `processing` by a process that stopped
//! before finishing them. Jobs sent to this process's own queue are skipped
//! however long they wait. Assumes a single running instance.

use std::sync::Arc;

use chrono::{Duration, Utc};
use domain::errors::StoreError;
use domain::models::{
    ExportJobStatus, FailureStage, JobCompletion, LogOutcome, NewIntegrationLogEntry,
};
use domain::store::ExportJobStore;
use tracing::{debug, info, warn};

use super::export_worker::ActiveExports;
use super::scheduler::Job;
use crate::middleware::metrics::record_export_outcome;

const ABANDONED_MESSAGE: &str = "Export abandoned before completion";

pub struct StaleExportsJob {
    jobs: Arc<dyn ExportJobStore>,
    active: ActiveExports,
    stale_after: Duration,
}

impl StaleExportsJob {
    pub fn new(
        jobs: Arc<dyn ExportJobStore>,
        active: ActiveExports,
        stale_after_minutes: i64,
    ) -> Self {
        Self {
            jobs,
            active,
            stale_after: Duration::minutes(stale_after_minutes.max(1)),
        }
    }
}

#[async_trait::async_trait]
impl Job for StaleExportsJob {
    fn name(&self) -> &'static str {
        "stale_exports"
    }

    fn period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(5 * 60)
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - self.stale_after;
        let stale = self.jobs.find_unfinished(cutoff).await?;

        let mut reaped = 0;
        for job in stale {
            if self.active.contains(job.id) {
                debug!(
                    job_id = %job.id,
                    status = %job.status,
                    "Export still owned by this process"
                );
                continue;
            }

            let completion = JobCompletion {
                status: ExportJobStatus::Failed,
                record_count: 0,
                output_location: None,
                error_message: Some(ABANDONED_MESSAGE.to_string()),
            };
            let entry = NewIntegrationLogEntry::failure(
                job.id,
                job.destination,
                FailureStage::Abandoned,
                ABANDONED_MESSAGE,
                None,
            );

            match self.jobs.finish_with_log(job.id, &completion, entry).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Failed to fail stale export");
                    continue;
                }
            }

            record_export_outcome(job.destination, LogOutcome::Failure, 0.0);
            info!(
                job_id = %job.id,
                destination = %job.destination,
                previous_status = %job.status,
                "Stale export marked as failed"
            );
            reaped += 1;
        }

        Ok(reaped)
    }
}
