//! Background execution of one export job.
//!
//! The runner is the only writer of a job once it has been queued. Every run
//! ends with one guarded terminal update stored together with its integration
//! log entry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::errors::{DestinationError, ExportError, NotFoundError};
use domain::models::{
    Destination, ExportJob, ExportJobStatus, FailureStage, JobCompletion, NewIntegrationLogEntry,
};
use domain::services::predicate::ContactField;
use domain::services::{compile_json, Criterion, Predicate};
use domain::store::{CompanyStore, ExportJobStore, FilterStore};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::destinations::{ExecutionRequest, ExecutorResult, Executors};
use crate::middleware::metrics::{record_export_outcome, record_records_delivered};

/// Where the records of an export come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSource {
    /// Every company in the registry.
    All,
    /// Conditions compiled when the export was submitted.
    Inline(Predicate),
    /// A saved filter of the job owner, resolved when the job runs.
    Stored(Uuid),
}

/// Unit of work handed to the export workers.
#[derive(Debug, Clone)]
pub struct ExportTask {
    pub job: ExportJob,
    pub source: FilterSource,
    pub list_name: Option<String>,
    pub supplied_name: Option<String>,
}

/// Why a run did not deliver.
#[derive(Debug)]
struct RunFailure {
    stage: FailureStage,
    message: String,
    diagnostic: Option<JsonValue>,
    /// Records fetched before the failure, if the fetch happened.
    fetched: i64,
}

impl RunFailure {
    fn new(stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            diagnostic: None,
            fetched: 0,
        }
    }

    fn destination(stage: FailureStage, err: DestinationError, fetched: i64) -> Self {
        Self {
            stage,
            message: err.to_string(),
            diagnostic: Some(err.diagnostic()),
            fetched,
        }
    }
}

/// Executes export tasks against the stores and destination executors.
pub struct ExportRunner {
    companies: Arc<dyn CompanyStore>,
    jobs: Arc<dyn ExportJobStore>,
    filters: Arc<dyn FilterStore>,
    executors: Executors,
    destination_timeout: Duration,
}

impl ExportRunner {
    pub fn new(
        companies: Arc<dyn CompanyStore>,
        jobs: Arc<dyn ExportJobStore>,
        filters: Arc<dyn FilterStore>,
        executors: Executors,
        destination_timeout: Duration,
    ) -> Self {
        Self {
            companies,
            jobs,
            filters,
            executors,
            destination_timeout,
        }
    }

    /// Runs one task to a terminal status.
    pub async fn run(&self, task: ExportTask, cancel: &CancellationToken) {
        let job_id = task.job.id;
        let destination = task.job.destination;
        let start = Instant::now();

        match self.jobs.mark_processing(job_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(job_id = %job_id, "Export job is no longer queued, skipping");
                return;
            }
            Err(e) => {
                // Left queued; the stale export reaper fails it later
                error!(job_id = %job_id, error = %e, "Failed to start export job");
                return;
            }
        }

        info!(job_id = %job_id, destination = %destination, "Export job started");

        let (completion, entry) = match self.deliver(&task, cancel).await {
            Ok(delivery) => self.settle(&task.job, delivery).await,
            Err(failure) => {
                let entry = NewIntegrationLogEntry::failure(
                    job_id,
                    destination,
                    failure.stage,
                    failure.message.clone(),
                    failure.diagnostic,
                );
                let completion = JobCompletion {
                    status: ExportJobStatus::Failed,
                    record_count: failure.fetched,
                    output_location: None,
                    error_message: Some(failure.message),
                };
                (completion, entry)
            }
        };

        let outcome = entry.outcome;
        match self.jobs.finish_with_log(job_id, &completion, entry).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(job_id = %job_id, "Export job already finished elsewhere, outcome dropped");
                return;
            }
            Err(e) => {
                // Left processing; the stale export reaper fails it later
                error!(
                    job_id = %job_id,
                    status = %completion.status,
                    record_count = completion.record_count,
                    error = %e,
                    "Failed to record export outcome"
                );
                return;
            }
        }

        let elapsed = start.elapsed();
        record_export_outcome(destination, outcome, elapsed.as_secs_f64());
        info!(
            job_id = %job_id,
            destination = %destination,
            status = %completion.status,
            record_count = completion.record_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "Export job finished"
        );
    }

    /// Resolves, fetches and transfers the records of one task.
    async fn deliver(
        &self,
        task: &ExportTask,
        cancel: &CancellationToken,
    ) -> Result<ExecutorResult, RunFailure> {
        if cancel.is_cancelled() {
            return Err(RunFailure::destination(
                FailureStage::Cancelled,
                DestinationError::Cancelled,
                0,
            ));
        }

        let job = &task.job;
        let predicate = self
            .resolve_predicate(job, &task.source)
            .await
            .map_err(|e| RunFailure::new(FailureStage::ResolveFilter, e.to_string()))?;

        let records = self
            .companies
            .fetch_for_export(&predicate, job.destination.record_cap())
            .await
            .map_err(|e| RunFailure::new(FailureStage::Fetch, e.to_string()))?;
        let fetched = records.len() as i64;

        let executor = self.executors.get(job.destination);
        let request = ExecutionRequest {
            job,
            list_name: task.list_name.as_deref(),
            supplied_name: task.supplied_name.as_deref(),
            records: &records,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RunFailure::destination(
                FailureStage::Cancelled,
                DestinationError::Cancelled,
                fetched,
            )),
            result = tokio::time::timeout(self.destination_timeout, executor.execute(request)) => {
                match result {
                    Ok(Ok(delivery)) => Ok(delivery),
                    Ok(Err(e)) => Err(RunFailure::destination(FailureStage::Transfer, e, fetched)),
                    Err(_) => Err(RunFailure::destination(
                        FailureStage::Timeout,
                        DestinationError::TimedOut(self.destination_timeout.as_secs()),
                        fetched,
                    )),
                }
            }
        }
    }

    async fn resolve_predicate(
        &self,
        job: &ExportJob,
        source: &FilterSource,
    ) -> Result<Predicate, ExportError> {
        let predicate = match source {
            FilterSource::All => Predicate::empty(),
            FilterSource::Inline(predicate) => predicate.clone(),
            FilterSource::Stored(filter_id) => {
                let filter = self
                    .filters
                    .find(job.owner_id, *filter_id)
                    .await?
                    .ok_or_else(|| NotFoundError::new("Filter", filter_id.to_string()))?;
                compile_json(&filter.conditions)?
            }
        };

        Ok(match job.destination {
            Destination::Mailing => predicate.with(Criterion::Present {
                field: ContactField::Email,
            }),
            _ => predicate,
        })
    }

    /// Marks delivered companies as sent and builds the success outcome.
    async fn settle(
        &self,
        job: &ExportJob,
        delivery: ExecutorResult,
    ) -> (JobCompletion, NewIntegrationLogEntry) {
        let record_count = delivery.delivered_count as i64;
        record_records_delivered(job.destination, delivery.delivered_count);

        let flag_error = if job.destination.tracks_sent_flag() {
            self.companies
                .mark_sent(job.destination, &delivery.delivered_keys)
                .await
                .err()
        } else {
            None
        };

        match flag_error {
            None => (
                JobCompletion {
                    status: ExportJobStatus::Completed,
                    record_count,
                    output_location: delivery.output_location,
                    error_message: None,
                },
                NewIntegrationLogEntry::success(
                    job.id,
                    job.destination,
                    record_count,
                    delivery.acknowledgment,
                ),
            ),
            Some(e) => {
                warn!(job_id = %job.id, error = %e, "Delivered records could not be marked as sent");
                let warning = format!("Failed to mark records as sent: {}", e);
                (
                    JobCompletion {
                        status: ExportJobStatus::CompletedWithWarnings,
                        record_count,
                        output_location: delivery.output_location,
                        error_message: Some(warning.clone()),
                    },
                    NewIntegrationLogEntry::warning(job.id, job.destination, record_count, warning),
                )
            }
        }
    }
}
