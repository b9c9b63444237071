//! Export job orchestration: submission and read access.

use std::sync::Arc;

use chrono::Utc;
use domain::errors::{ExportError, NotFoundError};
use domain::models::{
    Destination, ExportJob, ExportJobStatus, ExportJobStatusView, IntegrationLogEntry,
    NewExportJob,
};
use domain::services::{compile_json, SpreadsheetWriter};
use domain::store::{ExportJobStore, FilterStore, IntegrationLogStore};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::info;
use uuid::Uuid;

use super::export_runner::{ExportTask, FilterSource};
use crate::jobs::ExportQueue;

/// Default number of jobs returned by [`ExportService::list_jobs`].
pub const DEFAULT_JOB_LIST_LIMIT: i64 = 50;
const MAX_JOB_LIST_LIMIT: i64 = 200;

/// Filter part of an export request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterReference {
    /// Saved filter of the caller.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Inline condition document; takes precedence over `id`.
    #[serde(default, alias = "condicoes")]
    pub conditions: Option<JsonValue>,
}

/// Body of an export submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default, alias = "filtro")]
    pub filter: Option<FilterReference>,
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
    #[serde(default, alias = "listaNome")]
    pub list_name: Option<String>,
}

/// Creates export jobs and hands them to the worker pool.
#[derive(Clone)]
pub struct ExportService {
    jobs: Arc<dyn ExportJobStore>,
    logs: Arc<dyn IntegrationLogStore>,
    filters: Arc<dyn FilterStore>,
    artifacts: Arc<dyn SpreadsheetWriter>,
    queue: ExportQueue,
}

impl ExportService {
    pub fn new(
        jobs: Arc<dyn ExportJobStore>,
        logs: Arc<dyn IntegrationLogStore>,
        filters: Arc<dyn FilterStore>,
        artifacts: Arc<dyn SpreadsheetWriter>,
        queue: ExportQueue,
    ) -> Self {
        Self {
            jobs,
            logs,
            filters,
            artifacts,
            queue,
        }
    }

    /// Validates the request, creates a `queued` job and enqueues it.
    ///
    /// The queue slot is reserved before the job record is written, so a full
    /// queue leaves nothing behind.
    pub async fn submit(
        &self,
        owner_id: Uuid,
        destination: Destination,
        request: ExportRequest,
    ) -> Result<ExportJob, ExportError> {
        let source = self.filter_source(owner_id, request.filter).await?;
        let slot = self.queue.reserve(destination)?;

        let filter_id = match &source {
            FilterSource::Stored(id) => Some(*id),
            _ => None,
        };
        let job = self
            .jobs
            .create(NewExportJob::new(
                owner_id,
                destination,
                request.name.clone(),
                filter_id,
                Utc::now(),
            ))
            .await?;

        info!(
            job_id = %job.id,
            owner_id = %owner_id,
            destination = %destination,
            "Export job queued"
        );

        slot.send(ExportTask {
            job: job.clone(),
            source,
            list_name: request.list_name,
            supplied_name: request.name,
        });

        Ok(job)
    }

    async fn filter_source(
        &self,
        owner_id: Uuid,
        filter: Option<FilterReference>,
    ) -> Result<FilterSource, ExportError> {
        let Some(filter) = filter else {
            return Ok(FilterSource::All);
        };

        match (filter.conditions, filter.id) {
            (Some(conditions), _) if !conditions.is_null() => {
                Ok(FilterSource::Inline(compile_json(&conditions)?))
            }
            (_, Some(id)) => {
                self.filters
                    .find(owner_id, id)
                    .await?
                    .ok_or_else(|| NotFoundError::new("Filter", id.to_string()))?;
                Ok(FilterSource::Stored(id))
            }
            _ => Ok(FilterSource::All),
        }
    }

    pub async fn get_job(&self, owner_id: Uuid, id: Uuid) -> Result<ExportJob, ExportError> {
        self.jobs
            .find(owner_id, id)
            .await?
            .ok_or_else(|| NotFoundError::new("Export job", id.to_string()).into())
    }

    pub async fn get_status(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<ExportJobStatusView, ExportError> {
        let job = self.get_job(owner_id, id).await?;
        Ok(ExportJobStatusView::from(&job))
    }

    /// Owner's jobs, newest first.
    pub async fn list_jobs(
        &self,
        owner_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<ExportJob>, ExportError> {
        let limit = limit
            .unwrap_or(DEFAULT_JOB_LIST_LIMIT)
            .clamp(1, MAX_JOB_LIST_LIMIT);
        Ok(self.jobs.list_for_owner(owner_id, limit).await?)
    }

    pub async fn job_logs(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<Vec<IntegrationLogEntry>, ExportError> {
        let job = self.get_job(owner_id, id).await?;
        Ok(self.logs.list_for_job(job.id).await?)
    }

    /// File name and contents of a completed spreadsheet export.
    pub async fn download(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<(String, Vec<u8>), ExportError> {
        let job = self.get_job(owner_id, id).await?;
        let not_found = || NotFoundError::new("Export file", id.to_string());

        if job.destination != Destination::File || job.status != ExportJobStatus::Completed {
            return Err(not_found().into());
        }
        let location = job.output_location.ok_or_else(not_found)?;
        let contents = self
            .artifacts
            .read(&location)
            .await?
            .ok_or_else(not_found)?;

        Ok((location, contents))
    }
}
