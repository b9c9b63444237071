//! Export job repository for database operations.

use chrono::{DateTime, Utc};
use domain::errors::StoreError;
use domain::models::{
    Destination, ExportJob, ExportJobStatus, JobCompletion, NewExportJob, NewIntegrationLogEntry,
};
use domain::store::ExportJobStore;
use sqlx::PgPool;
use uuid::Uuid;

use super::integration_log::insert_entry;
use crate::entities::ExportJobEntity;
use crate::metrics::QueryTimer;

const JOB_COLUMNS: &str = "id, owner_id, name, destination, status, output_location, \
     record_count, filter_id, error_message, created_at, updated_at, completed_at";

/// Repository for export job records.
#[derive(Clone)]
pub struct ExportJobRepository {
    pool: PgPool,
}

impl ExportJobRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Guarded terminal update plus its log row, committed together.
    async fn finish_in_transaction(
        &self,
        id: Uuid,
        completion: &JobCompletion,
        entry: &NewIntegrationLogEntry,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE export_jobs
            SET status = $2, record_count = $3, output_location = $4, error_message = $5,
                updated_at = NOW(), completed_at = NOW()
            WHERE id = $1 AND status = ANY($6)
            "#,
        )
        .bind(id)
        .bind(completion.status.as_str())
        .bind(completion.record_count)
        .bind(&completion.output_location)
        .bind(&completion.error_message)
        .bind(statuses(completion.status.allowed_predecessors()))
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_entry(&mut *tx, entry).await?;
        tx.commit().await?;
        Ok(true)
    }
}

/// Convert entity to domain model.
fn entity_to_domain(entity: ExportJobEntity) -> Result<ExportJob, StoreError> {
    Ok(ExportJob {
        id: entity.id,
        owner_id: entity.owner_id,
        name: entity.name,
        destination: entity
            .destination
            .parse::<Destination>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        status: entity
            .status
            .parse::<ExportJobStatus>()
            .map_err(StoreError::Corrupt)?,
        output_location: entity.output_location,
        record_count: entity.record_count,
        filter_id: entity.filter_id,
        error_message: entity.error_message,
        created_at: entity.created_at,
        updated_at: entity.updated_at,
        completed_at: entity.completed_at,
    })
}

fn statuses(list: &[ExportJobStatus]) -> Vec<String> {
    list.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait::async_trait]
impl ExportJobStore for ExportJobRepository {
    async fn create(&self, job: NewExportJob) -> Result<ExportJob, StoreError> {
        let timer = QueryTimer::new("create_export_job");
        let result = sqlx::query_as::<_, ExportJobEntity>(&format!(
            r#"
            INSERT INTO export_jobs (owner_id, name, destination, filter_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(job.owner_id)
        .bind(&job.name)
        .bind(job.destination.as_str())
        .bind(job.filter_id)
        .fetch_one(&self.pool)
        .await;
        timer.observe(&result);

        entity_to_domain(result?)
    }

    async fn find(&self, owner_id: Uuid, id: Uuid) -> Result<Option<ExportJob>, StoreError> {
        let entity = sqlx::query_as::<_, ExportJobEntity>(&format!(
            "SELECT {} FROM export_jobs WHERE id = $1 AND owner_id = $2",
            JOB_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        entity.map(entity_to_domain).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ExportJob>, StoreError> {
        let entity = sqlx::query_as::<_, ExportJobEntity>(&format!(
            "SELECT {} FROM export_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        entity.map(entity_to_domain).transpose()
    }

    async fn list_for_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExportJob>, StoreError> {
        let entities = sqlx::query_as::<_, ExportJobEntity>(&format!(
            r#"
            SELECT {}
            FROM export_jobs
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
            JOB_COLUMNS
        ))
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        entities.into_iter().map(entity_to_domain).collect()
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE export_jobs
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status = 'queued'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn finish_with_log(
        &self,
        id: Uuid,
        completion: &JobCompletion,
        entry: NewIntegrationLogEntry,
    ) -> Result<bool, StoreError> {
        if !completion.status.is_terminal() {
            return Ok(false);
        }

        let timer = QueryTimer::new("finish_export_job");
        let result = self.finish_in_transaction(id, completion, &entry).await;
        timer.observe(&result);

        Ok(result?)
    }

    async fn find_unfinished(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<ExportJob>, StoreError> {
        let entities = sqlx::query_as::<_, ExportJobEntity>(&format!(
            r#"
            SELECT {}
            FROM export_jobs
            WHERE status IN ('queued', 'processing') AND updated_at < $1
            ORDER BY updated_at
            "#,
            JOB_COLUMNS
        ))
        .bind(updated_before)
        .fetch_all(&self.pool)
        .await?;

        entities.into_iter().map(entity_to_domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(destination: &str, status: &str) -> ExportJobEntity {
        let now = Utc::now();
        ExportJobEntity {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Leads".to_string(),
            destination: destination.to_string(),
            status: status.to_string(),
            output_location: None,
            record_count: 0,
            filter_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn test_entity_to_domain() {
        let job = entity_to_domain(entity("mailing", "completed_with_warnings")).unwrap();
        assert_eq!(job.destination, Destination::Mailing);
        assert_eq!(job.status, ExportJobStatus::CompletedWithWarnings);
    }

    #[test]
    fn test_entity_with_unknown_status_is_corrupt() {
        let err = entity_to_domain(entity("crm", "paused")).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_guard_statuses() {
        assert_eq!(
            statuses(ExportJobStatus::Failed.allowed_predecessors()),
            vec!["queued", "processing"]
        );
        assert_eq!(
            statuses(ExportJobStatus::Completed.allowed_predecessors()),
            vec!["processing"]
        );
    }
}
