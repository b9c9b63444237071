//! Integration log repository.

use domain::errors::StoreError;
use domain::models::{Destination, IntegrationLogEntry, LogOutcome, NewIntegrationLogEntry};
use domain::store::IntegrationLogStore;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::IntegrationLogEntity;

/// Repository for the append-only integration log.
#[derive(Clone)]
pub struct IntegrationLogRepository {
    pool: PgPool,
}

impl IntegrationLogRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn entity_to_domain(entity: IntegrationLogEntity) -> Result<IntegrationLogEntry, StoreError> {
    Ok(IntegrationLogEntry {
        id: entity.id,
        export_job_id: entity.export_job_id,
        destination: entity
            .destination
            .parse::<Destination>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        outcome: entity
            .outcome
            .parse::<LogOutcome>()
            .map_err(StoreError::Corrupt)?,
        message: entity.message,
        details: entity.details,
        created_at: entity.created_at,
    })
}

/// Inserts one entry on `conn`, inside the caller's transaction.
pub(crate) async fn insert_entry(
    conn: &mut PgConnection,
    entry: &NewIntegrationLogEntry,
) -> Result<IntegrationLogEntity, sqlx::Error> {
    sqlx::query_as::<_, IntegrationLogEntity>(
        r#"
        INSERT INTO integration_logs (export_job_id, destination, outcome, message, details)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, export_job_id, destination, outcome, message, details, created_at
        "#,
    )
    .bind(entry.export_job_id)
    .bind(entry.destination.as_str())
    .bind(entry.outcome.as_str())
    .bind(&entry.message)
    .bind(&entry.details)
    .fetch_one(conn)
    .await
}

#[async_trait::async_trait]
impl IntegrationLogStore for IntegrationLogRepository {
    async fn list_for_job(
        &self,
        export_job_id: Uuid,
    ) -> Result<Vec<IntegrationLogEntry>, StoreError> {
        let entities = sqlx::query_as::<_, IntegrationLogEntity>(
            r#"
            SELECT id, export_job_id, destination, outcome, message, details, created_at
            FROM integration_logs
            WHERE export_job_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(export_job_id)
        .fetch_all(&self.pool)
        .await?;

        entities.into_iter().map(entity_to_domain).collect()
    }
}
