//! Integration log entity.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for integration log entries.
#[derive(Debug, Clone, FromRow)]
pub struct IntegrationLogEntity {
    pub id: Uuid,
    pub export_job_id: Uuid,
    pub destination: String,
    pub outcome: String,
    pub message: String,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}
