//! Export job entity.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for export jobs.
#[derive(Debug, Clone, FromRow)]
pub struct ExportJobEntity {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// `file`, `crm` or `mailing`.
    pub destination: String,
    pub status: String,
    pub output_location: Option<String>,
    pub record_count: i64,
    pub filter_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
