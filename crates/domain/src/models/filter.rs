//! Saved filter domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

/// A named, persisted filter owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFilter {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Condition document, validated by the predicate compiler on write.
    pub conditions: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or replacing a saved filter.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveFilterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[serde(alias = "nome")]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    #[serde(default, alias = "descricao")]
    pub description: Option<String>,

    #[serde(default, alias = "condicoes")]
    pub conditions: JsonValue,
}

/// Input for persisting a filter once its conditions compiled.
#[derive(Debug, Clone)]
pub struct NewSavedFilter {
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub conditions: JsonValue,
}
