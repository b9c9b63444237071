//! Integration log domain models.
//!
//! Append-only record of every terminal export outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::str::FromStr;
use uuid::Uuid;

use super::export_job::Destination;

/// Outcome recorded for one export attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutcome {
    Success,
    /// Transfer succeeded but a follow-up step failed.
    Warning,
    Failure,
}

impl LogOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogOutcome::Success => "success",
            LogOutcome::Warning => "warning",
            LogOutcome::Failure => "failure",
        }
    }
}

impl FromStr for LogOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LogOutcome::Success),
            "warning" => Ok(LogOutcome::Warning),
            "failure" => Ok(LogOutcome::Failure),
            _ => Err(format!("Unknown log outcome: {}", s)),
        }
    }
}

impl std::fmt::Display for LogOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage at which an export failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    ResolveFilter,
    Fetch,
    Transfer,
    Timeout,
    Cancelled,
    /// Job abandoned by a previous process.
    Abandoned,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::ResolveFilter => "resolve_filter",
            FailureStage::Fetch => "fetch",
            FailureStage::Transfer => "transfer",
            FailureStage::Timeout => "timeout",
            FailureStage::Cancelled => "cancelled",
            FailureStage::Abandoned => "abandoned",
        }
    }
}

/// A stored log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationLogEntry {
    pub id: Uuid,
    pub export_job_id: Uuid,
    pub destination: Destination,
    pub outcome: LogOutcome,
    pub message: String,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a log entry.
///
/// `details` always carries `exportJobId`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIntegrationLogEntry {
    pub export_job_id: Uuid,
    pub destination: Destination,
    pub outcome: LogOutcome,
    pub message: String,
    pub details: JsonValue,
}

impl NewIntegrationLogEntry {
    fn base(
        export_job_id: Uuid,
        destination: Destination,
        outcome: LogOutcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            export_job_id,
            destination,
            outcome,
            message: message.into(),
            details: json!({ "exportJobId": export_job_id }),
        }
    }

    pub fn success(
        export_job_id: Uuid,
        destination: Destination,
        record_count: i64,
        acknowledgment: Option<JsonValue>,
    ) -> Self {
        let mut entry = Self::base(
            export_job_id,
            destination,
            LogOutcome::Success,
            format!("Exported {} records to {}", record_count, destination),
        );
        entry.insert("recordCount", json!(record_count));
        if let Some(ack) = acknowledgment {
            entry.insert("acknowledgment", ack);
        }
        entry
    }

    pub fn warning(
        export_job_id: Uuid,
        destination: Destination,
        record_count: i64,
        warning: impl Into<String>,
    ) -> Self {
        let warning = warning.into();
        let mut entry = Self::base(
            export_job_id,
            destination,
            LogOutcome::Warning,
            format!(
                "Exported {} records to {} but could not mark them as sent",
                record_count, destination
            ),
        );
        entry.insert("recordCount", json!(record_count));
        entry.insert("warning", json!(warning));
        entry
    }

    pub fn failure(
        export_job_id: Uuid,
        destination: Destination,
        stage: FailureStage,
        error: impl Into<String>,
        diagnostic: Option<JsonValue>,
    ) -> Self {
        let error = error.into();
        let mut entry = Self::base(
            export_job_id,
            destination,
            LogOutcome::Failure,
            format!("Export to {} failed: {}", destination, error),
        );
        entry.insert("error", json!(error));
        entry.insert("stage", json!(stage.as_str()));
        if let Some(diagnostic) = diagnostic {
            entry.insert("diagnostic", diagnostic);
        }
        entry
    }

    fn insert(&mut self, key: &str, value: JsonValue) {
        if let JsonValue::Object(map) = &mut self.details {
            map.insert(key.to_string(), value);
        } else {
            let mut map = Map::new();
            map.insert("exportJobId".to_string(), json!(self.export_job_id));
            map.insert(key.to_string(), value);
            self.details = JsonValue::Object(map);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_entry_details() {
        let job_id = Uuid::new_v4();
        let entry = NewIntegrationLogEntry::success(
            job_id,
            Destination::Crm,
            3,
            Some(json!({ "accepted": 3 })),
        );

        assert_eq!(entry.outcome, LogOutcome::Success);
        assert_eq!(entry.details["exportJobId"], json!(job_id));
        assert_eq!(entry.details["recordCount"], 3);
        assert_eq!(entry.details["acknowledgment"]["accepted"], 3);
    }

    #[test]
    fn test_failure_entry_details() {
        let job_id = Uuid::new_v4();
        let entry = NewIntegrationLogEntry::failure(
            job_id,
            Destination::Mailing,
            FailureStage::Transfer,
            "connection refused",
            None,
        );

        assert_eq!(entry.outcome, LogOutcome::Failure);
        assert_eq!(entry.details["exportJobId"], json!(job_id));
        assert_eq!(entry.details["error"], "connection refused");
        assert_eq!(entry.details["stage"], "transfer");
        assert!(entry.message.contains("mailing"));
    }

    #[test]
    fn test_warning_entry_details() {
        let entry = NewIntegrationLogEntry::warning(
            Uuid::new_v4(),
            Destination::Crm,
            2,
            "database unavailable",
        );
        assert_eq!(entry.outcome, LogOutcome::Warning);
        assert_eq!(entry.details["warning"], "database unavailable");
    }

    #[test]
    fn test_outcome_parsing() {
        assert_eq!("warning".parse::<LogOutcome>().unwrap(), LogOutcome::Warning);
        assert!("other".parse::<LogOutcome>().is_err());
    }
}
