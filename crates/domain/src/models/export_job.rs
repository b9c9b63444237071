//! Export job domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ValidationError;

/// Mailing list used when neither a list name nor a job name is supplied.
pub const DEFAULT_MAILING_LIST_NAME: &str = "Prospecção CNPJ";

/// Where an export delivers its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Spreadsheet file artifact.
    File,
    /// CRM system.
    Crm,
    /// Email-marketing list.
    Mailing,
}

impl Destination {
    pub const ALL: [Destination; 3] = [Destination::File, Destination::Crm, Destination::Mailing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::File => "file",
            Destination::Crm => "crm",
            Destination::Mailing => "mailing",
        }
    }

    /// Human label used in default job names.
    pub fn label(&self) -> &'static str {
        match self {
            Destination::File => "Spreadsheet",
            Destination::Crm => "CRM",
            Destination::Mailing => "Mailing",
        }
    }

    /// Maximum number of records one export may fetch.
    pub fn record_cap(&self) -> i64 {
        match self {
            Destination::File => 10_000,
            Destination::Crm => 5_000,
            Destination::Mailing => 10_000,
        }
    }

    /// Whether a successful export flips a sent-flag on the company.
    pub fn tracks_sent_flag(&self) -> bool {
        matches!(self, Destination::Crm | Destination::Mailing)
    }
}

impl FromStr for Destination {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "excel" | "file" => Ok(Destination::File),
            "crm" => Ok(Destination::Crm),
            "email" | "mailing" => Ok(Destination::Mailing),
            _ => Err(ValidationError::UnsupportedDestination(s.to_string())),
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Export job status.
///
/// Transitions only move forward:
/// `queued -> processing -> completed | completed_with_warnings | failed`
/// and `queued -> failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportJobStatus {
    Queued,
    Processing,
    Completed,
    CompletedWithWarnings,
    Failed,
}

impl ExportJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportJobStatus::Queued => "queued",
            ExportJobStatus::Processing => "processing",
            ExportJobStatus::Completed => "completed",
            ExportJobStatus::CompletedWithWarnings => "completed_with_warnings",
            ExportJobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExportJobStatus::Completed
                | ExportJobStatus::CompletedWithWarnings
                | ExportJobStatus::Failed
        )
    }

    /// Statuses that may move to `self`.
    pub fn allowed_predecessors(&self) -> &'static [ExportJobStatus] {
        match self {
            ExportJobStatus::Queued => &[],
            ExportJobStatus::Processing => &[ExportJobStatus::Queued],
            ExportJobStatus::Completed | ExportJobStatus::CompletedWithWarnings => {
                &[ExportJobStatus::Processing]
            }
            ExportJobStatus::Failed => &[ExportJobStatus::Queued, ExportJobStatus::Processing],
        }
    }

    pub fn can_transition_to(&self, next: ExportJobStatus) -> bool {
        next.allowed_predecessors().contains(self)
    }
}

impl FromStr for ExportJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ExportJobStatus::Queued),
            "processing" => Ok(ExportJobStatus::Processing),
            "completed" => Ok(ExportJobStatus::Completed),
            "completed_with_warnings" => Ok(ExportJobStatus::CompletedWithWarnings),
            "failed" => Ok(ExportJobStatus::Failed),
            _ => Err(format!("Unknown export job status: {}", s)),
        }
    }
}

impl std::fmt::Display for ExportJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted state of one export request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub destination: Destination,
    pub status: ExportJobStatus,
    pub output_location: Option<String>,
    pub record_count: i64,
    pub filter_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for creating a job in the `queued` status.
#[derive(Debug, Clone)]
pub struct NewExportJob {
    pub owner_id: Uuid,
    pub name: String,
    pub destination: Destination,
    pub filter_id: Option<Uuid>,
}

impl NewExportJob {
    /// Builds a new job, defaulting the name to `"<label> export <timestamp>"`.
    pub fn new(
        owner_id: Uuid,
        destination: Destination,
        name: Option<String>,
        filter_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{} export {}", destination.label(), now.to_rfc3339()));

        Self {
            owner_id,
            name,
            destination,
            filter_id,
        }
    }
}

/// Terminal outcome written by the worker that ran the job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCompletion {
    pub status: ExportJobStatus,
    pub record_count: i64,
    pub output_location: Option<String>,
    pub error_message: Option<String>,
}

/// Read-only status snapshot returned to pollers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobStatusView {
    pub id: Uuid,
    pub status: ExportJobStatus,
    pub destination: Destination,
    pub record_count: i64,
    pub output_location: Option<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ExportJob> for ExportJobStatusView {
    fn from(job: &ExportJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            destination: job.destination,
            record_count: job.record_count,
            output_location: job.output_location.clone(),
            error: job.error_message.clone(),
            updated_at: job.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_from_path_segment() {
        assert_eq!("excel".parse::<Destination>().unwrap(), Destination::File);
        assert_eq!("file".parse::<Destination>().unwrap(), Destination::File);
        assert_eq!("CRM".parse::<Destination>().unwrap(), Destination::Crm);
        assert_eq!("email".parse::<Destination>().unwrap(), Destination::Mailing);
        assert_eq!("mailing".parse::<Destination>().unwrap(), Destination::Mailing);
        assert!(matches!(
            "fax".parse::<Destination>(),
            Err(ValidationError::UnsupportedDestination(_))
        ));
    }

    #[test]
    fn test_record_caps() {
        assert_eq!(Destination::File.record_cap(), 10_000);
        assert_eq!(Destination::Crm.record_cap(), 5_000);
        assert_eq!(Destination::Mailing.record_cap(), 10_000);
    }

    #[test]
    fn test_sent_flag_tracking() {
        assert!(!Destination::File.tracks_sent_flag());
        assert!(Destination::Crm.tracks_sent_flag());
        assert!(Destination::Mailing.tracks_sent_flag());
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        use ExportJobStatus::*;

        assert!(Queued.can_transition_to(Processing));
        assert!(Queued.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(CompletedWithWarnings));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Queued.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Queued));
        for terminal in [Completed, CompletedWithWarnings, Failed] {
            assert!(terminal.is_terminal());
            for next in [Queued, Processing, Completed, CompletedWithWarnings, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ExportJobStatus::Queued,
            ExportJobStatus::Processing,
            ExportJobStatus::Completed,
            ExportJobStatus::CompletedWithWarnings,
            ExportJobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ExportJobStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_new_job_default_name() {
        let now = Utc::now();
        let job = NewExportJob::new(Uuid::new_v4(), Destination::Crm, None, None, now);
        assert_eq!(job.name, format!("CRM export {}", now.to_rfc3339()));

        let job = NewExportJob::new(
            Uuid::new_v4(),
            Destination::Crm,
            Some("   ".to_string()),
            None,
            now,
        );
        assert!(job.name.starts_with("CRM export "));

        let job = NewExportJob::new(
            Uuid::new_v4(),
            Destination::File,
            Some("Leads SP".to_string()),
            None,
            now,
        );
        assert_eq!(job.name, "Leads SP");
    }
}
