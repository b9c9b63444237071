//! Domain models for the prospecting export service.

pub mod company;
pub mod export_job;
pub mod filter;
pub mod integration_log;

pub use company::{
    Cnae, Company, CompanyPage, CompanyStatistics, Establishment, Partner, TaxRegime,
};
pub use export_job::{
    Destination, ExportJob, ExportJobStatus, ExportJobStatusView, JobCompletion, NewExportJob,
    DEFAULT_MAILING_LIST_NAME,
};
pub use filter::{NewSavedFilter, SaveFilterRequest, SavedFilter};
pub use integration_log::{FailureStage, IntegrationLogEntry, LogOutcome, NewIntegrationLogEntry};
