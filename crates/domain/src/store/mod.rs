//! Storage abstractions used by the export pipeline.
//!
//! PostgreSQL implementations live in the persistence crate;
//! [`memory::InMemoryStore`] implements every trait for tests and local runs.

pub mod memory;

use chrono::{DateTime, Utc};
use shared::pagination::PageRequest;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::{
    Cnae, Company, CompanyPage, CompanyStatistics, Destination, ExportJob, IntegrationLogEntry,
    JobCompletion, NewExportJob, NewIntegrationLogEntry, NewSavedFilter, SavedFilter,
};
use crate::services::predicate::Predicate;

pub use memory::InMemoryStore;

/// Read access to the company registry plus the sent-flag update.
///
/// Establishments returned by every read carry their primary activity
/// description when the CNAE catalogue knows the code.
#[async_trait::async_trait]
pub trait CompanyStore: Send + Sync {
    /// One page of companies matching `predicate`, ordered by registration key,
    /// with establishments and tax regime loaded.
    async fn search(&self, predicate: &Predicate, page: PageRequest)
        -> Result<CompanyPage, StoreError>;

    /// Registry-wide counts computed from one snapshot, with
    /// `total_companies` holding the registry size.
    async fn aggregate_counts(&self) -> Result<CompanyStatistics, StoreError>;

    /// Company with establishments, partners and tax regime.
    async fn find_by_key(&self, registration_key: &str) -> Result<Option<Company>, StoreError>;

    /// Up to `limit` matching companies with establishments and partners loaded.
    async fn fetch_for_export(
        &self,
        predicate: &Predicate,
        limit: i64,
    ) -> Result<Vec<Company>, StoreError>;

    /// Catalogue entries for `codes`, ordered by code. Unknown codes are
    /// left out.
    async fn find_cnaes(&self, codes: &[String]) -> Result<Vec<Cnae>, StoreError>;

    /// Sets the destination's sent-flag on every key, all or nothing.
    ///
    /// Returns the number of companies updated. Destinations that do not
    /// track a flag update nothing.
    async fn mark_sent(&self, destination: Destination, keys: &[String])
        -> Result<u64, StoreError>;

    /// Connectivity check used by readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Export job records.
///
/// Status updates are guarded by the allowed predecessor statuses and return
/// `false` when the job was not in one of them.
#[async_trait::async_trait]
pub trait ExportJobStore: Send + Sync {
    /// Creates a job in the `queued` status.
    async fn create(&self, job: NewExportJob) -> Result<ExportJob, StoreError>;

    /// Job by id, visible only to its owner.
    async fn find(&self, owner_id: Uuid, id: Uuid) -> Result<Option<ExportJob>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ExportJob>, StoreError>;

    /// Owner's jobs, newest first.
    async fn list_for_owner(&self, owner_id: Uuid, limit: i64)
        -> Result<Vec<ExportJob>, StoreError>;

    /// `queued -> processing`.
    async fn mark_processing(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Moves the job to `completion.status`, which must be terminal, and
    /// appends `entry` to the integration log in the same write.
    ///
    /// Either both are stored or neither is. Returns `false`, writing
    /// nothing, when the status guard rejects the transition.
    async fn finish_with_log(
        &self,
        id: Uuid,
        completion: &JobCompletion,
        entry: NewIntegrationLogEntry,
    ) -> Result<bool, StoreError>;

    /// Jobs still `queued` or `processing` whose last update is older than
    /// `updated_before`.
    async fn find_unfinished(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<ExportJob>, StoreError>;
}

/// Read side of the integration log.
///
/// Entries are only written by [`ExportJobStore::finish_with_log`].
#[async_trait::async_trait]
pub trait IntegrationLogStore: Send + Sync {
    /// Entries of one job, oldest first.
    async fn list_for_job(&self, export_job_id: Uuid)
        -> Result<Vec<IntegrationLogEntry>, StoreError>;
}

/// Owner-scoped saved filters.
#[async_trait::async_trait]
pub trait FilterStore: Send + Sync {
    async fn create(&self, filter: NewSavedFilter) -> Result<SavedFilter, StoreError>;

    async fn find(&self, owner_id: Uuid, id: Uuid) -> Result<Option<SavedFilter>, StoreError>;

    /// Owner's filters ordered by name.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<SavedFilter>, StoreError>;

    async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        filter: NewSavedFilter,
    ) -> Result<Option<SavedFilter>, StoreError>;

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError>;
}
