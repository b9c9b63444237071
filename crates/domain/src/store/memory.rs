//! In-memory implementation of every store trait.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use shared::pagination::PageRequest;
use uuid::Uuid;

use super::{CompanyStore, ExportJobStore, FilterStore, IntegrationLogStore};
use crate::errors::StoreError;
use crate::models::{
    Cnae, Company, CompanyPage, CompanyStatistics, Destination, ExportJob, ExportJobStatus,
    IntegrationLogEntry, JobCompletion, NewExportJob, NewIntegrationLogEntry, NewSavedFilter,
    SavedFilter,
};
use crate::services::predicate::{ContactField, Criterion, Predicate};

#[derive(Debug, Default)]
struct Inner {
    companies: BTreeMap<String, Company>,
    jobs: HashMap<Uuid, ExportJob>,
    logs: Vec<IntegrationLogEntry>,
    filters: HashMap<Uuid, SavedFilter>,
    cnaes: BTreeMap<String, String>,
}

/// Thread-safe in-memory store.
///
/// Locks are never held across an await point.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    fail_mark_sent: AtomicBool,
    fail_log_write: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_companies(companies: impl IntoIterator<Item = Company>) -> Self {
        let store = Self::new();
        for company in companies {
            store.insert_company(company);
        }
        store
    }

    pub fn insert_company(&self, company: Company) {
        self.write()
            .companies
            .insert(company.registration_key.clone(), company);
    }

    pub fn insert_cnae(&self, code: &str, description: &str) {
        self.write()
            .cnaes
            .insert(code.to_string(), description.to_string());
    }

    /// Makes every subsequent `mark_sent` call fail.
    pub fn set_fail_mark_sent(&self, fail: bool) {
        self.fail_mark_sent.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent integration log write fail, along with the
    /// status update it belongs to.
    pub fn set_fail_log_write(&self, fail: bool) {
        self.fail_log_write.store(fail, Ordering::SeqCst);
    }

    pub fn company(&self, registration_key: &str) -> Option<Company> {
        self.read().companies.get(registration_key).cloned()
    }

    /// Every log entry, in append order.
    pub fn all_logs(&self) -> Vec<IntegrationLogEntry> {
        self.read().logs.clone()
    }

    /// Overrides a job's `updated_at`, for reaper tests.
    pub fn backdate_job(&self, id: Uuid, updated_at: DateTime<Utc>) {
        if let Some(job) = self.write().jobs.get_mut(&id) {
            job.updated_at = updated_at;
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of `company` with primary activity descriptions filled in.
    fn described(inner: &Inner, company: &Company) -> Company {
        let mut company = company.clone();
        for establishment in &mut company.establishments {
            establishment.primary_activity_description = establishment
                .primary_activity
                .as_ref()
                .and_then(|code| inner.cnaes.get(code))
                .cloned();
        }
        company
    }

    fn matching<'a>(
        inner: &'a Inner,
        predicate: &'a Predicate,
    ) -> impl Iterator<Item = &'a Company> + 'a {
        inner.companies.values().filter(move |c| predicate.matches(c))
    }

    fn transition(&self, id: Uuid, next: ExportJobStatus) -> bool {
        let mut inner = self.write();
        match inner.jobs.get_mut(&id) {
            Some(job) if job.status.can_transition_to(next) => {
                job.status = next;
                job.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

#[async_trait::async_trait]
impl CompanyStore for InMemoryStore {
    async fn search(
        &self,
        predicate: &Predicate,
        page: PageRequest,
    ) -> Result<CompanyPage, StoreError> {
        let inner = self.read();
        let total = Self::matching(&inner, predicate).count() as i64;
        let records = Self::matching(&inner, predicate)
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|c| Company {
                partners: Vec::new(),
                ..Self::described(&inner, c)
            })
            .collect();

        Ok(CompanyPage { records, total })
    }

    async fn aggregate_counts(&self) -> Result<CompanyStatistics, StoreError> {
        let inner = self.read();
        let present = |field: ContactField| Criterion::Present { field };
        let (email, landline, mobile) = (
            present(ContactField::Email),
            present(ContactField::Landline),
            present(ContactField::Mobile),
        );

        let mut stats = CompanyStatistics::default();
        for company in inner.companies.values() {
            stats.total_companies += 1;
            if !company.active {
                continue;
            }
            stats.active_companies += 1;
            stats.active_with_email += email.matches(company) as i64;
            stats.active_with_landline += landline.matches(company) as i64;
            stats.active_with_mobile += mobile.matches(company) as i64;
        }
        Ok(stats)
    }

    async fn find_by_key(&self, registration_key: &str) -> Result<Option<Company>, StoreError> {
        let inner = self.read();
        Ok(inner
            .companies
            .get(registration_key)
            .map(|c| Self::described(&inner, c)))
    }

    async fn fetch_for_export(
        &self,
        predicate: &Predicate,
        limit: i64,
    ) -> Result<Vec<Company>, StoreError> {
        let inner = self.read();
        Ok(Self::matching(&inner, predicate)
            .take(limit.max(0) as usize)
            .map(|c| Self::described(&inner, c))
            .collect())
    }

    async fn find_cnaes(&self, codes: &[String]) -> Result<Vec<Cnae>, StoreError> {
        let inner = self.read();
        let mut found: Vec<Cnae> = codes
            .iter()
            .filter_map(|code| {
                inner.cnaes.get(code).map(|description| Cnae {
                    code: code.clone(),
                    description: description.clone(),
                })
            })
            .collect();
        found.sort_by(|a, b| a.code.cmp(&b.code));
        found.dedup();
        Ok(found)
    }

    async fn mark_sent(
        &self,
        destination: Destination,
        keys: &[String],
    ) -> Result<u64, StoreError> {
        if !destination.tracks_sent_flag() || keys.is_empty() {
            return Ok(0);
        }
        if self.fail_mark_sent.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "simulated sent-flag failure".to_string(),
            ));
        }

        let mut inner = self.write();
        let mut updated = 0;
        for key in keys {
            if let Some(company) = inner.companies.get_mut(key) {
                match destination {
                    Destination::Crm => company.sent_to_crm = true,
                    Destination::Mailing => company.sent_to_mailing = true,
                    Destination::File => {}
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl ExportJobStore for InMemoryStore {
    async fn create(&self, job: NewExportJob) -> Result<ExportJob, StoreError> {
        let now = Utc::now();
        let job = ExportJob {
            id: Uuid::new_v4(),
            owner_id: job.owner_id,
            name: job.name,
            destination: job.destination,
            status: ExportJobStatus::Queued,
            output_location: None,
            record_count: 0,
            filter_id: job.filter_id,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.write().jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find(&self, owner_id: Uuid, id: Uuid) -> Result<Option<ExportJob>, StoreError> {
        Ok(self
            .read()
            .jobs
            .get(&id)
            .filter(|job| job.owner_id == owner_id)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ExportJob>, StoreError> {
        Ok(self.read().jobs.get(&id).cloned())
    }

    async fn list_for_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExportJob>, StoreError> {
        let mut jobs: Vec<ExportJob> = self
            .read()
            .jobs
            .values()
            .filter(|job| job.owner_id == owner_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.transition(id, ExportJobStatus::Processing))
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

        let mut inner = self.write();
        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if !job.status.can_transition_to(completion.status) {
            return Ok(false);
        }
        if self.fail_log_write.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "simulated integration log failure".to_string(),
            ));
        }

        let now = Utc::now();
        job.status = completion.status;
        job.record_count = completion.record_count;
        job.output_location = completion.output_location.clone();
        job.error_message = completion.error_message.clone();
        job.updated_at = now;
        job.completed_at = Some(now);

        inner.logs.push(IntegrationLogEntry {
            id: Uuid::new_v4(),
            export_job_id: entry.export_job_id,
            destination: entry.destination,
            outcome: entry.outcome,
            message: entry.message,
            details: entry.details,
            created_at: now,
        });
        Ok(true)
    }

    async fn find_unfinished(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<ExportJob>, StoreError> {
        Ok(self
            .read()
            .jobs
            .values()
            .filter(|job| !job.status.is_terminal() && job.updated_at < updated_before)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl IntegrationLogStore for InMemoryStore {
    async fn list_for_job(
        &self,
        export_job_id: Uuid,
    ) -> Result<Vec<IntegrationLogEntry>, StoreError> {
        Ok(self
            .read()
            .logs
            .iter()
            .filter(|entry| entry.export_job_id == export_job_id)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl FilterStore for InMemoryStore {
    async fn create(&self, filter: NewSavedFilter) -> Result<SavedFilter, StoreError> {
        let now = Utc::now();
        let saved = SavedFilter {
            id: Uuid::new_v4(),
            owner_id: filter.owner_id,
            name: filter.name,
            description: filter.description,
            conditions: filter.conditions,
            created_at: now,
            updated_at: now,
        };
        self.write().filters.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find(&self, owner_id: Uuid, id: Uuid) -> Result<Option<SavedFilter>, StoreError> {
        Ok(self
            .read()
            .filters
            .get(&id)
            .filter(|f| f.owner_id == owner_id)
            .cloned())
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<SavedFilter>, StoreError> {
        let mut filters: Vec<SavedFilter> = self
            .read()
            .filters
            .values()
            .filter(|f| f.owner_id == owner_id)
            .cloned()
            .collect();
        filters.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(filters)
    }

    async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        filter: NewSavedFilter,
    ) -> Result<Option<SavedFilter>, StoreError> {
        let mut inner = self.write();
        match inner.filters.get_mut(&id) {
            Some(saved) if saved.owner_id == owner_id => {
                saved.name = filter.name;
                saved.description = filter.description;
                saved.conditions = filter.conditions;
                saved.updated_at = Utc::now();
                Ok(Some(saved.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.write();
        match inner.filters.get(&id) {
            Some(saved) if saved.owner_id == owner_id => {
                inner.filters.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
