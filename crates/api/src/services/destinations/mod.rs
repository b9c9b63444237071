//! Destination executors.
//!
//! An executor receives the fetched records of one job and delivers them to
//! its destination. Executors never touch job records; the export runner
//! owns status transitions and logging.

mod crm;
mod file;
mod http_clients;
mod mailing;

use std::sync::Arc;

use domain::errors::DestinationError;
use domain::models::{Company, Destination, ExportJob};
use serde_json::Value as JsonValue;

pub use crm::CrmExecutor;
pub use file::{FileExecutor, FsSpreadsheetWriter};
pub use http_clients::{DisabledDestination, HttpCrmClient, HttpMailingListClient};
pub use mailing::MailingExecutor;

/// Input for one executor run.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    pub job: &'a ExportJob,
    /// Mailing list name requested by the caller.
    pub list_name: Option<&'a str>,
    /// Job name supplied by the caller, before defaulting.
    pub supplied_name: Option<&'a str>,
    pub records: &'a [Company],
}

/// What a destination accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorResult {
    pub delivered_count: usize,
    /// Registration keys of the delivered companies.
    pub delivered_keys: Vec<String>,
    pub output_location: Option<String>,
    pub acknowledgment: Option<JsonValue>,
}

#[async_trait::async_trait]
pub trait DestinationExecutor: Send + Sync {
    fn destination(&self) -> Destination;

    async fn execute(
        &self,
        request: ExecutionRequest<'_>,
    ) -> Result<ExecutorResult, DestinationError>;
}

/// One executor per destination.
#[derive(Clone)]
pub struct Executors {
    file: Arc<dyn DestinationExecutor>,
    crm: Arc<dyn DestinationExecutor>,
    mailing: Arc<dyn DestinationExecutor>,
}

impl Executors {
    pub fn new(
        file: Arc<dyn DestinationExecutor>,
        crm: Arc<dyn DestinationExecutor>,
        mailing: Arc<dyn DestinationExecutor>,
    ) -> Self {
        Self { file, crm, mailing }
    }

    pub fn get(&self, destination: Destination) -> &dyn DestinationExecutor {
        match destination {
            Destination::File => self.file.as_ref(),
            Destination::Crm => self.crm.as_ref(),
            Destination::Mailing => self.mailing.as_ref(),
        }
    }
}
