//! Clients for the external export destinations.
//!
//! The export pipeline talks to the spreadsheet storage, the CRM and the
//! mailing list only through these traits. HTTP implementations live in the
//! api crate; the mocks here back the tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::errors::DestinationError;
use crate::models::Company;

/// Contact record pushed to the CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmContact {
    pub cnpj: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub email: Option<String>,
    pub landline: Option<String>,
    pub mobile: Option<String>,
    pub state: Option<String>,
    pub municipality: Option<String>,
    pub primary_activity: Option<String>,
    pub size_code: Option<String>,
    pub share_capital: Option<f64>,
    #[serde(default)]
    pub partners: Vec<String>,
}

impl From<&Company> for CrmContact {
    fn from(company: &Company) -> Self {
        let head_office = company.head_office();
        Self {
            cnpj: company.registration_key.clone(),
            legal_name: company.legal_name.clone(),
            trade_name: company.primary_trade_name().map(str::to_string),
            email: company.email.clone(),
            landline: company.landline.clone(),
            mobile: company.mobile.clone(),
            state: head_office.and_then(|e| e.state.clone()),
            municipality: head_office.and_then(|e| e.municipality.clone()),
            primary_activity: head_office.and_then(|e| e.primary_activity.clone()),
            size_code: company.size_code.clone(),
            share_capital: company.share_capital,
            partners: company.partners.iter().map(|p| p.name.clone()).collect(),
        }
    }
}

/// Mailing list subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub email: String,
    pub name: String,
    pub cnpj: String,
    pub nome_fantasia: Option<String>,
}

impl Subscriber {
    /// Builds a subscriber from a company with a known email.
    pub fn from_company(company: &Company, email: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            name: company.legal_name.clone(),
            cnpj: company.registration_key.clone(),
            nome_fantasia: company.primary_trade_name().map(str::to_string),
        }
    }
}

/// Stores spreadsheet artifacts.
#[async_trait::async_trait]
pub trait SpreadsheetWriter: Send + Sync {
    /// Stores `contents` under `file_name` and returns its output location.
    async fn write(&self, file_name: &str, contents: Vec<u8>) -> Result<String, DestinationError>;

    /// Reads back an artifact by its output location.
    async fn read(&self, location: &str) -> Result<Option<Vec<u8>>, DestinationError>;
}

/// CRM connector.
#[async_trait::async_trait]
pub trait CrmClient: Send + Sync {
    /// Pushes one batch of contacts and returns the CRM acknowledgment.
    async fn push_batch(&self, contacts: &[CrmContact]) -> Result<JsonValue, DestinationError>;
}

/// Email-marketing list connector.
#[async_trait::async_trait]
pub trait MailingListClient: Send + Sync {
    /// Adds subscribers to the named list and returns the acknowledgment.
    async fn push_subscribers(
        &self,
        list_name: &str,
        subscribers: &[Subscriber],
    ) -> Result<JsonValue, DestinationError>;
}

/// In-memory artifact storage.
#[derive(Debug, Default)]
pub struct MemorySpreadsheetWriter {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySpreadsheetWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_names(&self) -> Vec<String> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = files.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait::async_trait]
impl SpreadsheetWriter for MemorySpreadsheetWriter {
    async fn write(&self, file_name: &str, contents: Vec<u8>) -> Result<String, DestinationError> {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.insert(file_name.to_string(), contents);
        Ok(file_name.to_string())
    }

    async fn read(&self, location: &str) -> Result<Option<Vec<u8>>, DestinationError> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        Ok(files.get(location).cloned())
    }
}

/// Mock CRM client for development and testing.
///
/// Records every batch it accepts. `fail_on_batch` makes the n-th call
/// (1-indexed) fail with a rejection.
#[derive(Debug, Default)]
pub struct MockCrmClient {
    pub fail_on_batch: Option<usize>,
    calls: Mutex<usize>,
    accepted: Mutex<Vec<Vec<CrmContact>>>,
}

impl MockCrmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock whose n-th batch is rejected.
    pub fn failing_on(batch: usize) -> Self {
        Self {
            fail_on_batch: Some(batch),
            ..Self::default()
        }
    }

    /// Batches accepted so far.
    pub fn accepted_batches(&self) -> Vec<Vec<CrmContact>> {
        self.accepted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl CrmClient for MockCrmClient {
    async fn push_batch(&self, contacts: &[CrmContact]) -> Result<JsonValue, DestinationError> {
        let call = {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            *calls += 1;
            *calls
        };

        if self.fail_on_batch == Some(call) {
            tracing::warn!(batch = call, "Mock CRM client simulating failure");
            return Err(DestinationError::Rejected {
                status: Some(500),
                message: format!("Simulated failure on batch {}", call),
            });
        }

        tracing::info!(
            batch = call,
            contacts = contacts.len(),
            "Mock: Would push contacts to CRM"
        );
        self.accepted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(contacts.to_vec());

        Ok(json!({ "batch": call, "accepted": contacts.len() }))
    }
}

/// Mock mailing list client for development and testing.
#[derive(Debug, Default)]
pub struct MockMailingListClient {
    pub simulate_failure: bool,
    pushed: Mutex<Vec<(String, Vec<Subscriber>)>>,
}

impl MockMailingListClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// `(list name, subscribers)` pairs received so far.
    pub fn pushed(&self) -> Vec<(String, Vec<Subscriber>)> {
        self.pushed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl MailingListClient for MockMailingListClient {
    async fn push_subscribers(
        &self,
        list_name: &str,
        subscribers: &[Subscriber],
    ) -> Result<JsonValue, DestinationError> {
        if self.simulate_failure {
            tracing::warn!(list_name = %list_name, "Mock mailing client simulating failure");
            return Err(DestinationError::Transport("Simulated failure".to_string()));
        }

        tracing::info!(
            list_name = %list_name,
            subscribers = subscribers.len(),
            "Mock: Would push subscribers to mailing list"
        );
        self.pushed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((list_name.to_string(), subscribers.to_vec()));

        Ok(json!({ "list": list_name, "imported": subscribers.len() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::company::fixtures::{company, establishment};
    use crate::models::Partner;

    #[test]
    fn test_crm_contact_from_company() {
        let mut c = company("12345678", "ACME LTDA");
        c.email = Some("a@acme.com".to_string());
        let mut branch = establishment("12345678000276", "RJ", "6001");
        branch.trade_name = Some("ACME RIO".to_string());
        c.establishments.push(branch);
        c.establishments
            .push(establishment("12345678000195", "SP", "7107"));
        c.partners.push(Partner {
            name: "JOAO DA SILVA".to_string(),
            document: None,
            qualification: None,
            joined_on: None,
        });

        let contact = CrmContact::from(&c);
        assert_eq!(contact.cnpj, "12345678");
        assert_eq!(contact.trade_name.as_deref(), Some("ACME RIO"));
        assert_eq!(contact.state.as_deref(), Some("SP"));
        assert_eq!(contact.partners, vec!["JOAO DA SILVA"]);
    }

    #[test]
    fn test_subscriber_from_company() {
        let mut c = company("12345678", "ACME LTDA");
        let mut e = establishment("12345678000195", "SP", "7107");
        e.trade_name = Some("ACME".to_string());
        c.establishments.push(e);

        let subscriber = Subscriber::from_company(&c, " a@acme.com ");
        assert_eq!(subscriber.email, "a@acme.com");
        assert_eq!(subscriber.name, "ACME LTDA");
        assert_eq!(subscriber.nome_fantasia.as_deref(), Some("ACME"));

        let json = serde_json::to_value(&subscriber).unwrap();
        assert_eq!(json["nomeFantasia"], "ACME");
    }

    #[tokio::test]
    async fn test_mock_crm_fails_on_requested_batch() {
        let client = MockCrmClient::failing_on(2);
        let batch = vec![CrmContact::from(&company("11111111", "A"))];

        assert!(client.push_batch(&batch).await.is_ok());
        assert!(client.push_batch(&batch).await.is_err());
        assert!(client.push_batch(&batch).await.is_ok());
        assert_eq!(client.call_count(), 3);
        assert_eq!(client.accepted_batches().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_writer_round_trip() {
        let writer = MemorySpreadsheetWriter::new();
        let location = writer.write("a.csv", b"x".to_vec()).await.unwrap();
        assert_eq!(writer.read(&location).await.unwrap(), Some(b"x".to_vec()));
        assert_eq!(writer.read("missing.csv").await.unwrap(), None);
    }
}
