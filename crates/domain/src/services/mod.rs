//! Domain services for the prospecting export service.

pub mod destinations;
pub mod predicate;

pub use destinations::{
    CrmClient, CrmContact, MailingListClient, MemorySpreadsheetWriter, MockCrmClient,
    MockMailingListClient, SpreadsheetWriter, Subscriber,
};
pub use predicate::{compile, compile_json, CompanyFilter, Criterion, Predicate};
