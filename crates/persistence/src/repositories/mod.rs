//! Repository implementations of the domain store traits.

pub mod company;
pub mod export_job;
pub mod filter;
pub mod integration_log;
mod predicate_sql;

pub use company::CompanyRepository;
pub use export_job::ExportJobRepository;
pub use filter::FilterRepository;
pub use integration_log::IntegrationLogRepository;
