//! Database entity definitions.

pub mod company;
pub mod export_job;
pub mod filter;
pub mod integration_log;

pub use company::{
    CnaeEntity, CompanyEntity, CompanyStatisticsEntity, EstablishmentEntity, PartnerEntity,
    TaxRegimeEntity,
};
pub use export_job::ExportJobEntity;
pub use filter::FilterEntity;
pub use integration_log::IntegrationLogEntity;
