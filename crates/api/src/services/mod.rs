//! Export pipeline services.

pub mod destinations;
pub mod export;
pub mod export_runner;

pub use export::{ExportRequest, ExportService, FilterReference};
pub use export_runner::{ExportRunner, ExportTask, FilterSource};
