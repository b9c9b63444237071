//! Background work: the export worker pool and periodic maintenance jobs.

mod export_worker;
mod pool_metrics;
mod scheduler;
mod stale_exports;

pub use export_worker::{ActiveExports, ExportQueue, ExportWorkerPool, QueueSlot};
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobScheduler};
pub use stale_exports::StaleExportsJob;
