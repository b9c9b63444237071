//! Periodic maintenance jobs.
//!
//! Each registered job runs on its own task at a fixed period until the
//! scheduler is shut down. A failing run is logged and retried on the next
//! tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::errors::StoreError;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A periodic background job.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Time between two runs.
    fn period(&self) -> Duration;

    /// Whether the first run happens at start instead of one period later.
    fn run_on_start(&self) -> bool {
        false
    }

    /// Runs the job once and returns how many items it handled.
    async fn execute(&self) -> Result<usize, StoreError>;
}

/// Runs registered jobs until shutdown.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Spawns one task per registered job.
    pub fn start(&mut self) {
        info!(jobs = self.jobs.len(), "Starting job scheduler");

        for job in self.jobs.drain(..) {
            self.tasks.spawn(run_periodically(job, self.cancel.clone()));
        }
    }

    /// Signals every job to stop. Returns immediately.
    pub fn shutdown(&self) {
        info!("Stopping job scheduler");
        self.cancel.cancel();
    }

    /// Waits for job tasks to exit, up to `timeout`.
    pub async fn wait_for_shutdown(mut self, timeout: Duration) {
        let drain = async {
            while let Some(result) = self.tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Job task panicked");
                }
            }
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(()) => info!("Job scheduler stopped"),
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Job scheduler shutdown timed out");
                self.tasks.abort_all();
            }
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_periodically(job: Arc<dyn Job>, cancel: CancellationToken) {
    let name = job.name();
    let mut interval = tokio::time::interval(job.period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first tick completes immediately
    if !job.run_on_start() {
        interval.tick().await;
    }

    debug!(job = name, period_secs = job.period().as_secs(), "Job scheduled");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => run_once(job.as_ref()).await,
        }
    }

    debug!(job = name, "Job stopped");
}

async fn run_once(job: &dyn Job) {
    let name = job.name();
    let start = Instant::now();

    match job.execute().await {
        Ok(0) => debug!(job = name, "Job found nothing to do"),
        Ok(handled) => info!(
            job = name,
            handled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Job completed"
        ),
        Err(e) => error!(
            job = name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            error = %e,
            "Job failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        on_start: bool,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn period(&self) -> Duration {
            Duration::from_secs(600)
        }

        fn run_on_start(&self) -> bool {
            self.on_start
        }

        async fn execute(&self) -> Result<usize, StoreError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(StoreError::Unavailable("database down".into()))
            } else {
                Ok(1)
            }
        }
    }

    async fn runs_after_start(on_start: bool, fail: bool) -> usize {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler.register(CountingJob {
            runs: runs.clone(),
            on_start,
            fail,
        });
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(2)).await;

        runs.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_run_on_start_job_runs_immediately() {
        assert_eq!(runs_after_start(true, false).await, 1);
    }

    #[tokio::test]
    async fn test_periodic_job_waits_one_period() {
        assert_eq!(runs_after_start(false, false).await, 0);
    }

    #[tokio::test]
    async fn test_failing_job_keeps_scheduler_alive() {
        assert_eq!(runs_after_start(true, true).await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_jobs() {
        let mut scheduler = JobScheduler::new();
        scheduler.start();
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_millis(100)).await;
    }
}
