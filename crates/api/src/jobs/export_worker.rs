//! Bounded export queue and its worker pool.
//!
//! Submissions reserve a queue slot before a job record exists, so a full
//! queue rejects the request without leaving an orphaned `queued` job.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use domain::errors::ExportError;
use domain::models::Destination;
use tokio::sync::mpsc::{self, error::TrySendError, OwnedPermit};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::middleware::metrics::record_queue_rejection;
use crate::services::export_runner::{ExportRunner, ExportTask};

/// Ids of jobs sent to this process's queue whose run has not ended yet.
#[derive(Clone, Default)]
pub struct ActiveExports(Arc<Mutex<HashSet<Uuid>>>);

impl ActiveExports {
    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn insert(&self, id: Uuid) {
        self.lock().insert(id);
    }

    fn remove(&self, id: Uuid) {
        self.lock().remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Sending half of the export queue.
#[derive(Clone)]
pub struct ExportQueue {
    sender: mpsc::Sender<ExportTask>,
    active: ActiveExports,
}

/// A reserved queue slot.
pub struct QueueSlot {
    permit: OwnedPermit<ExportTask>,
    active: ActiveExports,
}

impl QueueSlot {
    pub fn send(self, task: ExportTask) {
        self.active.insert(task.job.id);
        self.permit.send(task);
    }
}

impl ExportQueue {
    /// Creates a queue holding up to `depth` tasks.
    pub fn bounded(depth: usize) -> (Self, mpsc::Receiver<ExportTask>) {
        let (sender, receiver) = mpsc::channel(depth.max(1));
        let queue = Self {
            sender,
            active: ActiveExports::default(),
        };
        (queue, receiver)
    }

    /// Reserves a slot without waiting.
    pub fn reserve(&self, destination: Destination) -> Result<QueueSlot, ExportError> {
        match self.sender.clone().try_reserve_owned() {
            Ok(permit) => Ok(QueueSlot {
                permit,
                active: self.active.clone(),
            }),
            Err(TrySendError::Full(_)) => {
                record_queue_rejection(destination);
                warn!(destination = %destination, "Export queue full, rejecting submission");
                Err(ExportError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(ExportError::QueueClosed),
        }
    }

    /// Jobs queued or running in this process.
    pub fn active(&self) -> ActiveExports {
        self.active.clone()
    }
}

/// Fixed number of workers draining the export queue.
pub struct ExportWorkerPool {
    cancel: CancellationToken,
    dispatcher: JoinHandle<()>,
}

impl ExportWorkerPool {
    /// Starts `workers` workers on a new queue of `queue_depth` slots.
    pub fn start(
        runner: Arc<ExportRunner>,
        workers: usize,
        queue_depth: usize,
    ) -> (ExportQueue, Self) {
        let (queue, receiver) = ExportQueue::bounded(queue_depth);
        let pool = Self::spawn(runner, receiver, queue.active(), workers);
        (queue, pool)
    }

    /// Starts workers draining an existing queue.
    pub fn spawn(
        runner: Arc<ExportRunner>,
        receiver: mpsc::Receiver<ExportTask>,
        active: ActiveExports,
        workers: usize,
    ) -> Self {
        let cancel = CancellationToken::new();
        let dispatcher = tokio::spawn(dispatch(
            runner,
            receiver,
            active,
            workers.max(1),
            cancel.clone(),
        ));
        info!(workers, "Export worker pool started");
        Self { cancel, dispatcher }
    }

    /// Cancels in-flight exports and waits for the workers to record them.
    ///
    /// Tasks still queued, including those sent through slots reserved before
    /// shutdown began, are run against the cancelled token and fail as
    /// cancelled.
    pub async fn shutdown(self, timeout: Duration) {
        info!("Shutting down export worker pool");
        self.cancel.cancel();

        match tokio::time::timeout(timeout, self.dispatcher).await {
            Ok(Ok(())) => info!("Export workers stopped"),
            Ok(Err(e)) => warn!("Export dispatcher panicked: {}", e),
            Err(_) => warn!("Export worker shutdown timed out after {:?}", timeout),
        }
    }
}

async fn dispatch(
    runner: Arc<ExportRunner>,
    mut receiver: mpsc::Receiver<ExportTask>,
    active: ActiveExports,
    workers: usize,
    cancel: CancellationToken,
) {
    let slots = Arc::new(Semaphore::new(workers));

    loop {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            task = receiver.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        let runner = Arc::clone(&runner);
        let active = active.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let job_id = task.job.id;
            runner.run(task, &cancel).await;
            active.remove(job_id);
            drop(permit);
        });
    }

    // Waits for outstanding slots too; `shutdown` bounds the wait
    receiver.close();
    while let Some(task) = receiver.recv().await {
        let job_id = task.job.id;
        runner.run(task, &cancel).await;
        active.remove(job_id);
    }

    let _ = slots.acquire_many(workers as u32).await;
}
