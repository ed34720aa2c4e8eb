//! Bounded submission queue + worker group.
//!
//! Webhook handlers call [`TaskQueue::submit`] and return "accepted" right
//! away; `workers` tasks drain the queue and hand each item to the
//! dispatcher.
//!
//! - `submit` は待たない。満杯なら `SubmitError::QueueFull`（明示的な backpressure）
//! - `close` 以降の submit は `SubmitError::Closed`
//! - `shutdown_and_join` は受付を止め、キューに残った分まで処理してから終わる
//! - `request_shutdown` は手持ちの 1 件を終えたら止まる（残りは捨てる）
//!
//! Nothing is persisted: queued items are lost if the process exits.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatcher::TaskDispatcher;
use crate::domain::{AutomationRequest, RequestError, TaskId, WorkItem};
use crate::ports::IdGenerator;

/// SubmitError はキュー投入時のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("submission queue is full")]
    QueueFull,

    #[error("submission queue is closed")]
    Closed,

    #[error("invalid request: {0}")]
    Invalid(#[from] RequestError),
}

type SharedReceiver = Arc<AsyncMutex<mpsc::Receiver<WorkItem>>>;

/// Producer side of the queue plus the workers draining it.
pub struct TaskQueue {
    tx: Mutex<Option<mpsc::Sender<WorkItem>>>,
    capacity: usize,
    ids: Arc<dyn IdGenerator>,
    workers: WorkerGroup,
}

impl TaskQueue {
    /// Create a queue holding up to `capacity` items and spawn `workers`
    /// workers on the current runtime. Both are at least 1: the workers hold
    /// the only receiver, so a queue without workers would be closed.
    pub fn start(
        dispatcher: Arc<TaskDispatcher>,
        ids: Arc<dyn IdGenerator>,
        capacity: usize,
        workers: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let workers = WorkerGroup::spawn(workers, Arc::new(AsyncMutex::new(rx)), dispatcher);
        info!(capacity, workers = workers.len(), "task queue started");

        Self {
            tx: Mutex::new(Some(tx)),
            capacity,
            ids,
            workers,
        }
    }

    /// Enqueue a validated work item without waiting.
    pub fn submit(&self, item: WorkItem) -> Result<(), SubmitError> {
        let guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(tx) = guard.as_ref() else {
            return Err(SubmitError::Closed);
        };
        tx.try_send(item).map_err(|err| match err {
            TrySendError::Full(item) => {
                warn!(user_id = %item.user_id(), "submission queue full, rejecting");
                SubmitError::QueueFull
            }
            TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Validate a boundary request and enqueue it. Returns the task id for
    /// `task` requests (generated when the caller sent none).
    pub fn submit_request(&self, request: AutomationRequest) -> Result<Option<TaskId>, SubmitError> {
        let item = request.into_work_item(self.ids.as_ref())?;
        let task_id = match &item {
            WorkItem::Task(task) => Some(task.task_id.clone()),
            WorkItem::NewLead { .. } => None,
        };
        self.submit(item)?;
        if let Some(task_id) = &task_id {
            debug!(task_id = %task_id, "task accepted");
        }
        Ok(task_id)
    }

    /// Items waiting to be picked up.
    pub fn queued(&self) -> usize {
        let guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .map(|tx| self.capacity - tx.capacity())
            .unwrap_or(0)
    }

    /// Stop accepting new items. Workers keep draining what is queued.
    pub fn close(&self) {
        let mut guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }

    /// Stop workers after the item each one holds; queued items are dropped.
    pub fn request_shutdown(&self) {
        self.close();
        self.workers.request_shutdown();
    }

    /// Stop intake, process everything already queued, and wait.
    pub async fn shutdown_and_join(self) {
        self.close();
        self.workers.join().await;
        info!("task queue drained");
    }
}

/// Worker group handle.
/// - `shutdown_tx` で停止を通知する
/// - キューが close されて空になってもワーカーは終わる
struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    fn spawn(n: usize, rx: SharedReceiver, dispatcher: Arc<TaskDispatcher>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let joins = (0..n)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let dispatcher = Arc::clone(&dispatcher);
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(worker_loop(worker_id, rx, dispatcher, shutdown_rx))
            })
            .collect();

        Self { shutdown_tx, joins }
    }

    fn len(&self) -> usize {
        self.joins.len()
    }

    fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    async fn join(self) {
        for join in self.joins {
            if let Err(err) = join.await {
                warn!(error = %err, "worker ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: SharedReceiver,
    dispatcher: Arc<TaskDispatcher>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // recv は待つ可能性があるので shutdown と競合させる
        let item = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            item = next_item(&rx) => item,
        };

        let Some(item) = item else {
            debug!(worker_id, "queue closed and drained");
            break;
        };
        dispatcher.run_item(item).await;
    }
    debug!(worker_id, "worker stopped");
}

async fn next_item(rx: &SharedReceiver) -> Option<WorkItem> {
    rx.lock().await.recv().await
}
