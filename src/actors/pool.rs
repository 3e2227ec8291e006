//! Collector worker pool
//!
//! Decouples the periodic triggers from task execution: `submit` only
//! enqueues, so a slow upload never delays the next sampling tick. Up to N
//! tasks run concurrently, N being the configured rate limit.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──► start() ──► submit()* ──► stop()
//!                                       │
//!                                       └─ closes the queue, workers drain
//!                                          what is left and exit
//! ```
//!
//! A handler error is logged and the task dropped. There is no retry: every
//! metric is sampled again on the next tick.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use super::messages::Task;

/// Executes the tasks dequeued by the pool's workers
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: Task) -> anyhow::Result<()>;
}

/// Reasons a task could not be enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The queue is at capacity
    QueueFull(Task),

    /// The pool has been stopped
    Closed(Task),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::QueueFull(task) => write!(f, "task queue is full, dropping {task}"),
            PoolError::Closed(task) => write!(f, "worker pool is stopped, dropping {task}"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Fixed set of workers consuming a bounded task queue
pub struct WorkerPool {
    size: usize,
    sender: Option<mpsc::Sender<Task>>,
    receiver: Arc<Mutex<mpsc::Receiver<Task>>>,
    handler: Arc<dyn TaskHandler>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool of `size` workers (at least one) with a queue holding
    /// up to `capacity` pending tasks
    pub fn new(size: usize, capacity: usize, handler: Arc<dyn TaskHandler>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        Self {
            size: size.max(1),
            sender: Some(sender),
            receiver: Arc::new(Mutex::new(receiver)),
            handler,
            workers: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Launch the workers. Calling this twice has no effect.
    pub fn start(&mut self) {
        if !self.workers.is_empty() {
            warn!("worker pool already started");
            return;
        }

        debug!("starting {} workers", self.size);
        self.workers = (0..self.size)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&self.receiver),
                    Arc::clone(&self.handler),
                ))
            })
            .collect();
    }

    /// Enqueue a task without waiting for queue space
    pub fn submit(&self, task: Task) -> Result<(), PoolError> {
        let Some(sender) = &self.sender else {
            return Err(PoolError::Closed(task));
        };

        sender.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(task) => PoolError::QueueFull(task),
            mpsc::error::TrySendError::Closed(task) => PoolError::Closed(task),
        })?;

        trace!("queued {}", task);
        Ok(())
    }

    /// Close the queue and wait until every worker has drained it
    ///
    /// In-flight tasks are never cancelled.
    #[instrument(skip(self), fields(workers = self.workers.len()))]
    pub async fn stop(mut self) {
        self.sender.take();

        let results = futures::future::join_all(self.workers.drain(..)).await;
        for result in results {
            if let Err(e) = result {
                error!("worker terminated abnormally: {}", e);
            }
        }

        debug!("worker pool stopped");
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Task>>>,
    handler: Arc<dyn TaskHandler>,
) {
    trace!("worker {id} started");

    loop {
        // The lock is released before the task runs, so other workers can
        // dequeue while this one is busy.
        let task = receiver.lock().await.recv().await;
        let Some(task) = task else {
            break;
        };

        trace!("worker {id} running {task}");
        if let Err(e) = handler.handle(task).await {
            error!("worker {id}: {task} failed: {:#}", e);
        }
    }

    trace!("worker {id} stopped");
}
