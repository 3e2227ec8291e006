//! SnapshotActor - periodic and shutdown exports of the aggregator store
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick ──► export ──► log result, keep ticking
//!     ↑
//!     └─── Commands (ExportNow, Shutdown → final export → exit)
//! ```
//!
//! A failed periodic export is logged and the timer continues. The shutdown
//! export result is handed back to the caller.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use super::messages::SnapshotCommand;
use crate::storage::{MetricStore, snapshot};

pub struct SnapshotActor {
    store: Arc<dyn MetricStore>,
    path: PathBuf,

    /// `None` disables the timer; only explicit and shutdown exports run
    interval: Option<Duration>,

    command_rx: mpsc::Receiver<SnapshotCommand>,
}

impl SnapshotActor {
    pub fn new(
        store: Arc<dyn MetricStore>,
        path: PathBuf,
        interval: Option<Duration>,
        command_rx: mpsc::Receiver<SnapshotCommand>,
    ) -> Self {
        Self {
            store,
            path,
            interval: interval.filter(|period| !period.is_zero()),
            command_rx,
        }
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn run(mut self) {
        debug!("starting snapshot actor (interval: {:?})", self.interval);

        let mut ticker = self.interval.map(|period| {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                _ = tick(&mut ticker) => {
                    if let Err(e) = self.export().await {
                        error!("periodic snapshot failed: {:#}", e);
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SnapshotCommand::ExportNow { respond_to }) => {
                            let _ = respond_to.send(self.export().await);
                        }

                        Some(SnapshotCommand::Shutdown { respond_to }) => {
                            debug!("received shutdown command");
                            let _ = respond_to.send(self.export().await);
                            break;
                        }

                        None => {
                            warn!("command channel closed, writing final snapshot");
                            if let Err(e) = self.export().await {
                                error!("final snapshot failed: {:#}", e);
                            }
                            break;
                        }
                    }
                }
            }
        }

        debug!("snapshot actor stopped");
    }

    async fn export(&self) -> anyhow::Result<usize> {
        let count = snapshot::export(self.store.as_ref(), &self.path)
            .await
            .with_context(|| format!("failed to write snapshot {}", self.path.display()))?;

        info!("saved {} metrics to {}", count, self.path.display());
        Ok(count)
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Handle for controlling the SnapshotActor
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    sender: mpsc::Sender<SnapshotCommand>,
}

impl SnapshotHandle {
    /// Spawn a snapshot actor exporting `store` to `path` every `interval`
    pub fn spawn(store: Arc<dyn MetricStore>, path: PathBuf, interval: Option<Duration>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = SnapshotActor::new(store, path, interval, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Export immediately
    pub async fn export_now(&self) -> anyhow::Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SnapshotCommand::ExportNow { respond_to: tx })
            .await?;

        rx.await?
    }

    /// Write the final snapshot and stop the actor
    pub async fn shutdown(&self) -> anyhow::Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SnapshotCommand::Shutdown { respond_to: tx })
            .await?;

        rx.await?
    }
}
