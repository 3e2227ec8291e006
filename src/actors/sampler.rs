//! Collector task handlers
//!
//! The [`Collector`] owns the agent's local metric store and the transport
//! client and executes the three [`Task`] kinds:
//!
//! - **sample-runtime**: statistics of the agent process (memory, CPU, run
//!   time, disk I/O), a random diagnostic value and `PollCount += 1`
//! - **sample-system**: total/free host memory and per-CPU utilization
//! - **upload**: send the whole local store, then reset `PollCount`
//!
//! `PollCount` is reset after every upload attempt, successful or not.
//! Increments made by a failed upload cycle are lost.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::{MINIMUM_CPU_UPDATE_INTERVAL, Pid, ProcessesToUpdate, System};
use tracing::{debug, instrument, trace, warn};

use super::messages::Task;
use super::pool::TaskHandler;
use crate::client::MetricsClient;
use crate::storage::MetricStore;
use crate::{Metric, POLL_COUNT};

/// Name of the gauge carrying a random value on every runtime sample
pub const RANDOM_VALUE: &str = "RandomValue";

/// Task handler of the collector process
pub struct Collector {
    store: Arc<dyn MetricStore>,
    client: MetricsClient,
    pid: Option<Pid>,

    /// Kept between samples so process CPU usage has a previous reading
    process_sys: Mutex<System>,
}

impl Collector {
    pub fn new(store: Arc<dyn MetricStore>, client: MetricsClient) -> Self {
        let pid = sysinfo::get_current_pid()
            .inspect_err(|e| warn!("process statistics unavailable: {e}"))
            .ok();

        Self {
            store,
            client,
            pid,
            process_sys: Mutex::new(System::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn MetricStore> {
        &self.store
    }

    #[instrument(skip(self))]
    pub async fn sample_runtime(&self) -> Result<()> {
        let mut batch = self.process_metrics();
        batch.push(Metric::gauge(RANDOM_VALUE, rand::random::<f64>()));
        batch.push(Metric::counter(POLL_COUNT, 1));

        trace!("sampled {} runtime metrics", batch.len());
        self.store
            .batch_upsert(batch)
            .await
            .context("failed to store runtime metrics")
    }

    fn process_metrics(&self) -> Vec<Metric> {
        let Some(pid) = self.pid else {
            return Vec::new();
        };

        let mut sys = self.process_sys.lock();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let Some(process) = sys.process(pid) else {
            warn!("own process {pid} not found");
            return Vec::new();
        };

        let disk = process.disk_usage();
        vec![
            Metric::gauge("ResidentMemory", process.memory() as f64),
            Metric::gauge("VirtualMemory", process.virtual_memory() as f64),
            Metric::gauge("ProcessCPU", process.cpu_usage() as f64),
            Metric::gauge("RunTime", process.run_time() as f64),
            Metric::gauge("DiskReadBytes", disk.total_read_bytes as f64),
            Metric::gauge("DiskWrittenBytes", disk.total_written_bytes as f64),
        ]
    }

    #[instrument(skip(self))]
    pub async fn sample_system(&self) -> Result<()> {
        // CPU usage is the difference between two refreshes
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let mut batch = vec![
            Metric::gauge("TotalMemory", sys.total_memory() as f64),
            Metric::gauge("FreeMemory", sys.free_memory() as f64),
        ];
        batch.extend(
            sys.cpus()
                .iter()
                .enumerate()
                .map(|(i, cpu)| Metric::gauge(format!("CPUutilization{}", i + 1), cpu.cpu_usage() as f64)),
        );

        trace!("sampled {} system metrics", batch.len());
        self.store
            .batch_upsert(batch)
            .await
            .context("failed to store system metrics")
    }

    #[instrument(skip(self))]
    pub async fn upload(&self) -> Result<()> {
        let metrics = self
            .store
            .get_all()
            .await
            .context("failed to read local store")?;

        let result = self.client.upload(&metrics).await;

        self.store
            .reset_counter(POLL_COUNT)
            .await
            .context("failed to reset poll counter")?;

        let uploaded = result?;
        debug!("upload cycle complete ({uploaded} metrics)");
        Ok(())
    }
}

#[async_trait]
impl TaskHandler for Collector {
    async fn handle(&self, task: Task) -> Result<()> {
        match task {
            Task::SampleRuntime => self.sample_runtime().await,
            Task::SampleSystem => self.sample_system().await,
            Task::Upload => self.upload().await,
        }
    }
}
