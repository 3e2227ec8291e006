use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use metrics_relay::{
    actors::{Collector, PoolError, Task, WorkerPool},
    client::MetricsClient,
    config::{AgentArgs, AgentConfig},
    crypto::{PayloadEncryptor, Signer},
    storage::MemoryStore,
    util::{TASK_QUEUE_CAPACITY, shutdown_signal},
};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("metrics_relay", LevelFilter::DEBUG),
        ("relay_agent", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn submit(pool: &WorkerPool, task: Task) {
    match pool.submit(task) {
        Ok(()) => {}
        Err(e @ PoolError::QueueFull(_)) => warn!("{e}"),
        Err(e @ PoolError::Closed(_)) => debug!("{e}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = AgentConfig::resolve(AgentArgs::parse())?;
    info!(
        "reporting to {} (poll {:?}, report {:?}, {} workers, signing: {}, encryption: {}, gzip: {})",
        config.address,
        config.poll_interval,
        config.report_interval,
        config.rate_limit,
        config.key.is_some(),
        config.crypto_key.is_some(),
        config.compress,
    );

    let signer = config.key.as_deref().and_then(Signer::new);
    let encryptor = config
        .crypto_key
        .as_ref()
        .map(PayloadEncryptor::from_pem_file)
        .transpose()
        .context("failed to load public key")?;

    let client = MetricsClient::new(&config.address, signer, encryptor, config.compress)?;
    let collector = Arc::new(Collector::new(Arc::new(MemoryStore::new()), client));

    let mut pool = WorkerPool::new(config.rate_limit, TASK_QUEUE_CAPACITY, collector);
    pool.start();

    let start = Instant::now();
    let mut poll = interval_at(start, config.poll_interval);
    let mut report = interval_at(start + config.report_interval, config.report_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                submit(&pool, Task::SampleRuntime);
                submit(&pool, Task::SampleSystem);
            }

            _ = report.tick() => submit(&pool, Task::Upload),

            _ = &mut shutdown => break,
        }
    }

    info!("draining worker pool");
    pool.stop().await;
    info!("agent stopped");

    Ok(())
}
