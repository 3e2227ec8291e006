use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use metrics_relay::{
    actors::SnapshotHandle,
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{ServerArgs, ServerConfig, StorageConfig},
    crypto::{PayloadDecryptor, Signer},
    storage::{MemoryStore, MetricStore, snapshot},
    util::shutdown_signal,
};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("metrics_relay", LevelFilter::DEBUG),
        ("relay_server", LevelFilter::DEBUG),
        ("tower_http", LevelFilter::DEBUG),
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

async fn open_store(
    storage: StorageConfig,
) -> anyhow::Result<(Arc<dyn MetricStore>, Option<SnapshotHandle>)> {
    match storage {
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            info!("using SQLite storage at {}", path.display());
            let store = metrics_relay::storage::sqlite::SqliteStore::new(&path)
                .await
                .context("failed to open database")?;
            Ok((Arc::new(store), None))
        }

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            bail!("a database was configured but SQLite support is not compiled in")
        }

        StorageConfig::Memory { snapshot: None } => {
            info!("using in-memory storage without snapshots");
            Ok((Arc::new(MemoryStore::new()), None))
        }

        StorageConfig::Memory {
            snapshot: Some(config),
        } => {
            info!("using in-memory storage, snapshots at {}", config.path.display());
            let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());

            if config.restore {
                snapshot::import(store.as_ref(), &config.path)
                    .await
                    .with_context(|| format!("failed to restore {}", config.path.display()))?;
            }

            let handle = SnapshotHandle::spawn(store.clone(), config.path, config.interval);
            Ok((store, Some(handle)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = ServerConfig::resolve(ServerArgs::parse())?;
    if config.address.is_empty() {
        bail!("listen address must not be empty");
    }

    let signer = config.key.as_deref().and_then(Signer::new);
    let decryptor = config
        .crypto_key
        .as_ref()
        .map(PayloadDecryptor::from_pem_file)
        .transpose()
        .context("failed to load private key")?
        .map(Arc::new);

    let (store, snapshots) = open_store(config.storage()).await?;

    let server = spawn_api_server(
        ApiConfig {
            bind_addr: config.address.clone(),
            decryptor,
        },
        ApiState::new(store.clone(), signer),
    )
    .await?;

    shutdown_signal().await;

    info!("shutting down");
    if let Err(e) = server.shutdown().await {
        error!("{:#}", e);
    }

    if let Some(snapshots) = snapshots {
        match snapshots.shutdown().await {
            Ok(count) => info!("final snapshot written ({count} metrics)"),
            Err(e) => error!("final snapshot failed: {:#}", e),
        }
    }

    store.close().await?;
    info!("server stopped");

    Ok(())
}
