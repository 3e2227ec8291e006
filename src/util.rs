use std::time::Duration;

use tracing::info;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

pub const DEFAULT_RATE_LIMIT: usize = 1;

pub const DEFAULT_STORE_INTERVAL: Duration = Duration::from_secs(300);

pub const DEFAULT_STORE_FILE: &str = "/tmp/devops-metrics-db.json";

/// Pending tasks the collector queue holds before `submit` reports it full
pub const TASK_QUEUE_CAPACITY: usize = 64;

/// Parse a duration given either as plain seconds (`"10"`) or in humantime
/// notation (`"10s"`, `"1m 30s"`)
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    humantime_serde::re::humantime::parse_duration(raw).map_err(|e| format!("{raw}: {e}"))
}

/// Resolves once the process receives Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
