//! Ingestion HTTP server of the aggregator
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Request pipeline**: gzip decompression → decryption (JSON ingestion
//!   routes only) → handler
//! - **Responses** are gzip-compressed when the client accepts it
//!
//! ## Endpoints
//!
//! - `GET /` - HTML list of all metrics
//! - `POST /update/{kind}/{name}/{value}` - Path-encoded update
//! - `GET /value/{kind}/{name}` - Path-encoded read
//! - `POST /update/` - JSON single-metric update
//! - `POST /value/` - JSON single-metric read
//! - `POST /updates/` - Batch ingestion
//! - `GET /ping` - Storage health check

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::crypto::PayloadDecryptor;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "localhost:8080")
    pub bind_addr: String,

    /// Decrypts ingestion bodies when set
    pub decryptor: Option<Arc<PayloadDecryptor>>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: crate::util::DEFAULT_ADDRESS.to_string(),
            decryptor: None,
        }
    }
}

/// Build the router with all routes and middleware
pub fn router(state: ApiState, decryptor: Option<Arc<PayloadDecryptor>>) -> Router {
    let mut ingestion = Router::new()
        .route("/updates/", post(routes::update::update_batch))
        .route("/update/", post(routes::update::update_json));

    if let Some(decryptor) = decryptor {
        ingestion = ingestion.route_layer(axum::middleware::from_fn_with_state(
            decryptor,
            middleware::decrypt::decrypt_body,
        ));
    }

    Router::new()
        .route("/", get(routes::index::list_metrics))
        .route(
            "/update/:kind/:name/:value",
            post(routes::update::update_by_path),
        )
        .route("/value/", post(routes::value::value_json))
        .route("/value/:kind/:name", get(routes::value::value_by_path))
        .route("/ping", get(routes::health::ping))
        .merge(ingestion)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Running API server
pub struct ApiServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ApiServer {
    /// Address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown_tx.send(());
        self.task
            .await
            .context("API server task panicked")?
            .context("API server error")?;

        info!("API server stopped");
        Ok(())
    }
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task that runs until
/// [`ApiServer::shutdown`] is called or the handle is dropped.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<ApiServer> {
    debug!("starting API server on {}", config.bind_addr);

    let app = router(state, config.decryptor);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    Ok(ApiServer {
        addr,
        shutdown_tx,
        task,
    })
}
