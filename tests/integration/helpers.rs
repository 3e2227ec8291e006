//! Helper functions for integration tests

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use metrics_relay::storage::{MemoryStore, MetricStore};
use rsa::RsaPrivateKey;
use rsa::rand_core::OsRng;
use tempfile::TempDir;

/// Store under test plus the directory keeping its database alive
pub type TestStore = (Option<TempDir>, Arc<dyn MetricStore>);

pub async fn memory_store() -> TestStore {
    (None, Arc::new(MemoryStore::new()))
}

#[cfg(feature = "storage-sqlite")]
pub async fn sqlite_store() -> TestStore {
    let dir = tempfile::tempdir().unwrap();
    let store = metrics_relay::storage::sqlite::SqliteStore::new(dir.path().join("metrics.db"))
        .await
        .unwrap();
    (Some(dir), Arc::new(store))
}

/// RSA key shared by all tests of one binary, generation is slow
pub fn test_rsa_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
}

#[cfg(feature = "api")]
pub mod server {
    use super::*;
    use metrics_relay::api::{ApiConfig, ApiServer, ApiState, spawn_api_server};
    use metrics_relay::crypto::{PayloadDecryptor, Signer};

    /// Running aggregator bound to a random local port
    pub struct TestServer {
        pub server: ApiServer,
        pub store: Arc<dyn MetricStore>,
        pub base: String,
    }

    impl TestServer {
        pub fn url(&self, path: &str) -> String {
            format!("{}{}", self.base, path)
        }

        pub fn address(&self) -> String {
            self.server.local_addr().to_string()
        }
    }

    pub async fn spawn_with_store(
        store: Arc<dyn MetricStore>,
        key: Option<&str>,
        encrypted: bool,
    ) -> TestServer {
        let decryptor =
            encrypted.then(|| Arc::new(PayloadDecryptor::new(test_rsa_key().clone())));

        let config = ApiConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            decryptor,
        };
        let state = ApiState::new(store.clone(), key.and_then(Signer::new));

        let server = spawn_api_server(config, state).await.unwrap();
        let base = format!("http://{}", server.local_addr());

        TestServer {
            server,
            store,
            base,
        }
    }

    pub async fn spawn_test_server(key: Option<&str>) -> TestServer {
        spawn_with_store(Arc::new(MemoryStore::new()), key, false).await
    }
}
