//! Metric storage engine
//!
//! This module provides a trait-based abstraction over the canonical set of
//! current metric values, with two interchangeable backends.
//!
//! ## Design
//!
//! - **Trait-based**: `MetricStore` trait allows swapping implementations
//! - **Async**: All operations are async so the relational backend can await
//!   its transactions
//! - **Latest value only**: Gauges are replaced, counters accumulate
//!
//! ## Backends
//!
//! - **In-Memory** (default): Lock-guarded map, paired with file snapshots
//! - **SQLite**: One row per metric, transactional batches
//!
//! ## Usage
//!
//! ```no_run
//! use metrics_relay::Metric;
//! use metrics_relay::storage::{MetricStore, memory::MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = MemoryStore::new();
//!     store.upsert(Metric::counter("PollCount", 1)).await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
pub mod snapshot;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, MetricStore};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
