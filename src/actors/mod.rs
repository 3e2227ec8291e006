//! Actor-based background work
//!
//! Each actor runs as an independent async task and is controlled through a
//! handle wrapping its command channel.
//!
//! ## Collector side
//!
//! ```text
//!   poll tick ──► SampleRuntime, SampleSystem ─┐
//!                                              ├──► bounded queue ──► N workers ──► Collector
//!   report tick ──► Upload ────────────────────┘                                   (store, client)
//! ```
//!
//! - **WorkerPool**: fixed set of workers draining a bounded task queue
//! - **Collector**: task handler owning the local store and transport client
//!
//! ## Aggregator side
//!
//! - **SnapshotActor**: exports the store on a timer and once more on
//!   shutdown
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: mpsc command channel per actor
//! 2. **Request/Response**: oneshot channels for results

pub mod messages;
pub mod pool;
pub mod sampler;
pub mod snapshot;

pub use messages::{SnapshotCommand, Task};
pub use pool::{PoolError, TaskHandler, WorkerPool};
pub use sampler::Collector;
pub use snapshot::SnapshotHandle;
