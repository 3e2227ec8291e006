//! Message types for actor communication
//!
//! - [`Task`]: units of work queued into the collector's worker pool
//! - [`SnapshotCommand`]: control messages for the aggregator's snapshot actor

use tokio::sync::oneshot;

/// Work item dispatched to the collector's worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Sample statistics of the collector process itself
    SampleRuntime,

    /// Sample host-level memory and CPU statistics
    SampleSystem,

    /// Upload the local metric set to the aggregator
    Upload,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::SampleRuntime => "sample-runtime",
            Task::SampleSystem => "sample-system",
            Task::Upload => "upload",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Commands that can be sent to the SnapshotActor
#[derive(Debug)]
pub enum SnapshotCommand {
    /// Export immediately, bypassing the interval timer
    ExportNow {
        respond_to: oneshot::Sender<anyhow::Result<usize>>,
    },

    /// Perform the final export and stop the actor
    ///
    /// Sent after the HTTP listener has stopped accepting requests.
    Shutdown {
        respond_to: oneshot::Sender<anyhow::Result<usize>>,
    },
}
