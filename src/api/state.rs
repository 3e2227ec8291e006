//! API shared state

use std::sync::Arc;

use crate::crypto::Signer;
use crate::storage::MetricStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// The aggregator's metric store
    pub store: Arc<dyn MetricStore>,

    /// Integrity signer, `None` when no key is configured
    pub signer: Option<Signer>,
}

impl ApiState {
    pub fn new(store: Arc<dyn MetricStore>, signer: Option<Signer>) -> Self {
        Self { store, signer }
    }
}
