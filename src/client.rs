//! Transport client
//!
//! Delivers the collector's metric set to the aggregator's batch ingestion
//! endpoint. The body pipeline is:
//!
//! ```text
//! MetricSet → [WireRecord] (signed) → JSON → RSA-OAEP (optional) → gzip (optional) → POST /updates/
//! ```

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use flate2::{Compression, write::GzEncoder};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tracing::{debug, instrument, trace};

use crate::MetricSet;
use crate::crypto::{PayloadEncryptor, Signer};
use crate::wire::WireRecord;

/// Upper bound for a single upload call
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP client for the aggregator
///
/// The underlying `reqwest::Client` is built once and reused for every
/// upload.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    http: reqwest::Client,
    endpoint: String,
    signer: Option<Signer>,
    encryptor: Option<PayloadEncryptor>,
    compress: bool,
}

impl MetricsClient {
    /// Create a client for the aggregator at `address`
    ///
    /// `address` is either `host:port` (plain HTTP is assumed) or a full base
    /// URL.
    pub fn new(
        address: &str,
        signer: Option<Signer>,
        encryptor: Option<PayloadEncryptor>,
        compress: bool,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: updates_endpoint(address),
            signer,
            encryptor,
            compress,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Serialize, sign, encrypt and compress `metrics` into a request body
    pub fn build_body(&self, metrics: &MetricSet) -> Result<Vec<u8>> {
        let records: Vec<WireRecord> = metrics
            .values()
            .map(|metric| match &self.signer {
                Some(signer) => signer.signed_record(metric),
                None => WireRecord::from(metric),
            })
            .collect();

        let mut body = serde_json::to_vec(&records).context("failed to serialize batch")?;
        trace!("serialized {} records ({} bytes)", records.len(), body.len());

        if let Some(encryptor) = &self.encryptor {
            body = encryptor
                .encrypt(&body)
                .context("failed to encrypt batch")?;
        }

        if self.compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&body)?;
            body = encoder.finish().context("failed to compress batch")?;
        }

        Ok(body)
    }

    /// Upload the whole metric set in one request
    ///
    /// Returns the number of uploaded metrics. An empty set is not sent.
    #[instrument(skip(self, metrics), fields(endpoint = %self.endpoint, count = metrics.len()))]
    pub async fn upload(&self, metrics: &MetricSet) -> Result<usize> {
        if metrics.is_empty() {
            debug!("nothing to upload");
            return Ok(0);
        }

        let body = self.build_body(metrics)?;

        let mut request = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json");
        if self.compress {
            request = request.header(CONTENT_ENCODING, "gzip");
        }

        let response = request
            .body(body)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("aggregator rejected batch with {}: {}", status, text.trim());
        }

        debug!("uploaded {} metrics", metrics.len());
        Ok(metrics.len())
    }
}

fn updates_endpoint(address: &str) -> String {
    let base = address.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}/updates/")
    } else {
        format!("http://{base}/updates/")
    }
}
