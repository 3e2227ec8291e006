//! HMAC-SHA256 integrity tags

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::Metric;
use crate::wire::{WireRecord, canonical_string};

type HmacSha256 = Hmac<Sha256>;

/// Keyed signer shared by agent and server
///
/// Constructed only for non-empty keys; an absent signer means integrity
/// checking is disabled.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    /// Create a signer, or `None` when the key is empty
    pub fn new(key: impl AsRef<[u8]>) -> Option<Self> {
        let key = key.as_ref();
        if key.is_empty() {
            return None;
        }

        HmacSha256::new_from_slice(key).ok().map(|mac| Self { mac })
    }

    /// Lower-case hex digest of `data`
    pub fn tag(&self, data: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Recompute the digest of `data` and compare it with `tag` in constant
    /// time. Malformed hex never verifies.
    pub fn verify(&self, tag: &str, data: &str) -> bool {
        let Ok(expected) = hex::decode(tag) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(data.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    /// Tag for the canonical string of `metric`
    pub fn tag_metric(&self, metric: &Metric) -> String {
        self.tag(&canonical_string(metric))
    }

    /// Check the `hash` of a wire record against the metric it decodes to.
    /// A record without a hash fails verification.
    pub fn verify_record(&self, record: &WireRecord, metric: &Metric) -> bool {
        record
            .hash
            .as_deref()
            .is_some_and(|tag| self.verify(tag, &canonical_string(metric)))
    }

    /// Wire record for `metric` carrying its integrity tag
    pub fn signed_record(&self, metric: &Metric) -> WireRecord {
        let mut record = WireRecord::from(metric);
        record.hash = Some(self.tag_metric(metric));
        record
    }
}
