//! Payload integrity and confidentiality
//!
//! - [`signer::Signer`] computes and verifies HMAC-SHA256 tags over the
//!   canonical string of a metric (shared key on both sides)
//! - [`cipher`] encrypts whole payloads with an RSA public key on the agent
//!   and decrypts them with the matching private key on the server
//!
//! Both are optional. An empty key disables signing, a missing key path
//! disables encryption.

pub mod cipher;
pub mod signer;

use std::fmt;

pub use cipher::{PayloadDecryptor, PayloadEncryptor};
pub use signer::Signer;

/// Errors raised while loading keys or transforming payloads
#[derive(Debug)]
pub enum CryptoError {
    /// The key file could not be read
    KeyIo(std::io::Error),

    /// The key file does not contain a usable PEM key
    InvalidKey(String),

    /// Encryption of the payload failed
    EncryptionFailed(String),

    /// The payload could not be decrypted with the configured key
    DecryptionFailed(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::KeyIo(err) => write!(f, "failed to read key file: {}", err),
            CryptoError::InvalidKey(msg) => write!(f, "invalid key: {}", msg),
            CryptoError::EncryptionFailed(msg) => write!(f, "encryption failed: {}", msg),
            CryptoError::DecryptionFailed(msg) => write!(f, "decryption failed: {}", msg),
        }
    }
}

impl std::error::Error for CryptoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CryptoError::KeyIo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CryptoError {
    fn from(err: std::io::Error) -> Self {
        CryptoError::KeyIo(err)
    }
}
