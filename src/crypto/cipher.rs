//! RSA-OAEP payload encryption
//!
//! The whole serialized payload is encrypted, not individual records. OAEP
//! limits a single encryption to `k - 2 * hLen - 2` bytes (k = modulus size,
//! hLen = 32 for SHA-256), so the payload is split into chunks of that size.
//! Each chunk becomes one ciphertext block of exactly `k` bytes and the
//! blocks are concatenated:
//!
//! ```text
//! plaintext:  [ chunk 0 | chunk 1 | ... | chunk n (short) ]
//! ciphertext: [ block 0 (k) | block 1 (k) | ... | block n (k) ]
//! ```

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::debug;

use super::CryptoError;

/// SHA-256 output length in bytes
const HASH_LEN: usize = 32;

fn max_chunk_len(modulus_len: usize) -> usize {
    modulus_len.saturating_sub(2 * HASH_LEN + 2)
}

/// Agent side: encrypts payloads with the aggregator's public key
#[derive(Debug, Clone)]
pub struct PayloadEncryptor {
    key: RsaPublicKey,
}

impl PayloadEncryptor {
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Parse a PEM public key (PKCS#1 `RSA PUBLIC KEY` or SPKI `PUBLIC KEY`)
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let key = RsaPublicKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        Ok(Self::new(key))
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let pem = std::fs::read_to_string(path.as_ref())?;
        debug!("loaded public key from {}", path.as_ref().display());
        Self::from_pem(&pem)
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let modulus_len = self.key.size();
        let chunk_len = max_chunk_len(modulus_len);
        if chunk_len == 0 {
            return Err(CryptoError::InvalidKey(format!(
                "{}-bit key is too small for OAEP with SHA-256",
                modulus_len * 8
            )));
        }

        let mut chunks: Vec<&[u8]> = plaintext.chunks(chunk_len).collect();
        if chunks.is_empty() {
            chunks.push(&[]);
        }

        let mut rng = OsRng;
        let mut ciphertext = Vec::with_capacity(chunks.len() * modulus_len);
        for chunk in chunks {
            let block = self
                .key
                .encrypt(&mut rng, Oaep::new::<Sha256>(), chunk)
                .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
            ciphertext.extend_from_slice(&block);
        }

        Ok(ciphertext)
    }
}

/// Server side: decrypts payloads with the private key
#[derive(Debug, Clone)]
pub struct PayloadDecryptor {
    key: RsaPrivateKey,
}

impl PayloadDecryptor {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }

    /// Parse a PEM private key (PKCS#1 `RSA PRIVATE KEY` or PKCS#8 `PRIVATE KEY`)
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        Ok(Self::new(key))
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let pem = std::fs::read_to_string(path.as_ref())?;
        debug!("loaded private key from {}", path.as_ref().display());
        Self::from_pem(&pem)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let modulus_len = self.key.size();
        if ciphertext.is_empty() || ciphertext.len() % modulus_len != 0 {
            return Err(CryptoError::DecryptionFailed(format!(
                "ciphertext length {} is not a multiple of the {}-byte block size",
                ciphertext.len(),
                modulus_len
            )));
        }

        let mut plaintext = Vec::with_capacity(ciphertext.len());
        for block in ciphertext.chunks(modulus_len) {
            let chunk = self
                .key
                .decrypt(Oaep::new::<Sha256>(), block)
                .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
            plaintext.extend_from_slice(&chunk);
        }

        Ok(plaintext)
    }
}
