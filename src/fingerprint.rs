//! Content fingerprints.
//!
//! A fingerprint depends on the payload bytes and nothing else: not the object key, not
//! the trigger time. That makes every output name derived from it content-addressed.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest used to fingerprint payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgorithm {
    /// 128-bit MD5, 32 hex characters. Matches names written by earlier deployments.
    #[default]
    Md5,
    /// 256-bit SHA-256, 64 hex characters.
    Sha256,
}

impl FingerprintAlgorithm {
    /// Length of the hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            FingerprintAlgorithm::Md5 => 32,
            FingerprintAlgorithm::Sha256 => 64,
        }
    }
}

/// Lowercase hex digest of a raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint `bytes` with `algorithm`.
pub fn fingerprint(bytes: &[u8], algorithm: FingerprintAlgorithm) -> ContentFingerprint {
    let hex = match algorithm {
        FingerprintAlgorithm::Md5 => format!("{:x}", md5::compute(bytes)),
        FingerprintAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
    };
    ContentFingerprint(hex)
}
