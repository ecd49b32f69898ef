//! Error types for redeem-core

use thiserror::Error;

use crate::artifact::ArtifactKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("checksum mismatch for {kind}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        kind: ArtifactKind,
        expected: String,
        actual: String,
    },

    #[error("malformed {kind}: {reason}")]
    MalformedArtifact { kind: ArtifactKind, reason: String },

    #[error("{kind} record count mismatch: expected {expected}, got {actual}")]
    CountMismatch {
        kind: ArtifactKind,
        expected: usize,
        actual: usize,
    },

    #[error("target hash not found in {lookup}")]
    LeafNotFound { lookup: &'static str },

    #[error("no decryptable ciphertext in bucket {bucket} ({scanned} records scanned)")]
    NonceNotFound { bucket: u8, scanned: usize },

    #[error("fee {fee} exceeds entry value {value}")]
    FeeExceedsValue { fee: u64, value: u64 },

    #[error("invalid target address: {0}")]
    InvalidAddress(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("address-origin entry missing from proof mapping")]
    MappingEntryNotFound,

    #[error("secret key required for {0}")]
    SecretRequired(&'static str),

    #[error("freshly built proof failed self-verification: {0}")]
    SelfVerification(&'static str),
}

impl Error {
    /// Integrity failures abort before any proof work; the rest are fatal
    /// only to the current redemption attempt.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Error::ChecksumMismatch { .. }
                | Error::MalformedArtifact { .. }
                | Error::CountMismatch { .. }
        )
    }
}
