//! Error types for the Veil store.
//!
//! Every fallible operation in the crate returns a [`StoreError`]. Note what
//! is *missing*: there is no "wrong password" or "wrong partition key"
//! variant. Bad credentials reconstruct garbage, and garbage either decodes
//! to something or fails as [`StoreError::MalformedDocument`], exactly like a
//! real partition holding implausible content would.

use thiserror::Error;

/// Errors that can occur while building, reading or rewriting a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The reconstruction threshold is unusable (zero, or larger than the
    /// pool it must be drawn from).
    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Partition ratios are malformed, sum above one, or there are more
    /// partitions than configured roles.
    #[error("invalid ratio configuration: {0}")]
    InvalidRatioConfiguration(String),

    /// The identifier space is empty or larger than the supported bound.
    #[error("identifier space of {size} is outside 1..={max}")]
    IdSpaceTooLarge {
        /// Requested size.
        size: u32,
        /// Largest supported size.
        max: u32,
    },

    /// Two partitions would share candidate identifiers.
    #[error("partitions overlap: every partition needs a distinct key and a disjoint pool")]
    OverlappingPartitions,

    /// Fewer distinct points than the threshold were handed to interpolation.
    #[error("insufficient shares: need {needed}, got {got}")]
    InsufficientShares {
        /// Required number of distinct shares.
        needed: usize,
        /// Distinct shares supplied.
        got: usize,
    },

    /// Attempted to invert zero in the field.
    #[error("division by zero in the prime field")]
    DivisionByZero,

    /// A share identifier of zero was requested; x = 0 is the secret itself.
    #[error("share identifier must be non-zero")]
    InvalidIdentifier,

    /// The store holds too few shares to rebuild a chunk. Only happens with
    /// truncated or hand-edited stores.
    #[error("reconstruction failed for chunk {chunk_index}: found {found} of {needed} shares")]
    ReconstructionFailed {
        /// Chunk that could not be rebuilt.
        chunk_index: u32,
        /// Matching shares present.
        found: usize,
        /// Shares required.
        needed: usize,
    },

    /// Recovered bytes do not form a valid document. Intentionally carries
    /// no detail.
    #[error("recovered data could not be interpreted")]
    MalformedDocument,

    /// The persisted store failed schema validation.
    #[error("store format error: {0}")]
    StoreFormat(String),

    /// Update was asked to rewrite a partition the store does not contain.
    #[error("no partition in this store matches the supplied key")]
    UnknownPartition,

    /// The password KDF rejected its parameters.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The operation was cancelled between chunks; nothing was produced.
    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// `true` for mistakes in the caller's configuration, as opposed to bad
    /// data or an aborted run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidThreshold(_)
                | Self::InvalidRatioConfiguration(_)
                | Self::IdSpaceTooLarge { .. }
                | Self::OverlappingPartitions
                | Self::KeyDerivation(_)
        )
    }

    /// `true` when the persisted store itself is damaged.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::StoreFormat(_) | Self::ReconstructionFailed { .. }
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::StoreFormat(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_document_message_is_generic() {
        let msg = StoreError::MalformedDocument.to_string();
        assert!(!msg.contains("password"));
        assert!(!msg.contains("key"));
    }

    #[test]
    fn test_error_classification() {
        assert!(StoreError::OverlappingPartitions.is_configuration());
        assert!(StoreError::StoreFormat("x".into()).is_corruption());
        assert!(!StoreError::MalformedDocument.is_configuration());
        assert!(!StoreError::MalformedDocument.is_corruption());
    }

    #[test]
    fn test_json_errors_become_format_errors() {
        let err: StoreError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, StoreError::StoreFormat(_)));
    }
}
