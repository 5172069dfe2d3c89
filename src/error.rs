use crate::fingerprint::Fingerprint;
use crate::index::TransactionId;
use crate::location::BlockLocation;
use std::collections::TryReserveError;
use thiserror::Error;

/// Errors produced by the chunker and the deduplication index.
#[derive(Debug, Error)]
pub enum DedupError {
    /// The chunker configuration is outside the accepted bounds.
    #[error("invalid chunker configuration: {0}")]
    InvalidConfig(String),

    /// Working memory for a window or a batch could not be reserved.
    #[error("allocation failure: {0}")]
    AllocationFailure(#[from] TryReserveError),

    /// The fingerprint oracle could not produce a digest.
    #[error("digest failure: {0}")]
    DigestFailure(String),

    /// `commit` or `abort` was called with an id that is not in flight.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TransactionId),

    /// `update` referenced a location that is not indexed under the fingerprint.
    #[error("location {location} is not indexed under fingerprint {fingerprint}")]
    UnknownLocation {
        fingerprint: Fingerprint,
        location: BlockLocation,
    },

    /// `update` was given lists of different lengths.
    #[error(
        "update batch length mismatch: {fingerprints} fingerprints, {old} old locations, {new} new locations"
    )]
    LengthMismatch {
        fingerprints: usize,
        old: usize,
        new: usize,
    },

    /// A scanned buffer would extend past the end of the `u64` offset space.
    #[error("byte range of {location} extended by {length} bytes overflows u64")]
    RangeOverflow {
        location: BlockLocation,
        length: u64,
    },

    /// A transaction refers to a staged pair that is no longer staged.
    #[error("transaction {transaction} has no staged entry for fingerprint {fingerprint}")]
    MissingStagedEntry {
        transaction: TransactionId,
        fingerprint: Fingerprint,
    },
}

pub type Result<T> = std::result::Result<T, DedupError>;
