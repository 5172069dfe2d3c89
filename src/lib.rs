//!
//! Content-defined chunking and transactional deduplication for a storage proxy.
//!
//! The crate has two halves:
//!
//! * [`rabin`]: a streaming chunker driven by a Rabin-style rolling checksum. Chunk
//!   boundaries depend only on the bytes of the stream, never on how the stream was
//!   split into calls.
//! * [`index`] and [`dedup`]: a per-namespace index that classifies chunk fingerprints
//!   as unique or duplicate, stages them under a transaction and promotes them to a
//!   committed table on [`Deduplicator::commit`] or drops them on [`Deduplicator::abort`].
//!
//! ```
//! use rabin_dedup::{BlockLocation, Deduplicator};
//!
//! let dedup: Deduplicator = Deduplicator::default();
//! let data = vec![7u8; 20_000];
//! let location = BlockLocation::new(3, "bucket/object", "v1", 0, data.len() as u64);
//!
//! let outcome = dedup.scan(&data, &location).unwrap();
//! dedup.commit(&outcome.transaction).unwrap();
//!
//! let fingerprints: Vec<_> = outcome.blocks.values().map(|b| b.fingerprint).collect();
//! assert!(!dedup.query(3, &fingerprints).is_empty());
//! ```
//!

pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod location;
pub mod rabin;

pub use dedup::{BlockClass, DedupConfig, Deduplicator, ScanOutcome};
pub use error::{DedupError, Result};
pub use fingerprint::{FINGERPRINT_LEN, Fingerprint, FingerprintOracle, Sha256Oracle};
pub use index::{DedupIndex, NamespaceStats, TransactionId};
pub use location::{BlockLocation, ByteRange, NamespaceId};
pub use rabin::{ChunkRecord, ChunkerState, RabinChunker, RabinConfig};

#[cfg(feature = "reader")]
pub use rabin::{Chunk, RabinIter};

#[cfg(feature = "async")]
pub use rabin::RabinStream;
