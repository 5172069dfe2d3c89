//!
//! The deduplication surface consumed by the proxy's request handlers.
//!
//! [`Deduplicator::scan`] chunks a buffer, fingerprints every chunk and stages the
//! results. The caller stores the unique chunks and then calls
//! [`Deduplicator::commit`], or [`Deduplicator::abort`] if the write failed.
//!

mod config;

pub use config::DedupConfig;

use crate::error::{DedupError, Result};
use crate::fingerprint::{Fingerprint, FingerprintOracle, Sha256Oracle};
use crate::index::{DedupIndex, NamespaceStats, TransactionId};
use crate::location::{BlockLocation, ByteRange, NamespaceId};
use crate::rabin::{RabinChunker, RabinConfig};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Classification of one chunk of a scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockClass {
    pub fingerprint: Fingerprint,
    /// The content already has a committed location in the namespace.
    pub duplicate: bool,
}

/// Result of [`Deduplicator::scan`].
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Pass to `commit` once the unique chunks are stored, or to `abort`.
    pub transaction: TransactionId,
    /// Every chunk keyed by its in-object byte range.
    pub blocks: BTreeMap<ByteRange, BlockClass>,
}

impl ScanOutcome {
    /// Chunks whose content is not yet stored.
    pub fn unique(&self) -> impl Iterator<Item = (&ByteRange, &BlockClass)> {
        self.blocks.iter().filter(|(_, class)| !class.duplicate)
    }
}

/// Chunker, fingerprint oracle and index wired together.
pub struct Deduplicator<O = Sha256Oracle> {
    chunker: RwLock<RabinChunker>,
    oracle: O,
    index: DedupIndex,
    transaction_ttl: Option<Duration>,
}

impl Deduplicator<Sha256Oracle> {
    ///
    /// Constructs a `Deduplicator` fingerprinting with SHA-256.
    ///
    /// ## Errors
    ///
    /// Returns [`DedupError::InvalidConfig`](crate::DedupError::InvalidConfig) for a
    /// rejected chunker configuration.
    ///
    pub fn new(config: DedupConfig) -> Result<Self> {
        Self::with_oracle(config, Sha256Oracle)
    }
}

impl Default for Deduplicator<Sha256Oracle> {
    fn default() -> Self {
        Self {
            chunker: RwLock::new(RabinChunker::default()),
            oracle: Sha256Oracle,
            index: DedupIndex::new(),
            transaction_ttl: None,
        }
    }
}

impl<O: FingerprintOracle> Deduplicator<O> {
    /// Constructs a `Deduplicator` around a custom fingerprint oracle.
    pub fn with_oracle(config: DedupConfig, oracle: O) -> Result<Self> {
        Ok(Self {
            chunker: RwLock::new(RabinChunker::try_new(config.chunker)?),
            oracle,
            index: DedupIndex::new(),
            transaction_ttl: config.transaction_ttl,
        })
    }

    ///
    /// Chunks `data`, classifies every chunk and stages the results.
    ///
    /// `location` addresses `data` as a whole; each chunk is recorded at the matching
    /// sub-range of it, in `location`'s namespace. A chunk is a duplicate when its
    /// fingerprint has a committed location in that namespace.
    ///
    /// ## Errors
    ///
    /// Returns [`DedupError::RangeOverflow`] if `location.offset + data.len()` does
    /// not fit in `u64`. Chunker allocation and oracle failures are returned before
    /// the index is touched, so a failed scan stages nothing.
    ///
    pub fn scan(&self, data: &[u8], location: &BlockLocation) -> Result<ScanOutcome> {
        if let Some(ttl) = self.transaction_ttl {
            self.index.expire(ttl);
        }

        let overflow = || DedupError::RangeOverflow {
            location: location.clone(),
            length: data.len() as u64,
        };

        if location.offset.checked_add(data.len() as u64).is_none() {
            return Err(overflow());
        }

        let records = self.chunker.read().chunk_all(data)?;

        let mut pairs = Vec::new();
        pairs.try_reserve_exact(records.len())?;

        for record in &records {
            let bytes = &data[record.start as usize..record.end() as usize];
            let fingerprint = self.oracle.hash(bytes)?;
            let chunk = location
                .narrow(record.start, record.length)
                .ok_or_else(overflow)?;
            pairs.push((fingerprint, chunk));
        }

        let object = self.oracle.hash(data)?;

        let keys: Vec<_> = pairs
            .iter()
            .map(|(fingerprint, chunk)| (chunk.block_range(), *fingerprint))
            .collect();

        let (transaction, duplicates) = self.index.stage(location.namespace_id(), object, pairs)?;

        let blocks: BTreeMap<_, _> = keys
            .into_iter()
            .zip(duplicates)
            .map(|((range, fingerprint), duplicate)| {
                (
                    range,
                    BlockClass {
                        fingerprint,
                        duplicate,
                    },
                )
            })
            .collect();

        debug!(
            %transaction,
            namespace = location.namespace_id(),
            bytes = data.len(),
            chunks = blocks.len(),
            duplicates = blocks.values().filter(|b| b.duplicate).count(),
            "scan staged"
        );

        Ok(ScanOutcome {
            transaction,
            blocks,
        })
    }

    /// Promotes the chunks staged by `transaction`. See [`DedupIndex::commit`].
    pub fn commit(&self, transaction: &TransactionId) -> Result<()> {
        self.index.commit(transaction).map(|_| ())
    }

    /// Discards the chunks staged by `transaction`. See [`DedupIndex::abort`].
    pub fn abort(&self, transaction: &TransactionId) -> Result<()> {
        self.index.abort(transaction).map(|_| ())
    }

    /// Moves indexed chunks to new locations. See [`DedupIndex::relocate`].
    pub fn update(
        &self,
        fingerprints: &[Fingerprint],
        old_locations: &[BlockLocation],
        new_locations: &[BlockLocation],
    ) -> Result<TransactionId> {
        self.index
            .relocate(fingerprints, old_locations, new_locations)
    }

    /// First committed location of each known fingerprint. See [`DedupIndex::query`].
    pub fn query(&self, namespace: NamespaceId, fingerprints: &[Fingerprint]) -> Vec<BlockLocation> {
        self.index.query(namespace, fingerprints)
    }

    /// Nudges the chunker's average block size for subsequent scans.
    pub fn change_average_block_size(&self, increase: bool) {
        self.chunker.write().change_average_block_size(increase);
    }

    /// Current chunker parameters.
    pub fn chunker_config(&self) -> RabinConfig {
        *self.chunker.read().config()
    }

    /// Aborts transactions open for longer than `max_age`, returning how many.
    pub fn expire_transactions(&self, max_age: Duration) -> usize {
        self.index.expire(max_age)
    }

    pub fn stats(&self, namespace: NamespaceId) -> NamespaceStats {
        self.index.stats(namespace)
    }

    pub fn open_transactions(&self) -> usize {
        self.index.open_transactions()
    }

    pub fn index(&self) -> &DedupIndex {
        &self.index
    }
}

#[cfg(test)]
#[path = "tests/dedup_tests.rs"]
mod tests;
