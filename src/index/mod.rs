//!
//! Transactional fingerprint index.
//!
//! Each namespace keeps two tables mapping a [`Fingerprint`] to the locations that
//! hold its content:
//!
//! * `staged`: results of scans that were neither committed nor aborted yet.
//! * `committed`: content known to be durably stored.
//!
//! A `(fingerprint, location)` pair lives in at most one of the two tables. Scans
//! stage their pairs under a [`TransactionId`]; committing moves the batch to
//! `committed`, aborting drops it.
//!
//! Every operation holds the namespace lock for its whole duration. When the
//! transaction registry is needed as well it is locked after the namespace.
//!

mod transaction;

pub use transaction::TransactionId;

use crate::error::{DedupError, Result};
use crate::fingerprint::Fingerprint;
use crate::location::{BlockLocation, NamespaceId};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use transaction::{Registry, Sequence, Transaction};

type LocationMap = HashMap<Fingerprint, Vec<BlockLocation>>;

/// One record of a location table: table, fingerprint and position in its list.
type Slot = (Table, Fingerprint, usize);

/// Counters describing one namespace.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceStats {
    pub committed_fingerprints: usize,
    pub committed_locations: usize,
    pub staged_fingerprints: usize,
    pub staged_locations: usize,
    pub open_transactions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Table {
    Committed,
    Staged,
}

#[derive(Debug, Default)]
struct NamespaceTables {
    committed: LocationMap,
    staged: LocationMap,
}

impl NamespaceTables {
    fn table(&self, table: Table) -> &LocationMap {
        match table {
            Table::Committed => &self.committed,
            Table::Staged => &self.staged,
        }
    }

    fn is_committed(&self, fingerprint: &Fingerprint) -> bool {
        self.committed
            .get(fingerprint)
            .is_some_and(|locations| !locations.is_empty())
    }

    fn is_staged(&self, fingerprint: &Fingerprint, location: &BlockLocation) -> bool {
        self.staged
            .get(fingerprint)
            .is_some_and(|locations| locations.contains(location))
    }

    /// Removes one `(fingerprint, location)` pair from `staged`, pruning empty entries.
    fn unstage(&mut self, fingerprint: &Fingerprint, location: &BlockLocation) {
        let Some(locations) = self.staged.get_mut(fingerprint) else {
            return;
        };

        if let Some(pos) = locations.iter().position(|l| l == location) {
            locations.remove(pos);
        }

        if locations.is_empty() {
            self.staged.remove(fingerprint);
        }
    }

    ///
    /// Claims the record holding `location` under `fingerprint`, committed first.
    ///
    /// In `committed` any equal record not in `claimed` qualifies. In `staged` all
    /// equal records move together, so only the first one is ever claimed.
    ///
    fn claim(
        &self,
        fingerprint: &Fingerprint,
        location: &BlockLocation,
        claimed: &mut HashSet<Slot>,
    ) -> Option<Slot> {
        for table in [Table::Committed, Table::Staged] {
            let Some(locations) = self.table(table).get(fingerprint) else {
                continue;
            };

            let mut matches = locations
                .iter()
                .enumerate()
                .filter(|(_, l)| *l == location)
                .map(|(pos, _)| (table, *fingerprint, pos));

            let slot = match table {
                Table::Committed => matches.find(|slot| !claimed.contains(slot)),
                Table::Staged => matches.next().filter(|slot| !claimed.contains(slot)),
            };

            if let Some(slot) = slot {
                claimed.insert(slot);
                return Some(slot);
            }
        }

        None
    }

    fn stats(&self) -> NamespaceStats {
        NamespaceStats {
            committed_fingerprints: self.committed.len(),
            committed_locations: self.committed.values().map(Vec::len).sum(),
            staged_fingerprints: self.staged.len(),
            staged_locations: self.staged.values().map(Vec::len).sum(),
            open_transactions: 0,
        }
    }
}

/// Per-namespace staged and committed fingerprint tables plus the transaction registry.
#[derive(Debug, Default)]
pub struct DedupIndex {
    namespaces: RwLock<HashMap<NamespaceId, Arc<Mutex<NamespaceTables>>>>,
    registry: Mutex<Registry>,
    sequence: Sequence,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, namespace: NamespaceId) -> Arc<Mutex<NamespaceTables>> {
        if let Some(slot) = self.namespaces.read().get(&namespace) {
            return Arc::clone(slot);
        }

        Arc::clone(self.namespaces.write().entry(namespace).or_default())
    }

    fn existing_slot(&self, namespace: NamespaceId) -> Option<Arc<Mutex<NamespaceTables>>> {
        self.namespaces.read().get(&namespace).cloned()
    }

    ///
    /// Classifies and stages one scan batch.
    ///
    /// A pair is a duplicate when its fingerprint already has a committed location
    /// in `namespace`. Every pair is appended to `staged` either way, and the batch
    /// is registered under a fresh [`TransactionId`] built from `object`.
    ///
    /// Returns the transaction id and one duplicate flag per pair, in order.
    ///
    pub fn stage(
        &self,
        namespace: NamespaceId,
        object: Fingerprint,
        pairs: Vec<(Fingerprint, BlockLocation)>,
    ) -> Result<(TransactionId, Vec<bool>)> {
        let mut duplicates = Vec::new();
        duplicates.try_reserve_exact(pairs.len())?;

        let slot = self.slot(namespace);
        let mut tables = slot.lock();
        let mut registry = self.registry.lock();

        tables.staged.try_reserve(pairs.len())?;

        for (fingerprint, location) in &pairs {
            duplicates.push(tables.is_committed(fingerprint));
            tables
                .staged
                .entry(*fingerprint)
                .or_default()
                .push(location.clone());
        }

        let id = TransactionId::Scan {
            fingerprint: object,
            sequence: self.sequence.next(),
        };

        registry.insert(
            id,
            Transaction {
                namespace,
                pairs,
                opened_at: Instant::now(),
            },
        );

        Ok((id, duplicates))
    }

    ///
    /// Moves the batch of `id` from `staged` to `committed`.
    ///
    /// [`TransactionId::Update`] is accepted as a no-op.
    ///
    /// ## Errors
    ///
    /// * [`DedupError::UnknownTransaction`] if `id` is not in flight, including a
    ///   second commit of the same id.
    /// * [`DedupError::MissingStagedEntry`] if a pair of the batch is no longer staged.
    ///   The batch stays registered and nothing is moved.
    ///
    pub fn commit(&self, id: &TransactionId) -> Result<usize> {
        self.close(id, true)
    }

    ///
    /// Drops the batch of `id` from `staged`. `committed` is never touched.
    ///
    /// [`TransactionId::Update`] is accepted as a no-op. Errors as for [`commit`](Self::commit).
    ///
    pub fn abort(&self, id: &TransactionId) -> Result<usize> {
        self.close(id, false)
    }

    fn close(&self, id: &TransactionId, promote: bool) -> Result<usize> {
        if id.is_update() {
            return Ok(0);
        }

        let unknown = || {
            warn!(transaction = %id, "unknown transaction");
            DedupError::UnknownTransaction(*id)
        };

        let namespace = self.registry.lock().namespace_of(id).ok_or_else(unknown)?;
        let slot = self.slot(namespace);
        let mut tables = slot.lock();
        let mut registry = self.registry.lock();

        // Taken again under the namespace lock; a racing commit/abort may have won.
        let txn = registry.take(id).ok_or_else(unknown)?;

        let missing = txn
            .pairs
            .iter()
            .find(|(fingerprint, location)| !tables.is_staged(fingerprint, location))
            .map(|(fingerprint, _)| *fingerprint);

        if let Some(fingerprint) = missing {
            warn!(transaction = %id, %fingerprint, "batch no longer staged, leaving it untouched");
            registry.insert(*id, txn);
            return Err(DedupError::MissingStagedEntry {
                transaction: *id,
                fingerprint,
            });
        }
        drop(registry);

        let count = txn.pairs.len();

        for (fingerprint, location) in txn.pairs {
            if promote {
                tables
                    .committed
                    .entry(fingerprint)
                    .or_default()
                    .push(location.clone());
            }
            tables.unstage(&fingerprint, &location);
        }

        debug!(
            transaction = %id,
            namespace,
            pairs = count,
            committed = promote,
            "transaction closed"
        );

        Ok(count)
    }

    ///
    /// Rewrites indexed locations in place.
    ///
    /// For each `i`, `old[i]` is looked up under `fingerprints[i]` in `committed`, then in
    /// `staged`, of the namespace of `old[0]`, and replaced by `new[i]`. In `committed`
    /// the first matching record is rewritten; in `staged` every matching record is,
    /// together with the copies held by in-flight transactions.
    ///
    /// Returns [`TransactionId::Update`]; there is nothing left to commit.
    ///
    /// ## Errors
    ///
    /// * [`DedupError::LengthMismatch`] if the three slices differ in length.
    /// * [`DedupError::UnknownLocation`] if any `old[i]` is not indexed, or names a
    ///   record already claimed by an earlier entry of the batch. Nothing is
    ///   rewritten in that case.
    ///
    pub fn relocate(
        &self,
        fingerprints: &[Fingerprint],
        old: &[BlockLocation],
        new: &[BlockLocation],
    ) -> Result<TransactionId> {
        if fingerprints.is_empty() {
            return Ok(TransactionId::Update);
        }

        if fingerprints.len() != old.len() || fingerprints.len() != new.len() {
            return Err(DedupError::LengthMismatch {
                fingerprints: fingerprints.len(),
                old: old.len(),
                new: new.len(),
            });
        }

        let namespace = old[0].namespace_id();
        let slot = self.slot(namespace);
        let mut tables = slot.lock();

        let mut claimed = HashSet::new();
        let mut targets = Vec::new();
        targets.try_reserve_exact(fingerprints.len())?;

        for (fingerprint, location) in fingerprints.iter().zip(old) {
            match tables.claim(fingerprint, location, &mut claimed) {
                Some(target) => targets.push(target),
                None => {
                    warn!(%fingerprint, %location, "update of unindexed location");
                    return Err(DedupError::UnknownLocation {
                        fingerprint: *fingerprint,
                        location: location.clone(),
                    });
                }
            }
        }

        let mut registry = self.registry.lock();

        let rewrites = targets.into_iter().zip(old.iter().zip(new));

        for ((table, fingerprint, pos), (from, to)) in rewrites {
            match table {
                Table::Committed => {
                    if let Some(record) = tables
                        .committed
                        .get_mut(&fingerprint)
                        .and_then(|locations| locations.get_mut(pos))
                    {
                        *record = to.clone();
                    }
                }
                Table::Staged => {
                    if let Some(locations) = tables.staged.get_mut(&fingerprint) {
                        locations
                            .iter_mut()
                            .filter(|l| *l == from)
                            .for_each(|record| *record = to.clone());
                    }
                    registry.relocate(namespace, &fingerprint, from, to);
                }
            }
        }

        debug!(namespace, locations = fingerprints.len(), "locations updated");

        Ok(TransactionId::Update)
    }

    ///
    /// Returns the first committed location of each fingerprint that has one.
    ///
    /// Fingerprints without a committed location are skipped, so the result may be
    /// shorter than `fingerprints`.
    ///
    pub fn query(&self, namespace: NamespaceId, fingerprints: &[Fingerprint]) -> Vec<BlockLocation> {
        let Some(slot) = self.existing_slot(namespace) else {
            return Vec::new();
        };
        let tables = slot.lock();

        fingerprints
            .iter()
            .filter_map(|fingerprint| tables.committed.get(fingerprint)?.first().cloned())
            .collect()
    }

    /// All committed locations of `fingerprint`.
    pub fn committed_locations(
        &self,
        namespace: NamespaceId,
        fingerprint: &Fingerprint,
    ) -> Vec<BlockLocation> {
        self.existing_slot(namespace)
            .and_then(|slot| slot.lock().committed.get(fingerprint).cloned())
            .unwrap_or_default()
    }

    /// All staged locations of `fingerprint`.
    pub fn staged_locations(
        &self,
        namespace: NamespaceId,
        fingerprint: &Fingerprint,
    ) -> Vec<BlockLocation> {
        self.existing_slot(namespace)
            .and_then(|slot| slot.lock().staged.get(fingerprint).cloned())
            .unwrap_or_default()
    }

    ///
    /// Aborts every transaction that has been open for longer than `max_age`.
    ///
    /// Returns the number of transactions reclaimed.
    ///
    pub fn expire(&self, max_age: Duration) -> usize {
        let stale = self.registry.lock().stale(max_age, Instant::now());
        let mut reclaimed = 0;

        for id in stale {
            match self.abort(&id) {
                Ok(_) => reclaimed += 1,
                // Closed by its owner since the sweep started.
                Err(DedupError::UnknownTransaction(_)) => {}
                Err(e) => warn!(transaction = %id, error = %e, "failed to expire transaction"),
            }
        }

        if reclaimed > 0 {
            info!(reclaimed, ?max_age, "expired stale transactions");
        }

        reclaimed
    }

    pub fn stats(&self, namespace: NamespaceId) -> NamespaceStats {
        let mut stats = self
            .existing_slot(namespace)
            .map(|slot| slot.lock().stats())
            .unwrap_or_default();

        stats.open_transactions = self.registry.lock().count_in(namespace);
        stats
    }

    /// Number of transactions in flight across all namespaces.
    pub fn open_transactions(&self) -> usize {
        self.registry.lock().len()
    }
}

#[cfg(test)]
#[path = "tests/index_tests.rs"]
mod tests;
