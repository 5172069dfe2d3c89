use crate::fingerprint::Fingerprint;
use crate::location::{BlockLocation, NamespaceId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Handle correlating a scan with its later `commit` or `abort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransactionId {
    /// A staged scan batch: the whole-object fingerprint plus a sequence number
    /// that keeps byte-identical objects apart.
    Scan {
        fingerprint: Fingerprint,
        sequence: u64,
    },
    /// Returned by `update`, which applies its changes directly.
    Update,
}

impl TransactionId {
    pub fn is_update(&self) -> bool {
        matches!(self, TransactionId::Update)
    }

    /// Whole-object fingerprint of a scan transaction.
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            TransactionId::Scan { fingerprint, .. } => Some(fingerprint),
            TransactionId::Update => None,
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionId::Scan {
                fingerprint,
                sequence,
            } => write!(f, "{}-{}", fingerprint, sequence),
            TransactionId::Update => f.write_str("update"),
        }
    }
}

/// A staged batch awaiting `commit` or `abort`.
#[derive(Debug, Clone)]
pub(crate) struct Transaction {
    pub(crate) namespace: NamespaceId,
    pub(crate) pairs: Vec<(Fingerprint, BlockLocation)>,
    pub(crate) opened_at: Instant,
}

/// In-flight transactions across all namespaces.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: HashMap<TransactionId, Transaction>,
}

impl Registry {
    pub(crate) fn insert(&mut self, id: TransactionId, txn: Transaction) {
        self.entries.insert(id, txn);
    }

    pub(crate) fn namespace_of(&self, id: &TransactionId) -> Option<NamespaceId> {
        self.entries.get(id).map(|txn| txn.namespace)
    }

    pub(crate) fn take(&mut self, id: &TransactionId) -> Option<Transaction> {
        self.entries.remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn count_in(&self, namespace: NamespaceId) -> usize {
        self.entries
            .values()
            .filter(|txn| txn.namespace == namespace)
            .count()
    }

    /// Ids of transactions open for longer than `max_age`.
    pub(crate) fn stale(&self, max_age: Duration, now: Instant) -> Vec<TransactionId> {
        self.entries
            .iter()
            .filter(|(_, txn)| now.saturating_duration_since(txn.opened_at) > max_age)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Points every in-flight pair `(fingerprint, old)` of `namespace` at `new`.
    pub(crate) fn relocate(
        &mut self,
        namespace: NamespaceId,
        fingerprint: &Fingerprint,
        old: &BlockLocation,
        new: &BlockLocation,
    ) {
        let pairs = self
            .entries
            .values_mut()
            .filter(|txn| txn.namespace == namespace)
            .flat_map(|txn| txn.pairs.iter_mut());

        for (fp, location) in pairs {
            if fp == fingerprint && location == old {
                *location = new.clone();
            }
        }
    }
}

/// Source of transaction sequence numbers.
#[derive(Debug, Default)]
pub(crate) struct Sequence(AtomicU64);

impl Sequence {
    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::new([byte; 32])
    }

    #[test]
    fn test_display() {
        let id = TransactionId::Scan {
            fingerprint: fp(0xab),
            sequence: 7,
        };

        assert!(id.to_string().starts_with("abab"));
        assert!(id.to_string().ends_with("-7"));
        assert_eq!(TransactionId::Update.to_string(), "update");
    }

    #[test]
    fn test_update_marker_never_matches_scan() {
        let scan = TransactionId::Scan {
            fingerprint: Fingerprint::default(),
            sequence: 0,
        };

        assert!(!scan.is_update());
        assert!(TransactionId::Update.is_update());
        assert_ne!(scan, TransactionId::Update);
        assert!(TransactionId::Update.fingerprint().is_none());
    }

    #[test]
    fn test_stale() {
        let mut registry = Registry::default();
        let opened_at = Instant::now();
        let id = TransactionId::Scan {
            fingerprint: fp(1),
            sequence: 0,
        };

        registry.insert(
            id,
            Transaction {
                namespace: 0,
                pairs: Vec::new(),
                opened_at,
            },
        );

        let later = opened_at + Duration::from_secs(10);
        assert_eq!(registry.stale(Duration::from_secs(5), later), vec![id]);
        assert!(registry.stale(Duration::from_secs(60), later).is_empty());
    }
}
