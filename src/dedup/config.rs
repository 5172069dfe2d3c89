use crate::rabin::RabinConfig;
use std::time::Duration;

/// Configuration of a [`Deduplicator`](crate::Deduplicator).
#[derive(Debug, Clone, Default)]
pub struct DedupConfig {
    /// Parameters of the content-defined chunker.
    pub chunker: RabinConfig,
    /// Transactions left open for longer than this are aborted by the next scan.
    /// `None` keeps them until they are committed or aborted explicitly.
    pub transaction_ttl: Option<Duration>,
}

impl DedupConfig {
    pub fn new(chunker: RabinConfig) -> Self {
        Self {
            chunker,
            ..Default::default()
        }
    }

    pub fn with_transaction_ttl(mut self, ttl: Duration) -> Self {
        self.transaction_ttl = Some(ttl);
        self
    }
}
