use crate::error::Result;
use crate::rabin::config::RabinConfig;
use crate::rabin::window::RingWindow;
use tracing::trace;

/// One content-defined chunk of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Offset of the first byte, relative to the start of the stream.
    pub start: u64,
    /// Number of bytes in the chunk.
    pub length: u64,
    /// Polynomial accumulated over the chunk's bytes.
    pub polynomial: u64,
}

impl ChunkRecord {
    fn open(start: u64) -> Self {
        Self {
            start,
            length: 0,
            polynomial: 0,
        }
    }

    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// Rolling-checksum state of one logical stream.
///
/// Feed it with [`RabinChunker::feed`] until the stream ends, then call
/// [`ChunkerState::finish`]. A state must not be shared between streams.
#[derive(Debug, Clone)]
pub struct ChunkerState {
    window: RingWindow,
    roll_checksum: u64,
    current: Option<ChunkRecord>,
    closed: Vec<ChunkRecord>,
    total_bytes: u64,
    boundary_pending: bool,
}

impl ChunkerState {
    /// Bytes consumed since the start of the stream.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// True when the last byte consumed closed a chunk, so the next byte opens one.
    pub fn is_boundary_pending(&self) -> bool {
        self.boundary_pending
    }

    /// Removes and returns the chunks closed so far.
    pub fn drain_closed(&mut self) -> Vec<ChunkRecord> {
        std::mem::take(&mut self.closed)
    }

    /// Ends the stream, returning every remaining record including the trailing one.
    pub fn finish(mut self) -> Vec<ChunkRecord> {
        if let Some(tail) = self.current.take() {
            self.closed.push(tail);
        }
        self.closed
    }

    /// Closes the open record early, as if a boundary had been found after the last
    /// byte consumed. The next byte fed opens a fresh chunk.
    pub(crate) fn take_open(&mut self) -> Option<ChunkRecord> {
        self.boundary_pending = true;
        self.current.take()
    }
}

/// A Rabin rolling-checksum chunker.
#[derive(Debug, Clone)]
pub struct RabinChunker {
    config: RabinConfig,
    window_power: u64,
    remainder: u64,
}

impl RabinChunker {
    ///
    /// Constructs a new `RabinChunker`.
    ///
    /// ## Panics
    ///
    /// Panics if the configuration is rejected by [`RabinConfig::validate`].
    ///
    pub fn new(config: RabinConfig) -> Self {
        match Self::try_new(config) {
            Ok(instance) => instance,
            Err(e) => panic!("{}", e),
        }
    }

    ///
    /// Constructs a new `RabinChunker`.
    /// Unlike `new`, this method returns a `Result` instead of panicking on invalid arguments.
    ///
    /// ## Errors
    ///
    /// Returns [`DedupError::InvalidConfig`](crate::DedupError::InvalidConfig)
    /// when the configuration is out of bounds.
    ///
    pub fn try_new(config: RabinConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            window_power: config.window_power(),
            remainder: config.remainder(),
            config,
        })
    }

    pub fn config(&self) -> &RabinConfig {
        &self.config
    }

    ///
    /// Starts a new stream.
    ///
    /// ## Errors
    ///
    /// Returns [`DedupError::AllocationFailure`](crate::DedupError::AllocationFailure)
    /// when the sliding window cannot be allocated. No state is produced in that case.
    ///
    pub fn open(&self) -> Result<ChunkerState> {
        Ok(ChunkerState {
            window: RingWindow::try_new(self.config.window_size)?,
            roll_checksum: 0,
            current: None,
            closed: Vec::new(),
            total_bytes: 0,
            boundary_pending: true,
        })
    }

    ///
    /// Consumes `data` as the next bytes of the stream behind `state`.
    ///
    /// Returns the start offsets of the chunks opened while consuming `data`. Offsets
    /// are relative to the start of the stream. Concatenating the results of any
    /// sequence of calls yields the same offsets as one call over the whole stream.
    ///
    pub fn feed(&self, state: &mut ChunkerState, data: &[u8]) -> Vec<u64> {
        let prime = self.config.prime;
        let min = self.config.min_block_size;
        let max = self.config.max_block_size;
        let avg = self.config.average_block_size;

        let mut opened = Vec::new();

        for &byte in data {
            if state.boundary_pending {
                opened.push(state.total_bytes);
                state.current = Some(ChunkRecord::open(state.total_bytes));
                state.boundary_pending = false;
            }

            let evicted = state.window.push(byte);
            state.roll_checksum = state
                .roll_checksum
                .wrapping_mul(prime)
                .wrapping_add(byte as u64)
                .wrapping_sub((evicted as u64).wrapping_mul(self.window_power));
            state.total_bytes += 1;

            let Some(record) = state.current.as_mut() else {
                continue;
            };
            record.polynomial = record.polynomial.wrapping_mul(prime).wrapping_add(byte as u64);
            record.length += 1;

            let content_cut = record.length >= min && state.roll_checksum % avg == self.remainder;

            if content_cut || record.length >= max {
                trace!(
                    start = record.start,
                    length = record.length,
                    forced = !content_cut,
                    "chunk boundary"
                );
                if let Some(done) = state.current.take() {
                    state.closed.push(done);
                }
                state.boundary_pending = true;
            }
        }

        opened
    }

    /// Chunks a complete buffer in one call.
    pub fn chunk_all(&self, data: &[u8]) -> Result<Vec<ChunkRecord>> {
        let mut state = self.open()?;
        self.feed(&mut state, data);
        Ok(state.finish())
    }

    ///
    /// Moves the average block size one step up or down.
    ///
    /// The value stays within `[min_block_size, max_block_size]`. A derived target
    /// remainder follows the new average. An explicit target remainder is never
    /// allowed to reach the average, where it could no longer be hit. Chunks already
    /// emitted are unaffected.
    ///
    pub fn change_average_block_size(&mut self, increase: bool) {
        let config = &mut self.config;
        let floor = match config.target_remainder {
            Some(remainder) => config.min_block_size.max(remainder.saturating_add(1)),
            None => config.min_block_size,
        };

        if increase && config.average_block_size < config.max_block_size {
            config.average_block_size += 1;
        } else if !increase && config.average_block_size > floor {
            config.average_block_size -= 1;
        }

        self.remainder = config.remainder();
    }
}

impl Default for RabinChunker {
    fn default() -> Self {
        Self::new(RabinConfig::default())
    }
}

#[cfg(test)]
#[path = "tests/chunker_tests.rs"]
mod tests;
