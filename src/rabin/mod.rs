//!
//! Content-defined chunking with a Rabin-style rolling polynomial checksum.
//!
//! ## Algorithm
//! Every byte of the stream is pushed through a sliding window of `window_size` bytes.
//! The window checksum is updated in constant time:
//!
//! ```text
//! checksum = checksum * prime + byte_in - byte_out * prime^window_size
//! ```
//!
//! A chunk is closed when it has reached `min_block_size` bytes and
//! `checksum % average_block_size` equals the target remainder, or when it reaches
//! `max_block_size` bytes regardless of content.
//!
//! ## Streaming
//! The whole decision depends on the last `window_size` bytes and the length of the
//! current chunk. A [`ChunkerState`] carries both across calls to
//! [`RabinChunker::feed`], so a stream presented as one buffer or as any number of
//! pieces is cut at exactly the same offsets.
//!
//! The first `window_size` bytes of a stream roll against a zeroed window.
//!

mod chunker;
mod config;
mod window;

#[cfg(feature = "reader")]
mod chunk;
#[cfg(feature = "async")]
mod stream;

pub use chunker::{ChunkRecord, ChunkerState, RabinChunker};
pub use config::{
    DEFAULT_AVG_BLOCK_SIZE, DEFAULT_MAX_BLOCK_SIZE, DEFAULT_MIN_BLOCK_SIZE, DEFAULT_PRIME,
    DEFAULT_WINDOW_SIZE, RabinConfig, WINDOW_SIZE_MAX, WINDOW_SIZE_MIN,
};

#[cfg(feature = "reader")]
pub use chunk::{Chunk, READ_BUF_SIZE, RabinIter};
#[cfg(feature = "async")]
pub use stream::RabinStream;
