use crate::rabin::chunker::{ChunkRecord, ChunkerState, RabinChunker};
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::io::{self, Read};

/// Size of each read issued against the underlying source.
pub const READ_BUF_SIZE: usize = 1_048_576; // 1 MB

/// Represents a content-defined chunk.
#[derive(Debug)]
pub struct Chunk {
    /// The rolling polynomial of the chunk.
    pub polynomial: u64,
    /// The actual chunk data.
    pub data: Bytes,
    /// The absolute offset of the chunk in the source stream.
    pub offset: u64,
    /// The length of the chunk in bytes.
    pub length: usize,
}

/// Pairs chunker output with the bytes it covers.
///
/// `pending` always starts at the first byte of the oldest chunk not yet handed out.
#[derive(Debug)]
pub(crate) struct ChunkAssembler {
    state: ChunkerState,
    pending: BytesMut,
    ready: VecDeque<Chunk>,
}

impl ChunkAssembler {
    pub(crate) fn new(state: ChunkerState) -> Self {
        Self {
            state,
            pending: BytesMut::new(),
            ready: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, chunker: &RabinChunker, data: &[u8]) {
        self.pending.extend_from_slice(data);
        chunker.feed(&mut self.state, data);

        for record in self.state.drain_closed() {
            self.split_off(record);
        }
    }

    /// Flushes the trailing chunk once the source is exhausted.
    pub(crate) fn finish(&mut self) {
        if let Some(record) = self.state.take_open() {
            self.split_off(record);
        }
    }

    pub(crate) fn pop(&mut self) -> Option<Chunk> {
        self.ready.pop_front()
    }

    fn split_off(&mut self, record: ChunkRecord) {
        let length = record.length as usize;
        let data = self.pending.split_to(length).freeze();

        self.ready.push_back(Chunk {
            polynomial: record.polynomial,
            data,
            offset: record.start,
            length,
        });
    }
}

impl RabinChunker {
    ///
    /// Creates an iterator that yields chunks from the provided reader.
    ///
    /// ## Arguments
    ///
    /// * `reader`: The source to read data from (must implement `Read`).
    ///
    /// ## Errors
    ///
    /// Yields an `std::io::Error` with `ErrorKind::OutOfMemory` if the sliding window
    /// cannot be allocated, and passes read errors through as they occur.
    ///
    pub fn chunks<R: Read>(&self, reader: R) -> RabinIter<'_, R> {
        let assembler = self
            .open()
            .map(ChunkAssembler::new)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e));

        RabinIter {
            chunker: self,
            reader,
            assembler,
            buf: Vec::new(),
            eof: false,
        }
    }
}

/// An iterator that yields `Chunk`s from a `Read` source.
pub struct RabinIter<'a, R: Read> {
    chunker: &'a RabinChunker,
    reader: R,
    assembler: io::Result<ChunkAssembler>,
    buf: Vec<u8>,
    eof: bool,
}

impl<'a, R: Read> Iterator for RabinIter<'a, R> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let assembler = match self.assembler.as_mut() {
            Ok(assembler) => assembler,
            Err(e) if !self.eof => {
                self.eof = true;
                return Some(Err(io::Error::new(e.kind(), e.to_string())));
            }
            Err(_) => return None,
        };

        loop {
            if let Some(chunk) = assembler.pop() {
                return Some(Ok(chunk));
            }

            if self.eof {
                return None;
            }

            self.buf.resize(READ_BUF_SIZE, 0);

            match self.reader.read(&mut self.buf) {
                Ok(0) => {
                    self.eof = true;
                    assembler.finish();
                }
                Ok(n) => {
                    assembler.push(self.chunker, &self.buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
