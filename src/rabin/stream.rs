use crate::rabin::chunk::{Chunk, ChunkAssembler, READ_BUF_SIZE};
use crate::rabin::chunker::RabinChunker;
use futures::Stream;
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, ReadBuf};

impl RabinChunker {
    ///
    /// Creates a stream that yields chunks from the provided async reader.
    ///
    /// ## Arguments
    ///
    /// * `reader`: The source to read data from (must implement `AsyncRead`).
    ///
    pub fn as_stream<R>(&self, reader: R) -> RabinStream<'_, R>
    where
        R: AsyncRead + Unpin,
    {
        let assembler = self
            .open()
            .map(ChunkAssembler::new)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e));

        RabinStream {
            chunker: self,
            reader,
            assembler,
            buf: Vec::new(),
            eof: false,
        }
    }
}

pub struct RabinStream<'a, R>
where
    R: AsyncRead + Unpin,
{
    chunker: &'a RabinChunker,
    reader: R,
    assembler: io::Result<ChunkAssembler>,
    buf: Vec<u8>,
    eof: bool,
}

impl<'a, R> Stream for RabinStream<'a, R>
where
    R: AsyncRead + Unpin,
{
    type Item = io::Result<Chunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let assembler = match this.assembler.as_mut() {
            Ok(assembler) => assembler,
            Err(e) if !this.eof => {
                this.eof = true;
                return Poll::Ready(Some(Err(io::Error::new(e.kind(), e.to_string()))));
            }
            Err(_) => return Poll::Ready(None),
        };

        loop {
            if let Some(chunk) = assembler.pop() {
                return Poll::Ready(Some(Ok(chunk)));
            }

            if this.eof {
                return Poll::Ready(None);
            }

            // Allocate the read buffer on first use only.
            if this.buf.len() != READ_BUF_SIZE {
                this.buf.resize(READ_BUF_SIZE, 0);
            }

            let mut read_buf = ReadBuf::new(&mut this.buf);

            match Pin::new(&mut this.reader).poll_read(cx, &mut read_buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(Ok(())) => {
                    let n = read_buf.filled().len();
                    if n == 0 {
                        this.eof = true;
                        assembler.finish();
                    } else {
                        assembler.push(this.chunker, &this.buf[..n]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/stream_tests.rs"]
mod tests;
