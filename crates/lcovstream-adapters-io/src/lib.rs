//! Chunk source adapters.
//!
//! [`ReaderSource`] pulls fixed-size chunks from any [`Read`] implementation
//! (files, stdin, sockets). [`ChunkIter`] replays chunks that are already in
//! memory.

use lcovstream_ports::ChunkSource;
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use tracing::trace;

/// Reader-backed chunk source.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
    finished: bool,
}

impl<R: Read> ReaderSource<R> {
    /// Wrap `reader`, reading at most `chunk_size` bytes per chunk.
    ///
    /// A `chunk_size` of 0 is treated as 1.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            finished: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl ReaderSource<File> {
    /// Open a file as a chunk source.
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?, chunk_size))
    }
}

impl<R: Read> ChunkSource for ReaderSource<R> {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }

        let mut chunk = vec![0; self.chunk_size];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    self.finished = true;
                    return Ok(None);
                }
                Ok(read) => {
                    chunk.truncate(read);
                    trace!(bytes = read, "read chunk");
                    return Ok(Some(chunk));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

/// In-memory chunk source over any iterator of byte buffers.
#[derive(Debug, Clone)]
pub struct ChunkIter<I> {
    chunks: I,
}

impl<I> ChunkIter<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    pub fn new(chunks: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            chunks: chunks.into_iter(),
        }
    }
}

impl ChunkIter<std::vec::IntoIter<Vec<u8>>> {
    /// Split `bytes` into chunks of `size` bytes (the last may be shorter).
    ///
    /// # Examples
    ///
    /// ```
    /// use lcovstream_adapters_io::ChunkIter;
    /// use lcovstream_ports::ChunkSource;
    ///
    /// let mut source = ChunkIter::split(b"TN:a\n", 2);
    /// assert_eq!(source.next_chunk().unwrap(), Some(b"TN".to_vec()));
    /// assert_eq!(source.next_chunk().unwrap(), Some(b":a".to_vec()));
    /// assert_eq!(source.next_chunk().unwrap(), Some(b"\n".to_vec()));
    /// assert_eq!(source.next_chunk().unwrap(), None);
    /// ```
    pub fn split(bytes: &[u8], size: usize) -> Self {
        let chunks: Vec<Vec<u8>> = bytes.chunks(size.max(1)).map(<[u8]>::to_vec).collect();
        Self::new(chunks)
    }
}

impl<I> ChunkSource for ChunkIter<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.chunks.next())
    }
}
