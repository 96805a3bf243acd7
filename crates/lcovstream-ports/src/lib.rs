//! Shared port traits for lcovstream's hexagonal architecture.

use std::io;

/// Port for a byte source that supplies chunks in order.
///
/// Chunks may have any size, including zero; they carry no alignment with
/// record boundaries.
pub trait ChunkSource {
    /// Returns the next chunk, or `None` once the input has ended.
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>>;
}

impl<S: ChunkSource + ?Sized> ChunkSource for &mut S {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).next_chunk()
    }
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).next_chunk()
    }
}
