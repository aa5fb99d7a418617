use std::io;

/// Bytes used to persist one 18-bit word.
pub const BYTES_PER_WORD: usize = 4;

/// A drive's backing store: a flat sequence of words, no header, no
/// metadata. Position implies disk address.
pub trait PackImage {
    /// Read up to `buf.len()` words starting at `word_offset`, returning how
    /// many were actually available. A short count means the store's current
    /// extent ended; the caller treats the remainder as zero.
    fn read_words(&mut self, word_offset: usize, buf: &mut [u32]) -> io::Result<usize>;

    /// Write `words` starting at `word_offset`, extending the store as
    /// needed.
    fn write_words(&mut self, word_offset: usize, words: &[u32]) -> io::Result<()>;
}
