use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::image_interface::{PackImage, BYTES_PER_WORD};

/// A pack image persisted on the host filesystem: a flat file holding one
/// little-endian 4-byte value per word.
pub struct FileImage {
    file: File,
}

impl FileImage {
    /// Create a new empty image, truncating any existing file.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        debug!("Creating pack image '{}'.", path.as_ref().display());
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(FileImage { file })
    }

    /// Open an existing image read/write.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        debug!("Opening pack image '{}'.", path.as_ref().display());
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(FileImage { file })
    }

    /// Current extent in words. Trailing partial words are not counted.
    pub fn len_words(&self) -> io::Result<usize> {
        let bytes = self.file.metadata()?.len();
        Ok((bytes / BYTES_PER_WORD as u64) as usize)
    }
}

impl PackImage for FileImage {
    fn read_words(&mut self, word_offset: usize, buf: &mut [u32]) -> io::Result<usize> {
        self.file
            .seek(SeekFrom::Start((word_offset * BYTES_PER_WORD) as u64))?;
        let mut bytes = vec![0u8; buf.len() * BYTES_PER_WORD];
        // Read until EOF or the buffer is full; a short total is not an
        // error, it just marks the end of the extent.
        let mut total = 0;
        while total < bytes.len() {
            match self.file.read(&mut bytes[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let words = total / BYTES_PER_WORD;
        for (i, word) in buf[..words].iter_mut().enumerate() {
            let base = i * BYTES_PER_WORD;
            *word = u32::from_le_bytes(bytes[base..base + BYTES_PER_WORD].try_into().unwrap());
        }
        Ok(words)
    }

    fn write_words(&mut self, word_offset: usize, words: &[u32]) -> io::Result<()> {
        self.file
            .seek(SeekFrom::Start((word_offset * BYTES_PER_WORD) as u64))?;
        let mut bytes = Vec::with_capacity(words.len() * BYTES_PER_WORD);
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        self.file.write_all(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::init_test_logging;

    #[test]
    fn test_write_read_round_trip() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.img");

        let mut image = FileImage::create(&path).unwrap();
        let data: Vec<u32> = (0..512).map(|_| rand::random::<u32>() & 0o777777).collect();
        image.write_words(256, &data).unwrap();

        // Reopen to prove the data went through the filesystem.
        let mut image = FileImage::open(&path).unwrap();
        let mut buf = vec![0u32; 512];
        let n = image.read_words(256, &mut buf).unwrap();
        assert_eq!(n, 512);
        assert_eq!(buf, data);
        assert_eq!(image.len_words().unwrap(), 768);
    }

    #[test]
    fn test_read_beyond_extent_is_short() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.img");

        let mut image = FileImage::create(&path).unwrap();
        image.write_words(0, &[1, 2, 3]).unwrap();

        let mut buf = [0u32; 8];
        let n = image.read_words(0, &mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);

        // Entirely past the end.
        let n = image.read_words(100, &mut buf).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_unwritten_gap_reads_zero() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.img");

        let mut image = FileImage::create(&path).unwrap();
        image.write_words(10, &[0o777777]).unwrap();

        let mut buf = [0xFFu32; 1];
        let n = image.read_words(5, &mut buf).unwrap();
        assert_eq!(n, 1);
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn test_open_missing_file_fails() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        assert!(FileImage::open(dir.path().join("nope.img")).is_err());
    }
}
