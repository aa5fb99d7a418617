use std::io;

use super::image_interface::PackImage;

/// An in-memory pack image, used when testing the controller. Grows on
/// write like a freshly created file image.
pub struct MemImage {
    words: Vec<u32>,
}

impl MemImage {
    pub fn new() -> Self {
        MemImage { words: Vec::new() }
    }

    /// Current extent in words.
    pub fn len_words(&self) -> usize {
        self.words.len()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

impl PackImage for MemImage {
    fn read_words(&mut self, word_offset: usize, buf: &mut [u32]) -> io::Result<usize> {
        if word_offset >= self.words.len() {
            return Ok(0);
        }
        let available = self.words.len() - word_offset;
        let count = available.min(buf.len());
        buf[..count].copy_from_slice(&self.words[word_offset..word_offset + count]);
        Ok(count)
    }

    fn write_words(&mut self, word_offset: usize, words: &[u32]) -> io::Result<()> {
        let end = word_offset + words.len();
        if end > self.words.len() {
            self.words.resize(end, 0);
        }
        self.words[word_offset..end].copy_from_slice(words);
        Ok(())
    }
}
