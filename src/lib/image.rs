mod image_file;
mod image_interface;

pub use image_file::FileImage;
pub use image_interface::*;

// In-memory implementation for testing.
#[cfg(test)]
mod image_mem;
#[cfg(test)]
pub use image_mem::MemImage;
