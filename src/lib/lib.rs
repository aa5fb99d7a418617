//! An emulation core for a disk-pack controller with up to eight drives,
//! plus a companion line printer. Devices are driven through IOT pulses and
//! complete operations through a host-provided event queue; [`SimBus`] is a
//! self-contained host for tests and single-device tools.

mod bus;
mod controller;
mod geometry;
mod image;
mod printer;
mod registers;

pub use crate::bus::{Bus, IotResponse, ServiceError, SimBus};
pub use crate::controller::{
    DiskPack, NoSuchUnit, DEFAULT_ROTATE_TICKS, DEFAULT_SEEK_TICKS, MIN_DISPATCH, NUM_UNITS,
};
pub use crate::geometry::{
    DiskAddress, CYLINDERS, DRIVE_WORDS, SECTORS_PER_SURFACE, SURFACES_PER_CYLINDER,
    WORDS_PER_SECTOR,
};
pub use crate::image::{FileImage, PackImage, BYTES_PER_WORD};
pub use crate::printer::{LinePrinter, DEFAULT_PRINT_TICKS};
pub use crate::registers::*;

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use log::LevelFilter;
    use simplelog::{Config, TestLogger};

    // The first test to run initialises the logger; the rest fail silently.
    let _ = TestLogger::init(LevelFilter::Trace, Config::default());
}
