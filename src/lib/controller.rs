//! The disk-pack controller: command decoder, status model, per-unit state
//! machine and timing.
//!
//! The controller is programmed through two groups of IOT pulses. Loads
//! stage the disk/memory/word-count registers and the function and unit
//! fields of status A; once the go bit is set, the addressed unit's
//! operation is handed to the host's event queue and completes
//! asynchronously in [`DiskPack::on_unit_event`]. Every path that changes
//! visible state funnels through `update_status`, which rebuilds the
//! dynamic status bits, the composite error bit and the interrupt line, so
//! those are never stale.
//!
//! Seek and recalibrate are two-phase: the first event moves the heads
//! (reporting the target cylinder immediately) and schedules a settling
//! event; the settling event raises the unit's attention bit.

use log::{debug, trace, warn};
use std::fmt;
use std::io;

use crate::bus::{Bus, IotResponse, ServiceError};
use crate::geometry::{DiskAddress, CYLINDERS, DRIVE_WORDS, WORDS_PER_SECTOR};
use crate::image::PackImage;
use crate::registers::*;

/// Drive slots per controller.
pub const NUM_UNITS: usize = 8;

/// Minimum dispatch delay in ticks. Every operation completes at least this
/// long after "go", so software that polls done after starting an operation
/// always observes a transition.
pub const MIN_DISPATCH: u64 = 2;
/// Default seek time per cylinder of travel, in ticks.
pub const DEFAULT_SEEK_TICKS: u64 = 10;
/// Default rotational latency for data transfers, in ticks.
pub const DEFAULT_ROTATE_TICKS: u64 = 10;

/// One more than the largest storable word count; the stored count is the
/// two's-complement negative of the true count.
const WORD_COUNT_MODULUS: usize = 0o1000000;

/// Status B flags cleared when a new operation starts (and by the
/// clear-flags pulse).
const STB_CLEARED_ON_GO: u32 =
    STB_FME | STB_WPE | STB_LON | STB_WCE | STB_TME | STB_PGE | STB_EOP;

/// A unit index outside the fitted drive slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoSuchUnit {
    pub unit: usize,
}

impl fmt::Display for NoSuchUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no such unit: {}", self.unit)
    }
}

/// One drive: head position, current command, configuration and backing
/// store.
struct DriveUnit<I> {
    cylinder: u32,
    function: Function,
    second_phase: bool,
    write_locked: bool,
    image: Option<I>,
}

impl<I> DriveUnit<I> {
    fn new() -> Self {
        DriveUnit {
            cylinder: 0,
            function: Function::Idle,
            second_phase: false,
            write_locked: false,
            image: None,
        }
    }

    fn is_attached(&self) -> bool {
        self.image.is_some()
    }
}

/// A disk-pack controller with up to [`NUM_UNITS`] drives.
///
/// The type parameter is the backing-store implementation bound to attached
/// units. Hosts must provide `Bus` event slots for indices `0..NUM_UNITS`;
/// the unit-select field is three bits wide regardless of how many drives
/// are fitted, and selecting an unfitted slot behaves like an unattached
/// drive.
pub struct DiskPack<I> {
    status_a: StatusA,
    status_b: StatusB,
    disk_address: u32,
    memory_address: u32,
    word_count: u32,
    busy: bool,
    stop_on_io_error: bool,
    seek_ticks: u64,
    rotate_ticks: u64,
    units: Vec<DriveUnit<I>>,
}

impl<I: PackImage> DiskPack<I> {
    /// A controller with the full complement of drive slots.
    pub fn new() -> Self {
        Self::with_units(NUM_UNITS)
    }

    /// A controller with `units` fitted drive slots (1 to [`NUM_UNITS`]).
    pub fn with_units(units: usize) -> Self {
        assert!(
            (1..=NUM_UNITS).contains(&units),
            "a controller has 1 to {} units",
            NUM_UNITS
        );
        DiskPack {
            status_a: StatusA::default(),
            status_b: StatusB::default(),
            disk_address: 0,
            memory_address: 0,
            word_count: 0,
            busy: false,
            stop_on_io_error: true,
            seek_ticks: DEFAULT_SEEK_TICKS,
            rotate_ticks: DEFAULT_ROTATE_TICKS,
            units: (0..units).map(|_| DriveUnit::new()).collect(),
        }
    }

    /// Whether to surface unattached/I/O service failures to the host run
    /// loop as errors (default) or swallow them after flagging.
    pub fn set_stop_on_io_error(&mut self, stop: bool) {
        self.stop_on_io_error = stop;
    }

    /// Seek time per cylinder of travel.
    pub fn set_seek_ticks(&mut self, ticks: u64) {
        self.seek_ticks = ticks;
    }

    /// Rotational latency added to data transfers.
    pub fn set_rotate_ticks(&mut self, ticks: u64) {
        self.rotate_ticks = ticks;
    }

    /// Set or clear a unit's hardware write-lock switch. Takes effect at the
    /// next status update.
    pub fn set_write_locked(&mut self, unit: usize, locked: bool) -> Result<(), NoSuchUnit> {
        self.unit_mut(unit)?.write_locked = locked;
        Ok(())
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    /// Polled-status readiness: true while done/error or any attention is
    /// outstanding.
    pub fn ready(&self) -> bool {
        self.status_a.contains(STA_DON | STA_ERR) || self.status_b.contains(STB_ATTN)
    }

    /// Bind a backing store to a unit. Replaces any store already attached.
    pub fn attach<B: Bus>(&mut self, bus: &mut B, unit: usize, image: I) -> Result<(), NoSuchUnit> {
        self.unit_mut(unit)?.image = Some(image);
        debug!("Unit {} attached.", unit);
        self.update_status(bus, 0, 0);
        Ok(())
    }

    /// Unbind a unit's backing store, returning it so the host can close
    /// it. The unit reports unsafe/not-ready afterwards.
    pub fn detach<B: Bus>(&mut self, bus: &mut B, unit: usize) -> Result<Option<I>, NoSuchUnit> {
        let image = self.unit_mut(unit)?.image.take();
        debug!("Unit {} detached.", unit);
        self.update_status(bus, 0, 0);
        Ok(image)
    }

    /// Clear all registers and unit state and cancel every pending event.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        debug!("Controller reset.");
        self.status_a = StatusA::default();
        self.status_b = StatusB::default();
        self.disk_address = 0;
        self.memory_address = 0;
        self.word_count = 0;
        self.busy = false;
        bus.set_interrupt(false);
        for (index, unit) in self.units.iter_mut().enumerate() {
            bus.cancel(index);
            unit.cylinder = 0;
            unit.function = Function::Idle;
            unit.second_phase = false;
        }
    }

    /// Command group 1: skip tests, status reads, and the disk-address,
    /// clear-flags, memory-address and word-count loads.
    pub fn group1<B: Bus>(&mut self, bus: &mut B, pulse: u32, ac: u32) -> IotResponse {
        self.update_status(bus, 0, 0);
        match pulse {
            // Skip on done, error or attention.
            0o01 => {
                return IotResponse::skip_if(
                    ac,
                    self.status_a.contains(STA_DON | STA_ERR) || self.status_b.contains(STB_ATTN),
                )
            }
            // Skip on attention.
            0o21 => return IotResponse::skip_if(ac, self.status_b.contains(STB_ATTN)),
            // Skip on done.
            0o41 => return IotResponse::skip_if(ac, self.status_a.contains(STA_DON)),
            // Skip on error.
            0o61 => return IotResponse::skip_if(ac, self.status_a.contains(STA_ERR)),
            // Read status A / status B.
            0o02 => return IotResponse::ac(self.status_a.bits()),
            0o22 => return IotResponse::ac(self.status_b.bits()),
            _ => {}
        }
        if pulse & 0o07 == 0o04 {
            if self.busy {
                // Register loads are rejected outright while an operation is
                // in flight.
                self.update_status(bus, 0, STB_PGE);
                return IotResponse::ac(ac);
            }
            match pulse {
                // Load disk address, validating each component immediately.
                0o04 => {
                    self.disk_address = ac & WORD_MASK;
                    let da = DiskAddress::decode(self.disk_address);
                    if !da.sector_ok() {
                        self.update_status(bus, STA_NXS, 0);
                    }
                    if !da.surface_ok() {
                        self.update_status(bus, STA_NXF, 0);
                    }
                    if !da.cylinder_ok() {
                        self.update_status(bus, STA_NXC, 0);
                    }
                }
                // Clear the transfer completion/error flags.
                0o24 => {
                    self.status_a.clear(STA_HNF | STA_DON);
                    self.status_b.clear(STB_CLEARED_ON_GO);
                    self.update_status(bus, 0, 0);
                }
                // Load memory address.
                0o44 => self.memory_address = ac & WORD_MASK,
                // Load word count (two's-complement negative count).
                0o64 => self.word_count = ac & WORD_MASK,
                _ => {}
            }
        }
        IotResponse::ac(ac)
    }

    /// Command group 2: register reads and the four status-A load variants,
    /// each of which may fire "go".
    pub fn group2<B: Bus>(&mut self, bus: &mut B, pulse: u32, ac: u32) -> IotResponse {
        match pulse {
            // Unconditional skip.
            0o21 => return IotResponse::skip_if(ac, true),
            // Read the selected unit's current cylinder.
            0o02 => {
                let cylinder = self
                    .units
                    .get(self.status_a.unit())
                    .map_or(0, |unit| unit.cylinder);
                return IotResponse::ac(cylinder);
            }
            // Read disk address / memory address / word count.
            0o22 => return IotResponse::ac(self.disk_address),
            0o42 => return IotResponse::ac(self.memory_address),
            0o62 => return IotResponse::ac(self.word_count),
            _ => {}
        }
        if pulse & 0o07 != 0o04 {
            return IotResponse::ac(ac);
        }
        if self.busy {
            self.update_status(bus, 0, STB_PGE);
            return IotResponse::ac(ac);
        }
        match pulse {
            // Clear the loadable field.
            0o04 => self.status_a.clear_rw(),
            // AND-load: keep only the loadable bits also set in AC.
            0o24 => self.status_a.and_rw(ac),
            // OR-load.
            0o44 => self.status_a.or_rw(ac),
            // Replace the loadable field.
            0o64 => self.status_a.replace_rw(ac),
            _ => {}
        }
        if self.status_a.contains(STA_GO) {
            let unit = self.status_a.unit();
            if bus.is_pending(unit) {
                // The addressed unit already has an operation outstanding;
                // this go is silently ignored.
                return IotResponse::ac(ac);
            }
            let function = self.status_a.function();
            if let Some(drive) = self.units.get_mut(unit) {
                drive.function = function;
                drive.second_phase = false;
            }
            self.busy = true;
            self.status_a.clear(STA_HNF | STA_DON);
            self.status_b
                .clear(STB_CLEARED_ON_GO | StatusB::attention_bit(unit));
            let delay = self.dispatch_delay(unit, function);
            debug!(
                "Go: unit {} function {:?}, completing in {} ticks.",
                unit, function, delay
            );
            bus.schedule(unit, delay);
        }
        self.update_status(bus, 0, 0);
        IotResponse::ac(ac)
    }

    /// Ticks until the unit's first completion event. Positioning and idle
    /// functions (and anything aimed at an unattached unit) complete after
    /// the minimum dispatch delay; data transfers pay head travel to the
    /// target cylinder plus rotational latency.
    fn dispatch_delay(&self, unit: usize, function: Function) -> u64 {
        let drive = match self.units.get(unit) {
            Some(drive) if drive.is_attached() => drive,
            _ => return MIN_DISPATCH,
        };
        if function == Function::Idle || function.is_positioning() {
            return MIN_DISPATCH;
        }
        let target = DiskAddress::decode(self.disk_address).cylinder;
        let travel = u64::from(target.abs_diff(drive.cylinder));
        (self.seek_ticks * travel + self.rotate_ticks).max(MIN_DISPATCH)
    }

    /// Service a unit whose scheduled event has fired. Runs the state
    /// machine to completion synchronously.
    ///
    /// Errors are returned only when `stop_on_io_error` is set, and only for
    /// unattached-unit aborts and backing-store failures; either way the
    /// controller has already reached a consistent done state.
    pub fn on_unit_event<B: Bus>(
        &mut self,
        bus: &mut B,
        unit: usize,
    ) -> Result<(), ServiceError> {
        let (function, second_phase) = match self.units.get(unit) {
            Some(drive) => (drive.function, drive.second_phase),
            None => {
                // No drive fitted in this slot: complete as unattached.
                self.update_status(bus, STA_DON, STB_SUFU);
                return self.not_attached();
            }
        };
        trace!(
            "Servicing unit {}: function {:?}, second phase {}.",
            unit,
            function,
            second_phase
        );

        if function == Function::Idle {
            self.busy = false;
            return Ok(());
        }

        if function.is_positioning() && !second_phase {
            // Seek/recalibrate phase one: release the controller, move the
            // heads and schedule the settling event. The unit reports the
            // target cylinder from this point on.
            self.busy = false;
            let target = match function {
                Function::Seek => DiskAddress::decode(self.disk_address).cylinder,
                _ => 0,
            };
            let drive = &mut self.units[unit];
            let travel = u64::from(target.abs_diff(drive.cylinder));
            drive.cylinder = target;
            drive.function = Function::Seek;
            drive.second_phase = true;
            bus.schedule(unit, (self.seek_ticks * travel).max(MIN_DISPATCH));
            self.update_status(bus, 0, 0);
            return Ok(());
        }

        if second_phase {
            // Settled: raise this unit's attention line.
            let pending_b = self.status_b.bits() | StatusB::attention_bit(unit);
            self.update_status(bus, 0, pending_b);
            return Ok(());
        }

        // Data transfer. Validate the unit and the staged disk address
        // before touching storage.
        if !self.units[unit].is_attached() {
            self.update_status(bus, STA_DON, STB_SUFU);
            return self.not_attached();
        }
        let da = DiskAddress::decode(self.disk_address);
        if !da.sector_ok() {
            self.update_status(bus, STA_NXS, 0);
        }
        if !da.surface_ok() {
            self.update_status(bus, STA_NXF, 0);
        }
        if !da.cylinder_ok() {
            self.update_status(bus, STA_NXC, 0);
        }
        if self.status_a.contains(STA_NXS | STA_NXF | STA_NXC) {
            self.update_status(bus, STA_DON, STB_SUFU);
            return Ok(());
        }

        let mut address = self.memory_address as usize;
        let offset = da.word_offset();
        let mut count = WORD_COUNT_MODULUS - self.word_count as usize;
        if address + count > bus.memory().len() {
            // An address register pointing past the end of memory clamps to
            // a zero-length transfer; it must not index out of bounds.
            bus.set_nonexistent_memory();
            address = address.min(bus.memory().len());
            count = bus.memory().len() - address;
        }
        if offset + count > DRIVE_WORDS {
            self.update_status(bus, 0, STB_EOP);
            count = DRIVE_WORDS - offset;
        }

        let mut write_check_failed = false;
        let io_result = {
            let image = self.units[unit].image.as_mut().unwrap();
            match function {
                Function::Read => {
                    Self::read_into_memory(image, bus, offset, address, count)
                }
                Function::Write => Self::write_from_memory(image, bus, offset, address, count),
                Function::WriteCheck => {
                    Self::check_against_memory(image, bus, offset, address, count)
                        .map(|mismatch| write_check_failed = mismatch)
                }
                // Read-all/write-all address header words this model does
                // not store; registers and flags advance, no data moves.
                Function::ReadAll | Function::WriteAll => Ok(()),
                Function::Idle | Function::Seek | Function::Recalibrate => unreachable!(),
            }
        };
        if write_check_failed {
            self.update_status(bus, 0, STB_WCE);
        }

        // Final register values: counts advance by the words actually
        // transferred (18-bit wrap), the disk address by whole sectors.
        self.word_count = (self.word_count + count as u32) & WORD_MASK;
        self.memory_address = (self.memory_address + count as u32) & WORD_MASK;
        let final_sector = (offset + count + WORDS_PER_SECTOR - 1) / WORDS_PER_SECTOR;
        self.disk_address = DiskAddress::from_sector_number(final_sector).pack();
        self.busy = false;
        self.update_status(bus, STA_DON, 0);

        match io_result {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Unit {} I/O error: {}", unit, e);
                if self.stop_on_io_error {
                    Err(ServiceError::Io(e))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn read_into_memory<B: Bus>(
        image: &mut I,
        bus: &mut B,
        offset: usize,
        address: usize,
        count: usize,
    ) -> io::Result<()> {
        let mut buf = vec![0u32; count];
        let available = image.read_words(offset, &mut buf)?;
        // Positions past the image's extent read as zero.
        buf[available..].fill(0);
        bus.memory_mut()[address..address + count].copy_from_slice(&buf);
        Ok(())
    }

    fn write_from_memory<B: Bus>(
        image: &mut I,
        bus: &mut B,
        offset: usize,
        address: usize,
        count: usize,
    ) -> io::Result<()> {
        image.write_words(offset, &bus.memory()[address..address + count])?;
        // Pad out the final sector with zero words.
        let partial = count % WORDS_PER_SECTOR;
        if partial != 0 {
            let fill = vec![0u32; WORDS_PER_SECTOR - partial];
            image.write_words(offset + count, &fill)?;
        }
        Ok(())
    }

    /// Compare `count` words of the image against memory, returning whether
    /// any word mismatched. The whole range is compared regardless.
    fn check_against_memory<B: Bus>(
        image: &mut I,
        bus: &mut B,
        offset: usize,
        address: usize,
        count: usize,
    ) -> io::Result<bool> {
        let mut buf = vec![0u32; count];
        let available = image.read_words(offset, &mut buf)?;
        buf[available..].fill(0);
        Ok(buf != bus.memory()[address..address + count])
    }

    /// Rebuild status from scratch: clear the dynamic and composite bits,
    /// fold in the pending flags, re-derive the selected unit's condition,
    /// then the error bit and the interrupt line.
    fn update_status<B: Bus>(&mut self, bus: &mut B, pending_a: u32, pending_b: u32) {
        let selected = self.status_a.unit();
        self.status_a.clear(STA_DYN | STA_ERR);
        self.status_a.set(pending_a);
        self.status_b.clear(STB_DYN);
        self.status_b.set(pending_b);

        match self.units.get(selected) {
            None => self.status_b.set(STB_SUFU | STB_SUNR),
            Some(drive) => {
                if drive.write_locked {
                    self.status_a.set(STA_SUWP);
                }
                if !drive.is_attached() {
                    self.status_b.set(STB_SUFU | STB_SUNR);
                } else if bus.is_pending(selected) {
                    if drive.function.is_positioning() {
                        self.status_b.set(STB_SUSU | STB_SUNR);
                    }
                } else if drive.cylinder as usize >= CYLINDERS {
                    // Never properly positioned.
                    self.status_a.set(STA_SUSI);
                }
            }
        }

        if self.status_a.contains(STA_EFLGS) || self.status_b.contains(STB_EFLGS) {
            self.status_a.set(STA_ERR);
        }
        let interrupt = (self.status_a.contains(STA_DON | STA_ERR)
            && self.status_a.contains(STA_IED))
            || (self.status_b.contains(STB_ATTN) && self.status_a.contains(STA_IEA));
        bus.set_interrupt(interrupt);
    }

    fn not_attached(&self) -> Result<(), ServiceError> {
        if self.stop_on_io_error {
            Err(ServiceError::NotAttached)
        } else {
            Ok(())
        }
    }

    fn unit_mut(&mut self, unit: usize) -> Result<&mut DriveUnit<I>, NoSuchUnit> {
        self.units.get_mut(unit).ok_or(NoSuchUnit { unit })
    }
}

impl<I: PackImage> Default for DiskPack<I> {
    fn default() -> Self {
        Self::new()
    }
}
