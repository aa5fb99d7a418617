//! The contract between the devices and the simulation host.
//!
//! The devices never block and never spawn activity of their own: every
//! asynchronous operation is a request to the host's discrete-event queue,
//! which later calls back into the device's service routine. `Bus` is that
//! queue's interface, together with the interrupt line and the system memory
//! array. `SimBus` is a minimal single-threaded implementation used by the
//! tests and as a worked example for embedders; a real host supplies its own.

use std::io;

/// Host capabilities consumed by the devices.
///
/// A device schedules at most one event per unit slot at a time. The
/// interrupt line is a level: devices recompute and re-assert it on every
/// state change rather than pulsing it.
pub trait Bus {
    /// Arrange for the unit's service routine to be called after `ticks`.
    fn schedule(&mut self, unit: usize, ticks: u64);

    /// Drop the unit's pending event, if any.
    fn cancel(&mut self, unit: usize);

    /// Whether the unit has an event outstanding.
    fn is_pending(&self, unit: usize) -> bool;

    /// Drive the device's interrupt request line.
    fn set_interrupt(&mut self, asserted: bool);

    /// The shared system memory, one 18-bit value per element.
    fn memory(&self) -> &[u32];

    fn memory_mut(&mut self) -> &mut [u32];

    /// Latch the memory system's non-existent-memory condition.
    fn set_nonexistent_memory(&mut self);
}

/// The outcome of one command pulse: the (possibly replaced) accumulator
/// value, plus whether the host CPU should skip its next instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IotResponse {
    pub ac: u32,
    pub skip: bool,
}

impl IotResponse {
    pub(crate) fn ac(ac: u32) -> Self {
        IotResponse { ac, skip: false }
    }

    pub(crate) fn skip_if(ac: u32, skip: bool) -> Self {
        IotResponse { ac, skip }
    }
}

/// Why a service call could not run to completion. Either way the device has
/// already reached a consistent done state; the host decides whether to halt.
#[derive(Debug)]
pub enum ServiceError {
    /// The addressed unit has no backing store attached.
    NotAttached,
    /// The backing store failed mid-operation.
    Io(io::Error),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::NotAttached => write!(f, "unit not attached"),
            ServiceError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

/// A deterministic single-threaded host: a slot table of event deadlines, a
/// word-array memory, and the interrupt/non-existent-memory latches.
pub struct SimBus {
    now: u64,
    pending: Vec<Option<u64>>,
    memory: Vec<u32>,
    interrupt: bool,
    nonexistent_memory: bool,
}

impl SimBus {
    /// A bus with `slots` event slots and `memory_words` words of memory.
    pub fn new(slots: usize, memory_words: usize) -> Self {
        SimBus {
            now: 0,
            pending: vec![None; slots],
            memory: vec![0; memory_words],
            interrupt: false,
            nonexistent_memory: false,
        }
    }

    /// Current simulated time in ticks.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn interrupt_asserted(&self) -> bool {
        self.interrupt
    }

    pub fn nonexistent_memory(&self) -> bool {
        self.nonexistent_memory
    }

    pub fn clear_nonexistent_memory(&mut self) {
        self.nonexistent_memory = false;
    }

    /// The deadline of a slot's pending event, if any.
    pub fn deadline(&self, unit: usize) -> Option<u64> {
        self.pending[unit]
    }

    /// Advance time to the earliest pending event and consume it, returning
    /// the slot whose service routine should now run. Equal deadlines fire
    /// in slot order, which is what makes multi-unit runs deterministic.
    pub fn advance(&mut self) -> Option<usize> {
        let (unit, deadline) = self
            .pending
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.map(|d| (i, d)))
            .min_by_key(|&(i, d)| (d, i))?;
        self.now = deadline;
        self.pending[unit] = None;
        Some(unit)
    }
}

impl Bus for SimBus {
    fn schedule(&mut self, unit: usize, ticks: u64) {
        // The devices guarantee at most one event per slot; a reschedule
        // replaces the old deadline.
        self.pending[unit] = Some(self.now + ticks);
    }

    fn cancel(&mut self, unit: usize) {
        self.pending[unit] = None;
    }

    fn is_pending(&self, unit: usize) -> bool {
        self.pending[unit].is_some()
    }

    fn set_interrupt(&mut self, asserted: bool) {
        self.interrupt = asserted;
    }

    fn memory(&self) -> &[u32] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u32] {
        &mut self.memory
    }

    fn set_nonexistent_memory(&mut self) {
        self.nonexistent_memory = true;
    }
}
