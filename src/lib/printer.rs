//! The line printer: a one-character-buffer output device.
//!
//! Printable characters complete synchronously inside the strobe pulse;
//! carriage return, form feed and line feed pay the mechanical delay and
//! complete through the host's event queue. The done flag and the
//! interrupt-enable flag together drive the interrupt line.

use log::{debug, warn};
use std::io::Write;

use crate::bus::{Bus, IotResponse, ServiceError};

/// Ticks a carriage-motion character takes to complete.
pub const DEFAULT_PRINT_TICKS: u64 = 100;

/// The printer's single event slot on its bus.
const PRINTER_SLOT: usize = 0;

/// A line printer writing to any byte sink.
pub struct LinePrinter<W> {
    buffer: u8,
    done: bool,
    interrupt_enabled: bool,
    error: bool,
    stop_on_io_error: bool,
    print_ticks: u64,
    out: Option<W>,
}

impl<W: Write> LinePrinter<W> {
    pub fn new() -> Self {
        LinePrinter {
            buffer: 0,
            done: false,
            interrupt_enabled: true,
            error: true,
            stop_on_io_error: false,
            print_ticks: DEFAULT_PRINT_TICKS,
            out: None,
        }
    }

    /// Whether an unattached strobe surfaces as an error to the host run
    /// loop. Real write failures always do.
    pub fn set_stop_on_io_error(&mut self, stop: bool) {
        self.stop_on_io_error = stop;
    }

    pub fn set_print_ticks(&mut self, ticks: u64) {
        self.print_ticks = ticks;
    }

    pub fn error(&self) -> bool {
        self.error
    }

    /// Bind an output sink. Clears the error flag.
    pub fn attach(&mut self, out: W) {
        debug!("Printer attached.");
        self.out = Some(out);
        self.error = false;
    }

    /// Unbind the output sink, returning it so the host can flush and close
    /// it. The printer reports an error until reattached.
    pub fn detach(&mut self) -> Option<W> {
        debug!("Printer detached.");
        self.error = true;
        self.out.take()
    }

    /// Clear the buffer and done flag, raise interrupt enable, and cancel
    /// any pending completion.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        debug!("Printer reset.");
        self.buffer = 0;
        self.done = false;
        self.interrupt_enabled = true;
        self.error = self.out.is_none();
        bus.cancel(PRINTER_SLOT);
        self.update_interrupt(bus);
    }

    /// Decode one IOT pulse.
    pub fn iot<B: Bus>(
        &mut self,
        bus: &mut B,
        pulse: u32,
        ac: u32,
    ) -> Result<IotResponse, ServiceError> {
        match pulse {
            // Skip on done.
            0o1 => Ok(IotResponse::skip_if(ac, self.done)),
            // Clear done.
            0o2 => {
                self.done = false;
                self.update_interrupt(bus);
                Ok(IotResponse::ac(ac))
            }
            // Skip on error.
            0o3 => Ok(IotResponse::skip_if(ac, self.error)),
            // Strobe, optionally clearing done first (the composite pulse).
            0o4 | 0o6 => {
                if pulse == 0o6 {
                    self.done = false;
                    self.update_interrupt(bus);
                }
                self.buffer = (ac & 0o177) as u8;
                // Carriage motion takes time; anything else prints now.
                if matches!(self.buffer, 0o15 | 0o14 | 0o12) {
                    bus.schedule(PRINTER_SLOT, self.print_ticks);
                    Ok(IotResponse::ac(ac))
                } else {
                    self.on_event(bus).map(|()| IotResponse::ac(ac))
                }
            }
            // Set / clear interrupt enable.
            0o5 => {
                self.interrupt_enabled = true;
                self.update_interrupt(bus);
                Ok(IotResponse::ac(ac))
            }
            0o7 => {
                self.interrupt_enabled = false;
                self.update_interrupt(bus);
                Ok(IotResponse::ac(ac))
            }
            _ => {
                warn!("Unknown printer pulse {:#o}.", pulse);
                Ok(IotResponse::ac(ac))
            }
        }
    }

    /// Complete the buffered character: set done and emit the byte.
    pub fn on_event<B: Bus>(&mut self, bus: &mut B) -> Result<(), ServiceError> {
        self.done = true;
        self.update_interrupt(bus);
        let out = match self.out.as_mut() {
            Some(out) => out,
            None => {
                self.error = true;
                return if self.stop_on_io_error {
                    Err(ServiceError::NotAttached)
                } else {
                    Ok(())
                };
            }
        };
        match out.write_all(&[self.buffer]) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Printer I/O error: {}", e);
                Err(ServiceError::Io(e))
            }
        }
    }

    fn update_interrupt<B: Bus>(&self, bus: &mut B) {
        bus.set_interrupt(self.done && self.interrupt_enabled);
    }
}

impl<W: Write> Default for LinePrinter<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::bus::SimBus;
    use crate::init_test_logging;

    struct PrinterFixture {
        printer: LinePrinter<Vec<u8>>,
        bus: SimBus,
    }

    impl PrinterFixture {
        fn new() -> Self {
            init_test_logging();
            let mut printer = LinePrinter::new();
            printer.attach(Vec::new());
            PrinterFixture {
                printer,
                bus: SimBus::new(1, 0),
            }
        }

        fn iot(&mut self, pulse: u32, ac: u32) -> IotResponse {
            self.printer.iot(&mut self.bus, pulse, ac).unwrap()
        }

        fn run(&mut self) {
            while self.bus.advance().is_some() {
                self.printer.on_event(&mut self.bus).unwrap();
            }
        }

        fn output(&mut self) -> Vec<u8> {
            self.printer.detach().unwrap()
        }
    }

    #[test]
    fn test_printable_character_completes_immediately() {
        let mut fixture = PrinterFixture::new();
        assert!(!fixture.iot(0o1, 0).skip); // not done yet
        fixture.iot(0o4, u32::from(b'A'));
        assert!(fixture.iot(0o1, 0).skip);
        assert!(!fixture.bus.is_pending(0));
        assert_eq!(fixture.output(), b"A");
    }

    #[test]
    fn test_carriage_motion_is_scheduled() {
        let mut fixture = PrinterFixture::new();
        fixture.iot(0o4, 0o15);
        // Nothing printed and no done until the event fires.
        assert!(fixture.bus.is_pending(0));
        assert!(!fixture.iot(0o1, 0).skip);
        fixture.run();
        assert!(fixture.iot(0o1, 0).skip);
        assert_eq!(fixture.output(), b"\r");
    }

    #[test]
    fn test_clear_done() {
        let mut fixture = PrinterFixture::new();
        fixture.iot(0o4, u32::from(b'x'));
        assert!(fixture.iot(0o1, 0).skip);
        fixture.iot(0o2, 0);
        assert!(!fixture.iot(0o1, 0).skip);
    }

    #[test]
    fn test_composite_strobe_clears_done_first() {
        let mut fixture = PrinterFixture::new();
        fixture.iot(0o4, u32::from(b'a'));
        fixture.iot(0o6, u32::from(b'b'));
        assert!(fixture.iot(0o1, 0).skip);
        assert_eq!(fixture.output(), b"ab");
    }

    #[test]
    fn test_interrupt_follows_done_and_enable() {
        let mut fixture = PrinterFixture::new();
        // Enable is on after construction; printing raises the line.
        fixture.iot(0o4, u32::from(b'A'));
        assert!(fixture.bus.interrupt_asserted());
        // Disabling drops it, re-enabling raises it again while done holds.
        fixture.iot(0o7, 0);
        assert!(!fixture.bus.interrupt_asserted());
        fixture.iot(0o5, 0);
        assert!(fixture.bus.interrupt_asserted());
        // Clearing done drops it.
        fixture.iot(0o2, 0);
        assert!(!fixture.bus.interrupt_asserted());
    }

    #[test]
    fn test_buffer_masked_to_seven_bits() {
        let mut fixture = PrinterFixture::new();
        fixture.iot(0o4, 0o400 | u32::from(b'Z'));
        assert_eq!(fixture.output(), b"Z");
    }

    #[test]
    fn test_detached_strobe_flags_error() {
        init_test_logging();
        let mut printer: LinePrinter<Vec<u8>> = LinePrinter::new();
        let mut bus = SimBus::new(1, 0);
        assert!(printer.error());

        // By default the abort is flagged but swallowed.
        let response = printer.iot(&mut bus, 0o4, u32::from(b'A')).unwrap();
        assert_eq!(response.ac, u32::from(b'A'));
        assert!(printer.iot(&mut bus, 0o3, 0).unwrap().skip); // skip on error
        assert!(printer.iot(&mut bus, 0o1, 0).unwrap().skip); // done still set

        // With stop-on-error the host run loop sees it.
        printer.set_stop_on_io_error(true);
        let result = printer.iot(&mut bus, 0o4, u32::from(b'A'));
        assert!(matches!(result, Err(ServiceError::NotAttached)));
    }

    #[test]
    fn test_reset() {
        let mut fixture = PrinterFixture::new();
        fixture.iot(0o7, 0);
        fixture.iot(0o4, 0o12); // pending line feed
        assert!(fixture.bus.is_pending(0));

        fixture.printer.reset(&mut fixture.bus);
        assert!(!fixture.bus.is_pending(0));
        assert!(fixture.bus.advance().is_none());
        assert!(!fixture.iot(0o1, 0).skip);
        assert!(!fixture.iot(0o3, 0).skip); // attached, so no error
        assert!(!fixture.bus.interrupt_asserted());
        assert_eq!(fixture.output(), b"");
    }
}
