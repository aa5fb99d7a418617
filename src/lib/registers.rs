//! The controller's two 18-bit status words.
//!
//! The raw bit layout is part of the programmed I/O protocol: software reads
//! and loads these words through the command surface, so the constants are
//! public. The newtypes exist so that the rest of the crate manipulates the
//! words through named operations rather than scattered bit arithmetic.

/// Mask of a full 18-bit register.
pub const WORD_MASK: u32 = 0o777777;

// Status A field positions.
pub const STA_V_UNIT: u32 = 15;
pub const STA_M_UNIT: u32 = 0o7;
pub const STA_V_FUNC: u32 = 12;
pub const STA_M_FUNC: u32 = 0o7;

// Status A flags.
pub const STA_IED: u32 = 0o004000; // interrupt enable: done
pub const STA_IEA: u32 = 0o002000; // interrupt enable: attention
pub const STA_GO: u32 = 0o001000; // go
pub const STA_WPE: u32 = 0o000400; // write lock error
pub const STA_NXC: u32 = 0o000200; // non-existent cylinder
pub const STA_NXF: u32 = 0o000100; // non-existent surface
pub const STA_NXS: u32 = 0o000040; // non-existent sector
pub const STA_HNF: u32 = 0o000020; // header not found
pub const STA_SUWP: u32 = 0o000010; // selected unit write locked
pub const STA_SUSI: u32 = 0o000004; // selected unit seek incomplete
pub const STA_DON: u32 = 0o000002; // done
pub const STA_ERR: u32 = 0o000001; // composite error

/// The software-loadable portion of status A (unit, function, enables, go).
pub const STA_RW: u32 = 0o777000;
/// Status A error subset; any of these forces `STA_ERR`.
pub const STA_EFLGS: u32 = STA_WPE | STA_NXC | STA_NXF | STA_NXS | STA_HNF | STA_SUSI;
/// Status A bits recomputed from per-unit state on every update.
pub const STA_DYN: u32 = STA_SUWP | STA_SUSI;

// Status B flags. Attention is one bit per unit, unit 0 at the top.
pub const STB_V_ATT0: u32 = 17;
pub const STB_ATTN: u32 = 0o776000; // attention bitmap
pub const STB_SUFU: u32 = 0o001000; // selected unit unsafe
pub const STB_PGE: u32 = 0o000400; // programming error
pub const STB_EOP: u32 = 0o000200; // end of pack
pub const STB_TME: u32 = 0o000100; // timing error
pub const STB_FME: u32 = 0o000040; // format error
pub const STB_WCE: u32 = 0o000020; // write check error
pub const STB_WPE: u32 = 0o000010; // word parity error
pub const STB_LON: u32 = 0o000004; // long parity error
pub const STB_SUSU: u32 = 0o000002; // selected unit seeking
pub const STB_SUNR: u32 = 0o000001; // selected unit not ready

/// Status B error subset; any of these forces `STA_ERR`.
pub const STB_EFLGS: u32 =
    STB_SUFU | STB_PGE | STB_EOP | STB_TME | STB_FME | STB_WCE | STB_WPE | STB_LON;
/// Status B bits recomputed from per-unit state on every update.
pub const STB_DYN: u32 = STB_SUFU | STB_SUSU | STB_SUNR;

/// Function codes, as loaded into status A bits 14..12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Idle,
    Read,
    Write,
    Recalibrate,
    Seek,
    ReadAll,
    WriteAll,
    WriteCheck,
}

impl Function {
    /// Decode a 3-bit function field.
    pub fn from_bits(bits: u32) -> Self {
        match bits & STA_M_FUNC {
            0 => Function::Idle,
            1 => Function::Read,
            2 => Function::Write,
            3 => Function::Recalibrate,
            4 => Function::Seek,
            5 => Function::ReadAll,
            6 => Function::WriteAll,
            7 => Function::WriteCheck,
            _ => unreachable!(),
        }
    }

    /// Seek and recalibrate position the heads without transferring data.
    pub fn is_positioning(self) -> bool {
        matches!(self, Function::Seek | Function::Recalibrate)
    }
}

/// Status register A: unit select, function, enables, go, and error flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusA(u32);

impl StatusA {
    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, mask: u32) -> bool {
        self.0 & mask != 0
    }

    pub fn set(&mut self, mask: u32) {
        self.0 = (self.0 | mask) & WORD_MASK;
    }

    pub fn clear(&mut self, mask: u32) {
        self.0 &= !mask;
    }

    /// The 3-bit unit select field.
    pub fn unit(self) -> usize {
        ((self.0 >> STA_V_UNIT) & STA_M_UNIT) as usize
    }

    /// The 3-bit function field.
    pub fn function(self) -> Function {
        Function::from_bits(self.0 >> STA_V_FUNC)
    }

    // The four load variants for the software-visible field. Bits outside
    // `STA_RW` are untouched by all of them.

    /// Clear the entire loadable field.
    pub fn clear_rw(&mut self) {
        self.0 &= !STA_RW;
    }

    /// Keep only the loadable bits also set in `value`.
    pub fn and_rw(&mut self, value: u32) {
        self.0 &= value | (!STA_RW & WORD_MASK);
    }

    /// Set the loadable bits set in `value`.
    pub fn or_rw(&mut self, value: u32) {
        self.0 = (self.0 | (value & STA_RW)) & WORD_MASK;
    }

    /// Replace the entire loadable field with `value`.
    pub fn replace_rw(&mut self, value: u32) {
        self.0 = (self.0 & !STA_RW) | (value & STA_RW);
    }
}

/// Status register B: per-unit attention bitmap plus error/dynamic flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusB(u32);

impl StatusB {
    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, mask: u32) -> bool {
        self.0 & mask != 0
    }

    pub fn set(&mut self, mask: u32) {
        self.0 = (self.0 | mask) & WORD_MASK;
    }

    pub fn clear(&mut self, mask: u32) {
        self.0 &= !mask;
    }

    /// The attention bit for the given unit (unit 0 is the top bit).
    pub fn attention_bit(unit: usize) -> u32 {
        debug_assert!(unit < 8);
        1 << (STB_V_ATT0 - unit as u32)
    }
}
