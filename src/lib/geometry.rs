//! Drive geometry and the packed disk-address format.
//!
//! A disk address names a sector as (cylinder, surface, sector) packed into
//! one 18-bit word: sector in bits 3..0, surface in bits 9..5, cylinder in
//! bits 17..10. Bit 4 is unused. All fields are unsigned; there is no sign
//! extension anywhere.

/// Words per sector.
pub const WORDS_PER_SECTOR: usize = 256;
/// Sectors per surface.
pub const SECTORS_PER_SURFACE: usize = 10;
/// Surfaces per cylinder.
pub const SURFACES_PER_CYLINDER: usize = 20;
/// Cylinders per drive.
pub const CYLINDERS: usize = 203;
/// Total words on one drive.
pub const DRIVE_WORDS: usize =
    CYLINDERS * SURFACES_PER_CYLINDER * SECTORS_PER_SURFACE * WORDS_PER_SECTOR;

const SECTORS_PER_CYLINDER: usize = SECTORS_PER_SURFACE * SURFACES_PER_CYLINDER;

// Packed address field positions.
const DA_V_SECT: u32 = 0;
const DA_M_SECT: u32 = 0o17;
const DA_V_SURF: u32 = 5;
const DA_M_SURF: u32 = 0o37;
const DA_V_CYL: u32 = 10;
const DA_M_CYL: u32 = 0o377;

/// An unpacked disk address. Field values may be out of range for the drive;
/// the validity predicates check each component independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskAddress {
    pub cylinder: u32,
    pub surface: u32,
    pub sector: u32,
}

impl DiskAddress {
    /// Extract the three components from a packed address word.
    pub fn decode(packed: u32) -> Self {
        DiskAddress {
            cylinder: (packed >> DA_V_CYL) & DA_M_CYL,
            surface: (packed >> DA_V_SURF) & DA_M_SURF,
            sector: (packed >> DA_V_SECT) & DA_M_SECT,
        }
    }

    /// Pack the components back into an address word.
    pub fn pack(&self) -> u32 {
        ((self.cylinder & DA_M_CYL) << DA_V_CYL)
            | ((self.surface & DA_M_SURF) << DA_V_SURF)
            | ((self.sector & DA_M_SECT) << DA_V_SECT)
    }

    /// The address of the `n`th sector on the drive. A sector number off the
    /// end of the pack saturates at the last cylinder; the head cannot move
    /// past it.
    pub fn from_sector_number(n: usize) -> Self {
        let mut cylinder = n / SECTORS_PER_CYLINDER;
        if cylinder >= CYLINDERS {
            cylinder = CYLINDERS - 1;
        }
        let in_cylinder = n % SECTORS_PER_CYLINDER;
        DiskAddress {
            cylinder: cylinder as u32,
            surface: (in_cylinder / SECTORS_PER_SURFACE) as u32,
            sector: (in_cylinder % SECTORS_PER_SURFACE) as u32,
        }
    }

    /// Linear sector number of this address.
    pub fn sector_number(&self) -> usize {
        (self.cylinder as usize * SURFACES_PER_CYLINDER + self.surface as usize)
            * SECTORS_PER_SURFACE
            + self.sector as usize
    }

    /// Word offset of the start of this sector within the drive.
    pub fn word_offset(&self) -> usize {
        self.sector_number() * WORDS_PER_SECTOR
    }

    pub fn sector_ok(&self) -> bool {
        (self.sector as usize) < SECTORS_PER_SURFACE
    }

    pub fn surface_ok(&self) -> bool {
        (self.surface as usize) < SURFACES_PER_CYLINDER
    }

    pub fn cylinder_ok(&self) -> bool {
        (self.cylinder as usize) < CYLINDERS
    }

    pub fn is_valid(&self) -> bool {
        self.sector_ok() && self.surface_ok() && self.cylinder_ok()
    }
}
