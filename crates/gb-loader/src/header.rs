//! Cartridge header inspection

use flate2::Crc;
use gb_core::engine::GB_HEADER_END;
use gb_core::Enhancements;

/// Start of the header block hashed for database lookups
pub const HEADER_BLOCK_START: usize = 0x100;

const TITLE_START: usize = 0x134;
const CGB_FLAG: usize = 0x143;
const HEADER_CHECKSUM: usize = 0x14D;

/// Identity of a loaded cartridge, computed once per load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeSignature {
    /// CRC32 of the 0x100..0x150 header block
    pub header_crc32: u32,
    /// Checksum byte stored in the header
    pub header_checksum: u8,
    /// Enhancements reported by the engine's classifier
    pub enhancements: Enhancements,
    pub title: String,
}

impl CartridgeSignature {
    /// Inspect a ROM image; `None` when it is too short to carry a header
    pub fn from_rom<F>(rom: &[u8], classify: F) -> Option<Self>
    where
        F: FnOnce(&[u8]) -> Enhancements,
    {
        if rom.len() < GB_HEADER_END {
            return None;
        }

        Some(Self {
            header_crc32: header_crc32(rom),
            header_checksum: rom[HEADER_CHECKSUM],
            enhancements: classify(rom),
            title: extract_title(rom),
        })
    }
}

/// CRC32 of the fixed header block
///
/// Panics if `rom` is shorter than the header.
pub fn header_crc32(rom: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(&rom[HEADER_BLOCK_START..GB_HEADER_END]);
    crc.sum()
}

fn extract_title(rom: &[u8]) -> String {
    // Color-aware headers reuse the tail of the title for the manufacturer code
    let title_size = if rom[CGB_FLAG] & 0x80 == 0x80 { 11 } else { 16 };

    rom[TITLE_START..TITLE_START + title_size]
        .iter()
        .take_while(|&&b| b != 0)
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| b as char)
        .collect()
}
