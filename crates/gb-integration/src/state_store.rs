//! Save-state files
//!
//! A state file carries exactly two sections, battery RAM and the cartridge
//! clock. Everything else the engine holds (frame counter, work RAM,
//! execution position) is left alone on restore.
//!
//! Layout, little-endian:
//!
//! ```text
//! magic    [u8; 8]  "OXGBSTAT"
//! version  u16
//! count    u16
//! count × { id: u16, len: u32, payload: [u8; len] }
//! crc32    u32      over every preceding byte
//! ```

use gb_core::{Engine, RtcState, StateError};
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const STATE_MAGIC: &[u8; 8] = b"OXGBSTAT";
pub const STATE_VERSION: u16 = 1;

const HEADER_LEN: usize = 8 + 2 + 2;
const SECTION_HEADER_LEN: usize = 2 + 4;
const TRAILER_LEN: usize = 4;
const RTC_PAYLOAD_LEN: usize = 5 + 5 + 8;

/// Section identifier inside a state file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(pub u16);

impl SectionId {
    pub const SAVE_DATA: SectionId = SectionId(1);
    pub const RTC: SectionId = SectionId(2);

    pub fn name(self) -> Option<&'static str> {
        match self {
            SectionId::SAVE_DATA => Some("SAVE_DATA"),
            SectionId::RTC => Some("RTC"),
            _ => None,
        }
    }
}

/// The persisted subset of engine state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub save_data: Vec<u8>,
    pub rtc: RtcState,
}

impl StateSnapshot {
    /// Capture the persisted sections from a live engine
    pub fn capture<E: Engine + ?Sized>(engine: &E) -> Self {
        Self {
            save_data: engine.save_data().to_vec(),
            rtc: engine.rtc(),
        }
    }

    /// Serialize into the state file layout
    pub fn encode(&self) -> Vec<u8> {
        let rtc = encode_rtc(&self.rtc);
        let mut out = Vec::with_capacity(
            HEADER_LEN + 2 * SECTION_HEADER_LEN + self.save_data.len() + rtc.len() + TRAILER_LEN,
        );

        out.extend_from_slice(STATE_MAGIC);
        out.extend_from_slice(&STATE_VERSION.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        write_section(&mut out, SectionId::SAVE_DATA, &self.save_data);
        write_section(&mut out, SectionId::RTC, &rtc);

        let crc = checksum(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Parse a state file image, validating it completely
    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        if bytes.len() < HEADER_LEN + TRAILER_LEN {
            return Err(if bytes.starts_with(STATE_MAGIC) || bytes.len() < STATE_MAGIC.len() {
                StateError::Truncated
            } else {
                StateError::BadMagic
            });
        }
        if &bytes[..8] != STATE_MAGIC {
            return Err(StateError::BadMagic);
        }

        let (body, trailer) = bytes.split_at(bytes.len() - TRAILER_LEN);
        let stored = read_u32(trailer, 0);
        let computed = checksum(body);
        if stored != computed {
            return Err(StateError::ChecksumMismatch { stored, computed });
        }

        let version = read_u16(body, 8);
        if version != STATE_VERSION {
            return Err(StateError::UnsupportedVersion(version));
        }
        let count = read_u16(body, 10);

        let mut save_data = None;
        let mut rtc = None;
        let mut offset = HEADER_LEN;
        for _ in 0..count {
            if body.len() < offset + SECTION_HEADER_LEN {
                return Err(StateError::Truncated);
            }
            let id = SectionId(read_u16(body, offset));
            let len = read_u32(body, offset + 2) as usize;
            offset += SECTION_HEADER_LEN;
            let payload = body
                .get(offset..offset.saturating_add(len))
                .ok_or(StateError::Truncated)?;
            offset += len;

            match id {
                SectionId::SAVE_DATA => {
                    if save_data.replace(payload.to_vec()).is_some() {
                        return Err(StateError::DuplicateSection("SAVE_DATA"));
                    }
                }
                SectionId::RTC => {
                    if rtc.replace(decode_rtc(payload)?).is_some() {
                        return Err(StateError::DuplicateSection("RTC"));
                    }
                }
                SectionId(other) => return Err(StateError::UnknownSection(other)),
            }
        }
        if offset != body.len() {
            return Err(StateError::Truncated);
        }

        Ok(Self {
            save_data: save_data.ok_or(StateError::MissingSection("SAVE_DATA"))?,
            rtc: rtc.ok_or(StateError::MissingSection("RTC"))?,
        })
    }

    /// Write the sections into a live engine
    pub fn apply<E: Engine + ?Sized>(&self, engine: &mut E) -> Result<(), StateError> {
        let expected = engine.save_data().len();
        if self.save_data.len() != expected {
            return Err(StateError::SectionSize {
                section: "SAVE_DATA",
                expected,
                actual: self.save_data.len(),
            });
        }
        engine.load_save_data(&self.save_data);
        engine.restore_rtc(self.rtc);
        Ok(())
    }
}

/// Write the persisted sections of `engine` to a new or truncated file
pub fn save_state<E: Engine + ?Sized>(engine: &E, path: &Path) -> Result<(), StateError> {
    let bytes = StateSnapshot::capture(engine).encode();
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    tracing::info!("Saved state to {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Restore the persisted sections from `path` into `engine`
///
/// The file is fully decoded and checked against the engine before anything
/// is written, so a failed load leaves the engine untouched.
pub fn load_state<E: Engine + ?Sized>(engine: &mut E, path: &Path) -> Result<(), StateError> {
    let bytes = std::fs::read(path)?;
    let snapshot = StateSnapshot::decode(&bytes)?;
    snapshot.apply(engine)?;
    tracing::info!("Loaded state from {}", path.display());
    Ok(())
}

fn write_section(out: &mut Vec<u8>, id: SectionId, payload: &[u8]) {
    out.extend_from_slice(&id.0.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
}

fn encode_rtc(rtc: &RtcState) -> [u8; RTC_PAYLOAD_LEN] {
    let mut out = [0u8; RTC_PAYLOAD_LEN];
    out[..5].copy_from_slice(&rtc.registers);
    out[5..10].copy_from_slice(&rtc.latched);
    out[10..].copy_from_slice(&rtc.last_update_unix.to_le_bytes());
    out
}

fn decode_rtc(payload: &[u8]) -> Result<RtcState, StateError> {
    if payload.len() != RTC_PAYLOAD_LEN {
        return Err(StateError::SectionSize {
            section: "RTC",
            expected: RTC_PAYLOAD_LEN,
            actual: payload.len(),
        });
    }
    let mut rtc = RtcState::default();
    rtc.registers.copy_from_slice(&payload[..5]);
    rtc.latched.copy_from_slice(&payload[5..10]);
    let mut unix = [0u8; 8];
    unix.copy_from_slice(&payload[10..]);
    rtc.last_update_unix = i64::from_le_bytes(unix);
    Ok(rtc)
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(bytes);
    crc.sum()
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
