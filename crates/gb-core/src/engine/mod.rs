//! Emulation engine contract
//!
//! The adapter treats the engine as a black box. Everything it needs from
//! CPU/PPU/APU simulation goes through the [`Engine`] trait: video geometry,
//! ROM loading, frame stepping, key state, audio samples, battery RAM and the
//! cartridge real-time clock.
//!
//! Logging, rumble and push-style audio are registered as plain function
//! pointers. They carry no per-instance context, so whoever registers them
//! must route the calls to the right receiver on its own.

pub mod null;

pub use null::NullEngine;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::host::VideoTarget;
use crate::logging::EngineLogLevel;
use bitflags::bitflags;
use std::path::Path;

/// Size of the Game Boy cartridge header including the metadata block
pub const GB_HEADER_END: usize = 0x150;

/// Class of hardware sharing one button contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    /// Game Boy, Game Boy Color, Super Game Boy
    GameBoy,
    /// Game Boy Advance
    GameBoyAdvance,
}

impl DeviceFamily {
    /// Native LCD resolution
    pub fn lcd_size(self) -> (u32, u32) {
        match self {
            Self::GameBoy => (160, 144),
            Self::GameBoyAdvance => (240, 160),
        }
    }

    /// Number of logical buttons in the host contract
    pub fn button_count(self) -> usize {
        match self {
            Self::GameBoy => 8,
            Self::GameBoyAdvance => 10,
        }
    }
}

bitflags! {
    /// Hardware enhancements a cartridge advertises
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Enhancements: u8 {
        /// Uses Game Boy Color features
        const COLOR          = 0x01;
        /// Refuses to run on monochrome hardware
        const COLOR_ONLY     = 0x02;
        /// Uses Super Game Boy features
        const SUPER_GAME_BOY = 0x04;
    }
}

/// MBC3 real-time clock registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtcState {
    /// Seconds, minutes, hours, day low, day high/flags
    pub registers: [u8; 5],
    /// Values captured by the last latch
    pub latched: [u8; 5],
    /// Host time of the last register update
    pub last_update_unix: i64,
}

/// Context-free logger registration
pub type LogCallback = fn(category: &str, level: EngineLogLevel, message: &str);

/// Context-free rumble registration
pub type RumbleCallback = fn(channel: u32, strong: u16, weak: u16);

/// Context-free push-style audio registration
///
/// Invoked whenever the engine has buffered one full quantum.
pub type AudioStreamCallback = fn(source: &mut dyn SampleSource);

/// Stereo sample ring the engine fills while running
pub trait SampleSource {
    /// Interleaved channel count
    fn channels(&self) -> usize {
        2
    }

    /// Frames (samples per channel) ready to be read
    fn available_samples(&self) -> usize;

    /// Read up to `frames` frames into `out` (interleaved) and return how many were read
    fn read_samples(&mut self, out: &mut [i16], frames: usize) -> usize;

    /// Resize the engine-side buffer, in frames
    fn set_buffer_size(&mut self, frames: usize);

    fn buffer_size(&self) -> usize;
}

/// The emulation core driven by a session
pub trait Engine {
    fn family(&self) -> DeviceFamily;

    /// Largest picture the engine can produce; framebuffers are allocated at this size
    fn base_video_size(&self) -> (u32, u32);

    /// Size of the picture the next frame will produce
    fn current_video_size(&self) -> (u32, u32);

    /// Attach or detach the framebuffer frames are rendered into
    fn bind_video(&mut self, target: Option<VideoTarget>);

    fn load_rom(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Bytes of the loaded ROM
    fn rom(&self) -> Option<&[u8]>;

    /// Enhancements the engine reads out of a ROM header
    fn classify_rom(&self, rom: &[u8]) -> Enhancements;

    fn apply_config(&mut self, config: &EngineConfig);

    fn config(&self) -> &EngineConfig;

    /// Return to power-on state
    fn reset(&mut self);

    /// Advance one video frame
    fn run_frame(&mut self);

    fn set_keys(&mut self, keys: u32);

    fn add_keys(&mut self, keys: u32);

    fn clear_keys(&mut self, keys: u32);

    fn keys(&self) -> u32;

    /// Master clock in Hz
    fn frequency(&self) -> u32;

    /// Master clock cycles per video frame
    fn frame_cycles(&self) -> u32;

    /// Rate samples are resampled to before they reach the sample source
    fn set_sample_rate(&mut self, rate: u32);

    fn audio(&mut self) -> &mut dyn SampleSource;

    fn set_audio_stream(&mut self, stream: Option<AudioStreamCallback>);

    fn set_logger(&mut self, logger: Option<LogCallback>);

    fn set_rumble(&mut self, rumble: Option<RumbleCallback>);

    /// Battery-backed cartridge RAM
    fn save_data(&self) -> &[u8];

    /// Replace battery RAM; shorter images are zero-extended, longer ones truncated
    fn load_save_data(&mut self, data: &[u8]);

    /// Whether battery RAM changed since the last call
    fn take_save_dirty(&mut self) -> bool;

    fn rtc(&self) -> RtcState;

    fn restore_rtc(&mut self, rtc: RtcState);

    /// Frames run since the last reset
    fn frame_counter(&self) -> u64;
}
