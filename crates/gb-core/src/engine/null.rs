//! Reference engine
//!
//! A deterministic software engine implementing the full [`Engine`] contract
//! without emulating any CPU. It validates cartridge headers the way real
//! hardware boot ROMs do, keeps battery RAM and an MBC3 clock, draws a test
//! pattern and synthesises a square wave at the nominal audio rate. Headless
//! hosts and the test suites drive sessions with it.

use super::{
    AudioStreamCallback, DeviceFamily, Engine, Enhancements, LogCallback, RtcState,
    RumbleCallback, SampleSource, GB_HEADER_END,
};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::host::VideoTarget;
use crate::logging::EngineLogLevel;
use std::collections::VecDeque;
use std::path::Path;

const GB_FREQUENCY: u32 = 0x40_0000;
const GB_FRAME_CYCLES: u32 = 70_224;
const GBA_FREQUENCY: u32 = 0x100_0000;
const GBA_FRAME_CYCLES: u32 = 280_896;

/// Picture size with Super Game Boy borders
const SGB_VIDEO_SIZE: (u32, u32) = (256, 224);

const GBA_HEADER_END: usize = 0xC0;
const GBA_FIXED_OFFSET: usize = 0xB2;
const GBA_FIXED_VALUE: u8 = 0x96;
const GBA_SRAM_SIZE: usize = 0x8000;

const CGB_FLAG_OFFSET: usize = 0x143;
const SGB_FLAG_OFFSET: usize = 0x146;
const CART_TYPE_OFFSET: usize = 0x147;
const RAM_SIZE_OFFSET: usize = 0x149;
const OLD_LICENSEE_OFFSET: usize = 0x14B;
const HEADER_CHECKSUM_OFFSET: usize = 0x14D;

const DEFAULT_BUFFER_FRAMES: usize = 2048;
const SQUARE_AMPLITUDE: i16 = 0x0800;

/// Header checksum over 0x134..0x14D
pub fn header_checksum(rom: &[u8]) -> u8 {
    rom[0x134..HEADER_CHECKSUM_OFFSET]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1))
}

/// Cartridge hardware described by the header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CartInfo {
    ram_size: usize,
    has_battery: bool,
    has_rtc: bool,
    has_rumble: bool,
}

fn gb_cart_info(rom: &[u8]) -> Result<CartInfo, EngineError> {
    let cart_type = rom[CART_TYPE_OFFSET];
    let known = matches!(
        cart_type,
        0x00..=0x03 | 0x05 | 0x06 | 0x08 | 0x09 | 0x0F..=0x13 | 0x19..=0x1E
    );
    if !known {
        return Err(EngineError::UnrecognizedFormat);
    }

    let ram_size = match cart_type {
        // MBC2 has 512 half-bytes built in
        0x05 | 0x06 => 0x200,
        _ => match rom[RAM_SIZE_OFFSET] {
            1 => 0x800,
            2 => 0x2000,
            3 => 0x8000,
            4 => 0x20000,
            5 => 0x10000,
            _ => 0,
        },
    };

    Ok(CartInfo {
        ram_size,
        has_battery: matches!(cart_type, 0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E),
        has_rtc: matches!(cart_type, 0x0F | 0x10),
        has_rumble: matches!(cart_type, 0x1C..=0x1E),
    })
}

/// Sample ring filled by [`NullEngine::run_frame`]
#[derive(Debug)]
pub struct NullAudio {
    ring: VecDeque<[i16; 2]>,
    buffer_size: usize,
    phase: u32,
    dropped: u64,
}

impl NullAudio {
    fn new() -> Self {
        Self {
            ring: VecDeque::with_capacity(DEFAULT_BUFFER_FRAMES),
            buffer_size: DEFAULT_BUFFER_FRAMES,
            phase: 0,
            dropped: 0,
        }
    }

    fn push_frame(&mut self) {
        let level = if (self.phase / 64) % 2 == 0 {
            SQUARE_AMPLITUDE
        } else {
            -SQUARE_AMPLITUDE
        };
        self.phase = self.phase.wrapping_add(1);

        if self.ring.len() >= self.buffer_size {
            self.dropped += 1;
            return;
        }
        self.ring.push_back([level, level / 2]);
    }

    /// Frames discarded because the ring was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn clear(&mut self) {
        self.ring.clear();
        self.phase = 0;
    }
}

impl SampleSource for NullAudio {
    fn available_samples(&self) -> usize {
        self.ring.len()
    }

    fn read_samples(&mut self, out: &mut [i16], frames: usize) -> usize {
        let count = frames.min(self.ring.len()).min(out.len() / 2);
        for (i, frame) in self.ring.drain(..count).enumerate() {
            out[2 * i] = frame[0];
            out[2 * i + 1] = frame[1];
        }
        count
    }

    fn set_buffer_size(&mut self, frames: usize) {
        self.buffer_size = frames.max(1);
        while self.ring.len() > self.buffer_size {
            self.ring.pop_front();
            self.dropped += 1;
        }
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

/// Deterministic engine for headless use and tests
pub struct NullEngine {
    family: DeviceFamily,
    config: EngineConfig,
    rom: Option<Vec<u8>>,
    cart: CartInfo,
    video: Option<VideoTarget>,
    keys: u32,
    audio: NullAudio,
    sample_rate: u32,
    sample_carry: u64,
    stream: Option<AudioStreamCallback>,
    logger: Option<LogCallback>,
    rumble: Option<RumbleCallback>,
    save_data: Vec<u8>,
    save_dirty: bool,
    rtc: RtcState,
    frame_counter: u64,
}

impl NullEngine {
    pub fn new(family: DeviceFamily) -> Self {
        Self {
            family,
            config: EngineConfig::default(),
            rom: None,
            cart: CartInfo::default(),
            video: None,
            keys: 0,
            audio: NullAudio::new(),
            sample_rate: 32768,
            sample_carry: 0,
            stream: None,
            logger: None,
            rumble: None,
            save_data: Vec::new(),
            save_dirty: false,
            rtc: RtcState::default(),
            frame_counter: 0,
        }
    }

    pub fn game_boy() -> Self {
        Self::new(DeviceFamily::GameBoy)
    }

    pub fn game_boy_advance() -> Self {
        Self::new(DeviceFamily::GameBoyAdvance)
    }

    pub fn is_video_bound(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_rtc(&self) -> bool {
        self.cart.has_rtc
    }

    pub fn has_battery(&self) -> bool {
        self.cart.has_battery
    }

    pub fn has_rumble(&self) -> bool {
        self.cart.has_rumble
    }

    /// Emulate a cartridge write into battery RAM
    pub fn write_save_data(&mut self, offset: usize, bytes: &[u8]) {
        let end = (offset + bytes.len()).min(self.save_data.len());
        if offset >= end {
            return;
        }
        self.save_data[offset..end].copy_from_slice(&bytes[..end - offset]);
        self.save_dirty = true;
    }

    /// Emit a record through the registered logger
    pub fn emit_log(&self, category: &str, level: EngineLogLevel, message: &str) {
        if let Some(logger) = self.logger {
            logger(category, level, message);
        }
    }

    /// Drive the rumble motor through the registered callback
    pub fn emit_rumble(&self, strong: u16, weak: u16) {
        if let Some(rumble) = self.rumble {
            rumble(0, strong, weak);
        }
    }

    pub fn null_audio(&self) -> &NullAudio {
        &self.audio
    }

    fn validate_gb(rom: &[u8]) -> Result<CartInfo, EngineError> {
        if rom.len() < GB_HEADER_END {
            return Err(EngineError::RomTooSmall(rom.len()));
        }
        let computed = header_checksum(rom);
        let stored = rom[HEADER_CHECKSUM_OFFSET];
        if stored != computed {
            return Err(EngineError::BadHeaderChecksum { stored, computed });
        }
        gb_cart_info(rom)
    }

    fn validate_gba(rom: &[u8]) -> Result<CartInfo, EngineError> {
        if rom.len() < GBA_HEADER_END {
            return Err(EngineError::RomTooSmall(rom.len()));
        }
        if rom[GBA_FIXED_OFFSET] != GBA_FIXED_VALUE {
            return Err(EngineError::UnrecognizedFormat);
        }
        Ok(CartInfo {
            ram_size: GBA_SRAM_SIZE,
            has_battery: true,
            ..CartInfo::default()
        })
    }

    fn generate_audio(&mut self) {
        self.sample_carry += self.sample_rate as u64 * self.frame_cycles() as u64;
        let frames = self.sample_carry / self.frequency() as u64;
        self.sample_carry %= self.frequency() as u64;

        for _ in 0..frames {
            self.audio.push_frame();
            if let Some(stream) = self.stream {
                if self.audio.available_samples() >= self.audio.buffer_size() {
                    stream(&mut self.audio);
                }
            }
        }
    }

    fn draw(&self) {
        let Some(video) = &self.video else {
            return;
        };
        let (width, height) = self.current_video_size();
        let mut fb = video.lock();
        let fb_width = fb.width() as usize;
        let width = (width as usize).min(fb_width);
        let height = (height as usize).min(fb.height() as usize);
        let frame = self.frame_counter as usize;
        let palette = self.config.palette;
        let pixels = fb.pixels_mut();

        for y in 0..height {
            for x in 0..width {
                let shade = (x / 8 + y / 8 + frame) % 4;
                pixels[y * fb_width + x] = palette[shade];
            }
        }
    }

    fn tick_rtc(&mut self) {
        if !self.cart.has_rtc || self.frame_counter % 60 != 0 {
            return;
        }
        let regs = &mut self.rtc.registers;
        // Registers keep their hardware widths, so out-of-range values count up to the
        // field maximum and wrap without carrying
        if !step_rtc_field(&mut regs[0], 60, 0x3F)
            || !step_rtc_field(&mut regs[1], 60, 0x3F)
            || !step_rtc_field(&mut regs[2], 24, 0x1F)
        {
            return;
        }
        let (day, carry) = regs[3].overflowing_add(1);
        regs[3] = day;
        if carry {
            if regs[4] & 0x01 != 0 {
                regs[4] = (regs[4] & !0x01) | RTC_DAY_OVERFLOW;
            } else {
                regs[4] |= 0x01;
            }
        }
    }
}

/// Day counter overflow flag in the day-high register
const RTC_DAY_OVERFLOW: u8 = 0x80;

/// Advance one clock field; returns whether it carried into the next one
fn step_rtc_field(reg: &mut u8, limit: u8, mask: u8) -> bool {
    *reg = reg.wrapping_add(1) & mask;
    if *reg == limit {
        *reg = 0;
        true
    } else {
        false
    }
}

impl Engine for NullEngine {
    fn family(&self) -> DeviceFamily {
        self.family
    }

    fn base_video_size(&self) -> (u32, u32) {
        match self.family {
            DeviceFamily::GameBoy => SGB_VIDEO_SIZE,
            DeviceFamily::GameBoyAdvance => self.family.lcd_size(),
        }
    }

    fn current_video_size(&self) -> (u32, u32) {
        if self.family == DeviceFamily::GameBoy
            && self.config.model.is_super_game_boy()
            && self.config.show_sgb_borders
        {
            SGB_VIDEO_SIZE
        } else {
            self.family.lcd_size()
        }
    }

    fn bind_video(&mut self, target: Option<VideoTarget>) {
        self.video = target;
    }

    fn load_rom(&mut self, path: &Path) -> Result<(), EngineError> {
        let rom = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EngineError::RomNotFound,
            _ => EngineError::Read(e.to_string()),
        })?;

        let cart = match self.family {
            DeviceFamily::GameBoy => Self::validate_gb(&rom)?,
            DeviceFamily::GameBoyAdvance => Self::validate_gba(&rom)?,
        };

        self.cart = cart;
        self.save_data = vec![0; cart.ram_size];
        self.save_dirty = false;
        self.rtc = RtcState::default();
        self.rom = Some(rom);
        self.emit_log(
            "Cartridge",
            EngineLogLevel::Info,
            &format!("loaded {} bytes from {}", self.rom.as_ref().map_or(0, Vec::len), path.display()),
        );
        Ok(())
    }

    fn rom(&self) -> Option<&[u8]> {
        self.rom.as_deref()
    }

    fn classify_rom(&self, rom: &[u8]) -> Enhancements {
        let mut enhancements = Enhancements::empty();
        if self.family != DeviceFamily::GameBoy || rom.len() < GB_HEADER_END {
            return enhancements;
        }

        match rom[CGB_FLAG_OFFSET] {
            0xC0 => enhancements |= Enhancements::COLOR | Enhancements::COLOR_ONLY,
            0x80 => enhancements |= Enhancements::COLOR,
            _ => {}
        }
        if rom[SGB_FLAG_OFFSET] == 0x03 && rom[OLD_LICENSEE_OFFSET] == 0x33 {
            enhancements |= Enhancements::SUPER_GAME_BOY;
        }
        enhancements
    }

    fn apply_config(&mut self, config: &EngineConfig) {
        self.config = *config;
    }

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn reset(&mut self) {
        self.frame_counter = 0;
        self.sample_carry = 0;
        self.audio.clear();
    }

    fn run_frame(&mut self) {
        self.frame_counter += 1;
        self.draw();
        self.generate_audio();
        self.tick_rtc();
    }

    fn set_keys(&mut self, keys: u32) {
        self.keys = keys;
    }

    fn add_keys(&mut self, keys: u32) {
        self.keys |= keys;
    }

    fn clear_keys(&mut self, keys: u32) {
        self.keys &= !keys;
    }

    fn keys(&self) -> u32 {
        self.keys
    }

    fn frequency(&self) -> u32 {
        match self.family {
            DeviceFamily::GameBoy => GB_FREQUENCY,
            DeviceFamily::GameBoyAdvance => GBA_FREQUENCY,
        }
    }

    fn frame_cycles(&self) -> u32 {
        match self.family {
            DeviceFamily::GameBoy => GB_FRAME_CYCLES,
            DeviceFamily::GameBoyAdvance => GBA_FRAME_CYCLES,
        }
    }

    fn set_sample_rate(&mut self, rate: u32) {
        self.sample_rate = rate;
    }

    fn audio(&mut self) -> &mut dyn SampleSource {
        &mut self.audio
    }

    fn set_audio_stream(&mut self, stream: Option<AudioStreamCallback>) {
        self.stream = stream;
    }

    fn set_logger(&mut self, logger: Option<LogCallback>) {
        self.logger = logger;
    }

    fn set_rumble(&mut self, rumble: Option<RumbleCallback>) {
        self.rumble = rumble;
    }

    fn save_data(&self) -> &[u8] {
        &self.save_data
    }

    fn load_save_data(&mut self, data: &[u8]) {
        let len = data.len().min(self.save_data.len());
        self.save_data[..len].copy_from_slice(&data[..len]);
        self.save_data[len..].fill(0);
        self.save_dirty = false;
    }

    fn take_save_dirty(&mut self) -> bool {
        std::mem::take(&mut self.save_dirty)
    }

    fn rtc(&self) -> RtcState {
        self.rtc
    }

    fn restore_rtc(&mut self, rtc: RtcState) {
        self.rtc = rtc;
    }

    fn frame_counter(&self) -> u64 {
        self.frame_counter
    }
}

/// Builds minimal, header-valid Game Boy ROM images
#[derive(Debug, Clone)]
pub struct RomBuilder {
    title: String,
    cart_type: u8,
    ram_code: u8,
    cgb_flag: u8,
    super_game_boy: bool,
    banks: usize,
}

impl RomBuilder {
    /// MBC3 with timer, RAM and battery; 32 KiB of RAM
    pub fn new() -> Self {
        Self {
            title: "TEST".to_string(),
            cart_type: 0x10,
            ram_code: 3,
            cgb_flag: 0x00,
            super_game_boy: false,
            banks: 2,
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn cartridge_type(mut self, cart_type: u8, ram_code: u8) -> Self {
        self.cart_type = cart_type;
        self.ram_code = ram_code;
        self
    }

    /// 0x80 for Color-enhanced, 0xC0 for Color-only
    pub fn color(mut self, cgb_flag: u8) -> Self {
        self.cgb_flag = cgb_flag;
        self
    }

    pub fn super_game_boy(mut self, enabled: bool) -> Self {
        self.super_game_boy = enabled;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut rom = vec![0u8; self.banks * 0x4000];
        for (i, b) in self.title.bytes().take(11).enumerate() {
            rom[0x134 + i] = b;
        }
        rom[CGB_FLAG_OFFSET] = self.cgb_flag;
        if self.super_game_boy {
            rom[SGB_FLAG_OFFSET] = 0x03;
            rom[OLD_LICENSEE_OFFSET] = 0x33;
        }
        rom[CART_TYPE_OFFSET] = self.cart_type;
        rom[RAM_SIZE_OFFSET] = self.ram_code;
        rom[HEADER_CHECKSUM_OFFSET] = header_checksum(&rom);
        rom
    }
}

impl Default for RomBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal Game Boy Advance image with a valid fixed header byte
pub fn build_gba_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x200];
    rom[GBA_FIXED_OFFSET] = GBA_FIXED_VALUE;
    rom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GbModel;
    use crate::host::{FramebufferAllocator, HeapAllocator, PixelFormat};

    fn loaded(rom: &[u8]) -> (NullEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.gb");
        std::fs::write(&path, rom).unwrap();
        let mut engine = NullEngine::game_boy();
        engine.load_rom(&path).unwrap();
        (engine, dir)
    }

    #[test]
    fn test_missing_rom() {
        let mut engine = NullEngine::game_boy();
        let err = engine.load_rom(Path::new("/nonexistent/game.gb")).unwrap_err();
        assert_eq!(err, EngineError::RomNotFound);
        assert!(engine.rom().is_none());
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let mut rom = RomBuilder::new().build();
        rom[HEADER_CHECKSUM_OFFSET] ^= 0xFF;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.gb");
        std::fs::write(&path, &rom).unwrap();

        let mut engine = NullEngine::game_boy();
        assert!(matches!(
            engine.load_rom(&path),
            Err(EngineError::BadHeaderChecksum { .. })
        ));
    }

    #[test]
    fn test_rejects_short_rom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.gb");
        std::fs::write(&path, [0u8; 0x100]).unwrap();

        let mut engine = NullEngine::game_boy();
        assert_eq!(engine.load_rom(&path), Err(EngineError::RomTooSmall(0x100)));
    }

    #[test]
    fn test_cart_info_from_header() {
        let (engine, _dir) = loaded(&RomBuilder::new().build());
        assert_eq!(engine.save_data().len(), 0x8000);
        assert!(engine.has_rtc());

        let (engine, _dir) = loaded(&RomBuilder::new().cartridge_type(0x06, 0).build());
        assert_eq!(engine.save_data().len(), 0x200);
        assert!(!engine.has_rtc());
    }

    #[test]
    fn test_classification() {
        let engine = NullEngine::game_boy();
        let rom = RomBuilder::new().color(0x80).super_game_boy(true).build();
        assert_eq!(
            engine.classify_rom(&rom),
            Enhancements::COLOR | Enhancements::SUPER_GAME_BOY
        );

        let rom = RomBuilder::new().color(0xC0).build();
        assert_eq!(
            engine.classify_rom(&rom),
            Enhancements::COLOR | Enhancements::COLOR_ONLY
        );

        assert!(engine.classify_rom(&[0u8; 16]).is_empty());
    }

    #[test]
    fn test_audio_rate_matches_clock_ratio() {
        let (mut engine, _dir) = loaded(&RomBuilder::new().build());
        engine.audio().set_buffer_size(8192);
        for _ in 0..8 {
            engine.run_frame();
        }
        // 32768 * 70224 / 4194304 = 548.625 samples per frame
        assert_eq!(engine.audio().available_samples(), 4389);
    }

    #[test]
    fn test_audio_ring_drops_when_full() {
        let (mut engine, _dir) = loaded(&RomBuilder::new().build());
        engine.audio().set_buffer_size(100);
        engine.run_frame();
        assert_eq!(engine.audio().available_samples(), 100);
        assert_eq!(engine.null_audio().dropped(), 448);
    }

    #[test]
    fn test_sgb_borders_change_video_size() {
        let mut engine = NullEngine::game_boy();
        assert_eq!(engine.current_video_size(), (160, 144));

        let mut config = EngineConfig::default();
        config.model = GbModel::Sgb;
        config.show_sgb_borders = true;
        engine.apply_config(&config);
        assert_eq!(engine.current_video_size(), (256, 224));

        config.show_sgb_borders = false;
        engine.apply_config(&config);
        assert_eq!(engine.current_video_size(), (160, 144));
    }

    #[test]
    fn test_draws_into_bound_target() {
        let (mut engine, _dir) = loaded(&RomBuilder::new().build());
        let target = HeapAllocator.allocate(256, 224, PixelFormat::Xrgb8888);
        engine.bind_video(Some(target.clone()));
        engine.run_frame();

        let fb = target.lock();
        assert_eq!(fb.pixels()[0], engine.config().palette[1]);
        // Outside the 160x144 picture stays untouched
        assert_eq!(fb.pixels()[200], 0);
    }

    #[test]
    fn test_save_data_load_and_dirty() {
        let (mut engine, _dir) = loaded(&RomBuilder::new().build());
        engine.write_save_data(0, &[1, 2, 3]);
        assert!(engine.take_save_dirty());
        assert!(!engine.take_save_dirty());

        engine.load_save_data(&[9, 9]);
        assert_eq!(&engine.save_data()[..3], &[9, 9, 0]);
        assert!(!engine.take_save_dirty());
    }

    #[test]
    fn test_rtc_ticks_each_second() {
        let (mut engine, _dir) = loaded(&RomBuilder::new().build());
        for _ in 0..120 {
            engine.run_frame();
        }
        assert_eq!(engine.rtc().registers[0], 2);
    }

    #[test]
    fn test_rtc_carries_into_day_overflow() {
        let (mut engine, _dir) = loaded(&RomBuilder::new().build());
        engine.restore_rtc(RtcState {
            registers: [59, 59, 23, 255, 0x01],
            ..RtcState::default()
        });
        for _ in 0..60 {
            engine.run_frame();
        }
        assert_eq!(engine.rtc().registers, [0, 0, 0, 0, RTC_DAY_OVERFLOW]);
    }

    #[test]
    fn test_rtc_out_of_range_values_wrap() {
        let (mut engine, _dir) = loaded(&RomBuilder::new().build());
        engine.restore_rtc(RtcState {
            registers: [255, 62, 31, 0, 0],
            ..RtcState::default()
        });
        for _ in 0..60 {
            engine.run_frame();
        }
        // 255 wraps to 0 in the 6-bit seconds field without touching minutes
        assert_eq!(engine.rtc().registers, [0, 62, 31, 0, 0]);
    }

    #[test]
    fn test_gba_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.gba");
        std::fs::write(&path, build_gba_rom()).unwrap();
        let mut engine = NullEngine::game_boy_advance();
        engine.load_rom(&path).unwrap();
        assert_eq!(engine.current_video_size(), (240, 160));
        assert_eq!(engine.save_data().len(), GBA_SRAM_SIZE);

        std::fs::write(&path, vec![0u8; 0x200]).unwrap();
        assert_eq!(engine.load_rom(&path), Err(EngineError::UnrecognizedFormat));
    }
}
