//! Shared fixtures for session tests

#![allow(dead_code)]

use gb_core::host::{AudioSink, HeapAllocator, HostLogger, HostSinks, RumbleSink};
use gb_core::logging::HostLogLevel;
use gb_core::{Config, NullEngine};
use gb_integration::Session;
use parking_lot::{Mutex, MutexGuard};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Only one session may exist per process, so tests that build one take turns
static SESSION_LOCK: Mutex<()> = parking_lot::const_mutex(());

pub fn serial() -> MutexGuard<'static, ()> {
    SESSION_LOCK.lock()
}

/// Everything the host sinks received
#[derive(Clone, Default)]
pub struct Recorder {
    pub audio: Arc<Mutex<Vec<usize>>>,
    pub logs: Arc<Mutex<Vec<(HostLogLevel, String)>>>,
    pub rumble: Arc<Mutex<Vec<(u32, u16, u16)>>>,
}

struct AudioRecorder(Arc<Mutex<Vec<usize>>>);

impl AudioSink for AudioRecorder {
    fn play_samples(&mut self, samples: &[i16]) {
        self.0.lock().push(samples.len());
    }
}

struct LogRecorder(Arc<Mutex<Vec<(HostLogLevel, String)>>>);

impl HostLogger for LogRecorder {
    fn log(&mut self, level: HostLogLevel, message: &str) {
        self.0.lock().push((level, message.to_string()));
    }
}

struct RumbleRecorder(Arc<Mutex<Vec<(u32, u16, u16)>>>);

impl RumbleSink for RumbleRecorder {
    fn rumble(&mut self, channel: u32, strong: u16, weak: u16) {
        self.0.lock().push((channel, strong, weak));
    }
}

impl Recorder {
    pub fn sinks(&self) -> HostSinks {
        HostSinks {
            video: Box::new(HeapAllocator),
            audio: Box::new(AudioRecorder(self.audio.clone())),
            logger: Box::new(LogRecorder(self.logs.clone())),
            rumble: Box::new(RumbleRecorder(self.rumble.clone())),
        }
    }
}

/// A ROM on disk next to a (not yet existing) save file
pub struct Fixture {
    pub dir: TempDir,
    pub rom: PathBuf,
    pub save: PathBuf,
}

impl Fixture {
    pub fn new(name: &str, rom: &[u8]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let rom_path = dir.path().join(name);
        std::fs::write(&rom_path, rom).unwrap();
        let save = rom_path.with_extension("sav");
        Self {
            dir,
            rom: rom_path,
            save,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

pub fn session(engine: NullEngine, recorder: &Recorder, config: Config) -> Session<NullEngine> {
    Session::new(engine, recorder.sinks(), config).unwrap()
}

/// A Game Boy session loaded from `fixture` and running
pub fn running(fixture: &Fixture, recorder: &Recorder, config: Config) -> Session<NullEngine> {
    let mut session = session(NullEngine::game_boy(), recorder, config);
    session.load(&[&fixture.rom], &fixture.save).unwrap();
    session.start();
    session
}
