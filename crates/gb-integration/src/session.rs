//! Session lifecycle
//!
//! A [`Session`] is the only object the host talks to. It owns the engine,
//! walks it through `Constructed -> Loaded -> Running -> Stopped`, resolves
//! the hardware model on load, feeds input, paces audio and routes state
//! requests to the state store. Calls made in the wrong lifecycle state are
//! programming errors and panic.

use crate::active::{self, ActiveSlot, SessionOutputs, SharedOutputs};
use crate::state_store;
use gb_audio::{AudioPacer, DeliveryMode, PacerStats};
use gb_core::config::{Config, EngineConfig};
use gb_core::host::{FramebufferAllocator, HostSinks, PixelFormat, Rect, VideoTarget};
use gb_core::{CoreError, DeviceFamily, Engine, GbModel, InputModel, ModelPreference, Result, StateError};
use gb_input::{InputMapper, InputSnapshot};
use gb_loader::{CompatDatabase, ModelResolver, Resolution};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Engine initialized, nothing loaded
    Constructed,
    /// ROM loaded and engine reset
    Loaded,
    /// Frames may be run
    Running,
    /// Video released; a new load may follow
    Stopped,
}

/// The single live adapter instance
pub struct Session<E: Engine> {
    engine: E,
    state: SessionState,
    config: Config,
    engine_config: EngineConfig,
    allocator: Box<dyn FramebufferAllocator>,
    video: Option<VideoTarget>,
    screen_rect: Rect,
    mapper: InputMapper,
    resolver: ModelResolver,
    resolution: Option<Resolution>,
    rom_path: Option<PathBuf>,
    save_path: Option<PathBuf>,
    outputs: SharedOutputs,
    // Released last so engine callbacks stay routable until the engine is gone
    _slot: ActiveSlot,
}

impl<E: Engine> Session<E> {
    /// Create the session, claiming the process-wide active slot
    ///
    /// Fails with [`CoreError::Config`] on unusable settings. Panics if
    /// another session is alive.
    pub fn new(mut engine: E, sinks: HostSinks, config: Config) -> Result<Self> {
        config.validate()?;
        let engine_config = EngineConfig::from_config(&config)?;
        let family = engine.family();
        let HostSinks {
            video,
            audio,
            logger,
            rumble,
        } = sinks;

        let mode = DeliveryMode::for_family(family, &config.audio);
        let nominal = config.audio.sample_rate as f64 * engine.frame_cycles() as f64
            / engine.frequency() as f64;
        let outputs = Arc::new(Mutex::new(SessionOutputs {
            audio,
            logger,
            rumble,
            pacer: AudioPacer::new(mode, &config.audio, nominal),
        }));
        let slot = ActiveSlot::claim(&outputs);

        engine.set_logger(Some(active::route_log));
        engine.set_rumble(Some(active::route_rumble));
        engine.set_sample_rate(config.audio.sample_rate);
        outputs.lock().pacer.prepare(engine.audio());
        if let DeliveryMode::Push { .. } = mode {
            engine.set_audio_stream(Some(active::route_audio_stream));
        }

        engine.apply_config(&engine_config);

        let resolver = ModelResolver::new(config.model.preference, load_database(&config));
        let mapper = InputMapper::new(family, config.input.model);

        tracing::info!(
            "Session created: {:?}, {:?} audio, {:?} input",
            family,
            mode,
            config.input.model
        );

        Ok(Self {
            engine,
            state: SessionState::Constructed,
            config,
            engine_config,
            allocator: video,
            video: None,
            screen_rect: Rect::default(),
            mapper,
            resolver,
            resolution: None,
            rom_path: None,
            save_path: None,
            outputs,
            _slot: slot,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn family(&self) -> DeviceFamily {
        self.engine.family()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Options applied to the engine at the last power-on
    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine_config
    }

    /// Model resolution performed by the last successful load
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn input_model(&self) -> InputModel {
        self.mapper.model()
    }

    pub fn video_target(&self) -> Option<&VideoTarget> {
        self.video.as_ref()
    }

    pub fn rom_path(&self) -> Option<&Path> {
        self.rom_path.as_deref()
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    pub fn audio_stats(&self) -> PacerStats {
        self.outputs.lock().pacer.stats()
    }

    /// Load a ROM and its battery save
    ///
    /// Exactly one ROM path is accepted. A missing save file is not an error.
    /// On failure the session stays in its pre-load state.
    pub fn load<P: AsRef<Path>>(&mut self, rom_paths: &[P], save_path: impl AsRef<Path>) -> Result<()> {
        assert!(
            matches!(self.state, SessionState::Constructed | SessionState::Stopped),
            "load called in state {:?}; stop the session first",
            self.state
        );
        assert_eq!(
            rom_paths.len(),
            1,
            "exactly one ROM path is supported, got {}",
            rom_paths.len()
        );
        let rom_path = rom_paths[0].as_ref();
        let save_path = save_path.as_ref();

        let (width, height) = self.engine.base_video_size();
        let video = self.allocator.allocate(width, height, PixelFormat::Xrgb8888);
        self.engine.bind_video(Some(video.clone()));

        if let Err(source) = self.engine.load_rom(rom_path) {
            self.engine.bind_video(None);
            tracing::error!("Couldn't load ROM {}: {}", rom_path.display(), source);
            return Err(CoreError::CouldntLoadRom {
                path: rom_path.to_path_buf(),
                source,
            });
        }
        self.video = Some(video);

        self.resolution = match self.engine.family() {
            DeviceFamily::GameBoy => {
                let resolution = self.resolver.resolve(&self.engine);
                self.engine_config.model = resolution.model;
                tracing::info!(
                    "Using model {} ({:?})",
                    resolution.model.name(),
                    resolution.source
                );
                Some(resolution)
            }
            DeviceFamily::GameBoyAdvance => None,
        };

        self.read_save_file(save_path);
        self.rom_path = Some(rom_path.to_path_buf());
        self.save_path = Some(save_path.to_path_buf());
        self.power_on();

        self.state = SessionState::Loaded;
        tracing::info!("Loaded {}", rom_path.display());
        Ok(())
    }

    /// Power on and begin running frames
    pub fn start(&mut self) {
        assert_eq!(
            self.state,
            SessionState::Loaded,
            "start called in state {:?}",
            self.state
        );
        self.power_on();
        self.state = SessionState::Running;
        tracing::info!("Session running");
    }

    /// Return a running session to power-on state
    pub fn reset(&mut self) {
        assert_eq!(
            self.state,
            SessionState::Running,
            "reset called in state {:?}",
            self.state
        );
        self.power_on();
        tracing::info!("Session reset");
    }

    /// Release the video target, flushing unsaved battery RAM first
    pub fn stop(&mut self) {
        assert!(
            matches!(self.state, SessionState::Loaded | SessionState::Running),
            "stop called in state {:?}",
            self.state
        );
        self.flush_save_data();
        self.engine.bind_video(None);
        self.video = None;
        self.screen_rect = Rect::default();
        self.state = SessionState::Stopped;
        tracing::info!("Session stopped");
    }

    /// Replace the whole key state with one host snapshot
    pub fn poll_input(&mut self, snapshot: InputSnapshot) {
        self.assert_loaded("poll_input");
        self.mapper.apply_snapshot(&mut self.engine, snapshot);
    }

    pub fn button_pressed(&mut self, button: usize) {
        self.assert_loaded("button_pressed");
        self.mapper.button_pressed(&mut self.engine, button);
    }

    pub fn button_released(&mut self, button: usize) {
        self.assert_loaded("button_released");
        self.mapper.button_released(&mut self.engine, button);
    }

    /// Advance one frame and forward the audio it produced
    pub fn run_frame(&mut self) {
        assert_eq!(
            self.state,
            SessionState::Running,
            "run_frame called in state {:?}",
            self.state
        );
        self.engine.run_frame();

        // Push-style audio re-enters through the active slot during
        // `Engine::run_frame`, so the outputs lock is only taken afterwards.
        let mut outputs = self.outputs.lock();
        let SessionOutputs { audio, pacer, .. } = &mut *outputs;
        pacer.tick(self.engine.audio(), audio.as_mut());
    }

    /// Reload battery RAM from `path` without touching anything else
    pub fn reload_save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.assert_loaded("reload_save");
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        self.engine.load_save_data(&data);
        tracing::info!("Reloaded save data from {}", path.display());
        Ok(())
    }

    /// Write battery RAM and clock state to `path`; `callback` always runs
    pub fn save_state<F>(&mut self, path: impl AsRef<Path>, callback: F)
    where
        F: FnOnce(std::result::Result<(), StateError>),
    {
        self.assert_loaded("save_state");
        let path = path.as_ref();
        let result = state_store::save_state(&self.engine, path);
        if let Err(e) = &result {
            tracing::warn!("Failed to save state to {}: {}", path.display(), e);
        }
        callback(result);
    }

    /// Restore battery RAM and clock state from `path`; `callback` always runs
    ///
    /// On failure the engine is left exactly as it was.
    pub fn load_state<F>(&mut self, path: impl AsRef<Path>, callback: F)
    where
        F: FnOnce(std::result::Result<(), StateError>),
    {
        self.assert_loaded("load_state");
        let path = path.as_ref();
        let result = state_store::load_state(&mut self.engine, path);
        match &result {
            Ok(()) => self.refresh_screen_area(),
            Err(e) => tracing::warn!("Failed to load state from {}: {}", path.display(), e),
        }
        callback(result);
    }

    /// Frames per second
    pub fn get_frame_rate(&self) -> f64 {
        self.engine.frequency() as f64 / self.engine.frame_cycles() as f64
    }

    /// Width over height of the current picture
    pub fn get_aspect_ratio(&self) -> f64 {
        let (width, height) = self.engine.current_video_size();
        width as f64 / height as f64
    }

    pub fn get_sample_rate(&self) -> f64 {
        self.config.audio.sample_rate as f64
    }

    /// Visible region inside the video target
    pub fn get_screen_rect(&self) -> Rect {
        self.screen_rect
    }

    /// Video target row stride in bytes
    pub fn get_row_stride(&self) -> usize {
        match &self.video {
            Some(video) => video.stride(),
            None => {
                let (width, _) = self.engine.base_video_size();
                width as usize * PixelFormat::Xrgb8888.bytes_per_pixel()
            }
        }
    }

    /// Capability set of this session's device family
    pub fn controls(&mut self) -> FamilyControls<'_, E> {
        match self.engine.family() {
            DeviceFamily::GameBoy => FamilyControls::GameBoy(GameBoyControls { session: self }),
            DeviceFamily::GameBoyAdvance => FamilyControls::GameBoyAdvance,
        }
    }

    /// Game Boy controls
    ///
    /// Panics on a Game Boy Advance session.
    pub fn game_boy_controls(&mut self) -> GameBoyControls<'_, E> {
        match self.controls() {
            FamilyControls::GameBoy(controls) => controls,
            FamilyControls::GameBoyAdvance => {
                panic!("Game Boy controls requested on a Game Boy Advance session")
            }
        }
    }

    fn assert_loaded(&self, operation: &str) {
        assert!(
            matches!(self.state, SessionState::Loaded | SessionState::Running),
            "{} called in state {:?}",
            operation,
            self.state
        );
    }

    fn power_on(&mut self) {
        self.engine.apply_config(&self.engine_config);
        self.engine.reset();
        self.refresh_screen_area();
    }

    fn refresh_screen_area(&mut self) {
        let (width, height) = self.engine.current_video_size();
        let rect = Rect::new(0, 0, width, height);
        if let Some(video) = &self.video {
            video.set_area(rect);
        }
        if rect != self.screen_rect {
            tracing::debug!("Screen area now {}x{}", width, height);
        }
        self.screen_rect = rect;
    }

    fn read_save_file(&mut self, path: &Path) {
        match std::fs::read(path) {
            Ok(data) => {
                self.engine.load_save_data(&data);
                tracing::info!("Loaded {} bytes of save data from {}", data.len(), path.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No save data at {}", path.display());
            }
            Err(e) => tracing::warn!("Failed to read save data {}: {}", path.display(), e),
        }
    }

    fn flush_save_data(&mut self) {
        if !self.engine.take_save_dirty() {
            return;
        }
        let Some(path) = &self.save_path else {
            return;
        };
        match std::fs::write(path, self.engine.save_data()) {
            Ok(()) => tracing::info!("Wrote save data to {}", path.display()),
            Err(e) => tracing::warn!("Failed to write save data {}: {}", path.display(), e),
        }
    }
}

impl<E: Engine> Drop for Session<E> {
    fn drop(&mut self) {
        if matches!(self.state, SessionState::Loaded | SessionState::Running) {
            self.flush_save_data();
        }
        self.engine.set_audio_stream(None);
        self.engine.set_logger(None);
        self.engine.set_rumble(None);
        self.engine.bind_video(None);
        tracing::info!("Session destroyed");
    }
}

/// Controls available for a session, tagged by device family
pub enum FamilyControls<'a, E: Engine> {
    GameBoy(GameBoyControls<'a, E>),
    GameBoyAdvance,
}

/// Model, palette and border controls of a Game Boy session
pub struct GameBoyControls<'a, E: Engine> {
    session: &'a mut Session<E>,
}

impl<E: Engine> GameBoyControls<'_, E> {
    /// Model the engine is configured for
    pub fn model(&self) -> GbModel {
        self.session.engine_config.model
    }

    pub fn model_preference(&self) -> ModelPreference {
        self.session.resolver.preference()
    }

    /// Takes effect on the next load
    pub fn set_model_preference(&mut self, preference: ModelPreference) {
        self.session.resolver.set_preference(preference);
        tracing::info!("Model preference set to {:?}", preference);
    }

    /// Set 4 or 12 colours for monochrome games
    ///
    /// Any other length is rejected and the current palette is kept.
    pub fn set_palette(&mut self, colors: &[u32]) -> Result<()> {
        self.session.engine_config.palette = EngineConfig::expand_palette(colors)?;
        self.apply();
        Ok(())
    }

    pub fn set_show_sgb_borders(&mut self, show: bool) {
        self.session.engine_config.show_sgb_borders = show;
        self.apply();
    }

    fn apply(&mut self) {
        let session = &mut *self.session;
        session.engine.apply_config(&session.engine_config);
        if session.video.is_some() {
            session.refresh_screen_area();
        }
    }
}

fn load_database(config: &Config) -> CompatDatabase {
    let Some(path) = &config.paths.compat_database else {
        return CompatDatabase::new();
    };
    CompatDatabase::load(path).unwrap_or_else(|e| {
        tracing::warn!("Ignoring compatibility database: {:#}", e);
        CompatDatabase::new()
    })
}
