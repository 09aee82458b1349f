//! Configuration system for the oxidized-gb adapter

use crate::error::{CoreError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of palette entries the engine consumes (background, sprite 0, sprite 1)
pub const PALETTE_ENTRIES: usize = 12;

/// Monochrome shades, lightest first
pub const DEFAULT_PALETTE: [u32; 4] = [0xF8F8F8, 0xA8A8A8, 0x505050, 0x000000];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub input: InputConfig,
    pub paths: PathConfig,
    pub debug: DebugConfig,
}

/// Concrete Game Boy hardware variant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GbModel {
    /// Original Game Boy
    #[default]
    Dmg,
    /// Game Boy Pocket
    Mgb,
    /// Game Boy Color
    Cgb,
    /// Game Boy Advance running in Color compatibility mode
    Agb,
    /// Super Game Boy
    Sgb,
    /// Super Game Boy 2
    Sgb2,
}

impl GbModel {
    /// Engine-facing model name
    pub fn name(self) -> &'static str {
        match self {
            Self::Dmg => "DMG",
            Self::Mgb => "MGB",
            Self::Cgb => "CGB",
            Self::Agb => "AGB",
            Self::Sgb => "SGB",
            Self::Sgb2 => "SGB2",
        }
    }

    pub fn is_color(self) -> bool {
        matches!(self, Self::Cgb | Self::Agb)
    }

    pub fn is_super_game_boy(self) -> bool {
        matches!(self, Self::Sgb | Self::Sgb2)
    }
}

/// Requested hardware model: a concrete variant or an auto-detect mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ModelPreference {
    /// Detect from the cartridge; Color wins when both enhancements are present
    #[default]
    AutoPreferColor,
    /// Detect from the cartridge; Super Game Boy wins when both enhancements are present
    AutoPreferSuperGameBoy,
    /// Always use this model
    Fixed(GbModel),
}

/// Hardware model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub preference: ModelPreference,
    /// Boot through the BIOS image when the engine has one
    pub use_bios: bool,
}

/// Video settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// 4 or 12 XRGB8888 colours used for monochrome games
    pub palette: Vec<u32>,
    pub show_sgb_borders: bool,
}

/// Audio pacing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output sample rate delivered to the host
    pub sample_rate: u32,
    /// EMA window in frames; the smoothing factor is its reciprocal
    pub smoothing_frames: u32,
    /// Hard ceiling for the engine's internal audio buffer
    pub max_buffer_samples: usize,
    /// Fixed quantum for push-style delivery
    pub push_quantum: usize,
    /// Initial engine buffer for pull-style delivery
    pub pull_buffer_samples: usize,
}

/// Input delivery model negotiated with the host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InputModel {
    /// One snapshot per frame replaces the whole key state
    #[default]
    FullState,
    /// Discrete press/release events toggle single keys
    EdgeEvents,
}

/// Input settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InputConfig {
    pub model: InputModel,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PathConfig {
    /// Optional TOML compatibility database; without one only the header is consulted
    pub compat_database: Option<PathBuf>,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Engine options applied in one step right before a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub model: GbModel,
    pub palette: [u32; PALETTE_ENTRIES],
    pub show_sgb_borders: bool,
    pub use_bios: bool,
}

impl EngineConfig {
    /// Expand a 4 or 12 colour palette to the engine's 12 entries
    pub fn expand_palette(colors: &[u32]) -> Result<[u32; PALETTE_ENTRIES]> {
        if colors.len() != 4 && colors.len() != PALETTE_ENTRIES {
            return Err(CoreError::Config(format!(
                "palette must have 4 or 12 colors, got {}",
                colors.len()
            )));
        }
        Ok(std::array::from_fn(|i| colors[i % colors.len()]))
    }

    /// Build the engine options described by a configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let model = match config.model.preference {
            ModelPreference::Fixed(model) => model,
            _ => GbModel::default(),
        };

        Ok(Self {
            model,
            palette: Self::expand_palette(&config.video.palette)?,
            show_sgb_borders: config.video.show_sgb_borders,
            use_bios: config.model.use_bios,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: GbModel::default(),
            palette: std::array::from_fn(|i| DEFAULT_PALETTE[i % DEFAULT_PALETTE.len()]),
            show_sgb_borders: true,
            use_bios: true,
        }
    }
}

// Default implementations

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            preference: ModelPreference::default(),
            use_bios: true,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.to_vec(),
            show_sgb_borders: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 32768,
            smoothing_frames: 180,
            max_buffer_samples: 16384,
            push_quantum: 512,
            pull_buffer_samples: 1024,
        }
    }
}

impl Config {
    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save()?;
            tracing::info!("Created default configuration at {}", path.display());
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        tracing::debug!("Loading configuration from {}", path.display());
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validating config {}", path.display()))?;
        Ok(config)
    }

    /// Reject settings that parse but cannot drive a session
    pub fn validate(&self) -> Result<()> {
        EngineConfig::expand_palette(&self.video.palette)?;
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err(CoreError::Config("audio.sample_rate must be non-zero".into()));
        }
        if audio.smoothing_frames == 0 {
            return Err(CoreError::Config("audio.smoothing_frames must be non-zero".into()));
        }
        if audio.push_quantum == 0 || audio.push_quantum > audio.max_buffer_samples {
            return Err(CoreError::Config(format!(
                "audio.push_quantum must be between 1 and {}, got {}",
                audio.max_buffer_samples, audio.push_quantum
            )));
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oxidized-gb")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.preference, ModelPreference::AutoPreferColor);
        assert_eq!(config.audio.sample_rate, 32768);
        assert_eq!(config.audio.smoothing_frames, 180);
        assert_eq!(config.audio.max_buffer_samples, 16384);
        assert_eq!(config.input.model, InputModel::FullState);
        assert!(config.video.show_sgb_borders);
        assert!(config.model.use_bios);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.model.preference = ModelPreference::Fixed(GbModel::Sgb2);
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.preference, ModelPreference::Fixed(GbModel::Sgb2));
        assert_eq!(parsed.video.palette, config.video.palette);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str(
            "[model]\npreference = \"auto-prefer-super-game-boy\"\n[input]\nmodel = \"edge-events\"\n",
        )
        .unwrap();
        assert_eq!(parsed.model.preference, ModelPreference::AutoPreferSuperGameBoy);
        assert_eq!(parsed.input.model, InputModel::EdgeEvents);
        assert_eq!(parsed.audio.push_quantum, 512);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[debug]\nlog_level = \"Trace\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.debug.log_level, LogLevel::Trace);

        std::fs::write(&path, "[debug\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }

    #[test]
    fn test_palette_expansion() {
        let four = EngineConfig::expand_palette(&[1, 2, 3, 4]).unwrap();
        assert_eq!(four, [1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4]);

        let twelve: Vec<u32> = (0..12).collect();
        assert_eq!(EngineConfig::expand_palette(&twelve).unwrap()[11], 11);
        assert_eq!(
            EngineConfig::default(),
            EngineConfig::from_config(&Config::default()).unwrap()
        );
    }

    #[test]
    fn test_palette_rejects_other_lengths() {
        let err = EngineConfig::expand_palette(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
        assert!(err.to_string().contains("got 3"));
    }

    #[test]
    fn test_load_rejects_bad_palette() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[video]\npalette = [1, 2, 3]\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("validating config"));
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_audio_settings() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.audio.smoothing_frames = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.audio.push_quantum = config.audio.max_buffer_samples + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_flags() {
        assert!(GbModel::Cgb.is_color());
        assert!(GbModel::Agb.is_color());
        assert!(GbModel::Sgb2.is_super_game_boy());
        assert!(!GbModel::Dmg.is_color());
        assert_eq!(GbModel::Mgb.name(), "MGB");
    }
}
