//! Hardware model detection
//!
//! Runs once per load, before the first reset. A fixed preference is applied
//! as-is; the auto modes look at the cartridge header and the compatibility
//! database and pick the variant that exposes every enhancement the game uses.

use crate::compat::CompatDatabase;
use crate::header::CartridgeSignature;
use gb_core::{Engine, Enhancements, GbModel, ModelPreference};

/// Most compatible variant, used when nothing better is known
pub const BASE_MODEL: GbModel = GbModel::Dmg;

/// Where a resolved model came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Preference named a concrete model
    Fixed,
    /// ROM missing or shorter than its header
    NoHeader,
    /// Database entry forced the model
    Database,
    /// Decided from detected enhancements
    Detected,
}

/// Outcome of one model resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub model: GbModel,
    pub source: ResolutionSource,
    pub signature: Option<CartridgeSignature>,
}

/// Pick a model from enhancement flags
pub fn decide(enhancements: Enhancements, preference: ModelPreference) -> GbModel {
    let color = enhancements.intersects(Enhancements::COLOR | Enhancements::COLOR_ONLY);
    let super_game_boy = enhancements.contains(Enhancements::SUPER_GAME_BOY);

    match (super_game_boy, color) {
        (true, true) => match preference {
            ModelPreference::AutoPreferSuperGameBoy => GbModel::Sgb,
            ModelPreference::AutoPreferColor => GbModel::Cgb,
            ModelPreference::Fixed(model) => model,
        },
        (true, false) => GbModel::Sgb,
        (false, true) => GbModel::Cgb,
        (false, false) => BASE_MODEL,
    }
}

/// Resolves the hardware variant for a freshly loaded cartridge
#[derive(Debug, Clone, Default)]
pub struct ModelResolver {
    preference: ModelPreference,
    database: CompatDatabase,
}

impl ModelResolver {
    pub fn new(preference: ModelPreference, database: CompatDatabase) -> Self {
        Self {
            preference,
            database,
        }
    }

    pub fn preference(&self) -> ModelPreference {
        self.preference
    }

    pub fn set_preference(&mut self, preference: ModelPreference) {
        self.preference = preference;
    }

    pub fn database(&self) -> &CompatDatabase {
        &self.database
    }

    /// Resolve against the ROM currently loaded in `engine`
    pub fn resolve<E: Engine + ?Sized>(&self, engine: &E) -> Resolution {
        self.resolve_rom(engine.rom(), |rom| engine.classify_rom(rom))
    }

    /// Resolve against raw ROM bytes with a given classifier
    pub fn resolve_rom<F>(&self, rom: Option<&[u8]>, classify: F) -> Resolution
    where
        F: FnOnce(&[u8]) -> Enhancements,
    {
        if let ModelPreference::Fixed(model) = self.preference {
            return Resolution {
                model,
                source: ResolutionSource::Fixed,
                signature: None,
            };
        }

        let Some(signature) = rom.and_then(|rom| CartridgeSignature::from_rom(rom, classify)) else {
            tracing::debug!("No usable cartridge header, using {}", BASE_MODEL.name());
            return Resolution {
                model: BASE_MODEL,
                source: ResolutionSource::NoHeader,
                signature: None,
            };
        };

        let entry = self
            .database
            .lookup(signature.header_crc32)
            .copied()
            .unwrap_or_default();
        let (model, source) = match entry.model {
            Some(model) => (model, ResolutionSource::Database),
            None => (
                decide(signature.enhancements | entry.enhancements, self.preference),
                ResolutionSource::Detected,
            ),
        };
        let resolution = Resolution {
            model,
            source,
            signature: Some(signature),
        };

        tracing::debug!(
            "Resolved model {} ({:?}) for header crc 0x{:08x}",
            resolution.model.name(),
            resolution.source,
            resolution.signature.as_ref().map_or(0, |s| s.header_crc32)
        );
        resolution
    }
}
