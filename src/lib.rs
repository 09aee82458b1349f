//! Oxidized-GB - Game Boy / Game Boy Advance engine adapter
//!
//! Binds an emulation engine to a multi-system host through a fixed plugin
//! contract. The host drives a single [`Session`]; everything else is
//! reachable through the member crates re-exported here.

pub use gb_audio;
pub use gb_core;
pub use gb_input;
pub use gb_integration;
pub use gb_loader;

pub use gb_core::{Config, CoreError, DeviceFamily, Engine, GbModel, ModelPreference, Result, StateError};
pub use gb_integration::{FamilyControls, GameBoyControls, Session, SessionState};

/// Install the global `tracing` subscriber described by `config`
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init_logging(config: &Config) {
    gb_core::logging::init(&config.debug);
    tracing::debug!("oxidized-gb {}", env!("CARGO_PKG_VERSION"));
}
