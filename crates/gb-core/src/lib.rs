//! Core types for the oxidized-gb adapter
//!
//! This crate provides the foundational types, error handling,
//! configuration, logging and the engine/host contracts shared by
//! every other crate in the workspace.

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod logging;

pub use config::{Config, EngineConfig, GbModel, InputModel, ModelPreference};
pub use engine::{DeviceFamily, Engine, Enhancements, NullEngine, RtcState, SampleSource};
pub use error::{CoreError, EngineError, Result, StateError};
pub use host::{HostSinks, Rect, VideoTarget};
pub use logging::{EngineLogLevel, HostLogLevel};
