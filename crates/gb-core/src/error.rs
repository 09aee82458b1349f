//! Error types for the oxidized-gb adapter

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the adapter
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Couldn't load ROM {path:?}: {source}")]
    CouldntLoadRom {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// Errors reported by the emulation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("ROM file not found")]
    RomNotFound,

    #[error("ROM is {0} bytes, smaller than its header")]
    RomTooSmall(usize),

    #[error("Header checksum mismatch: stored 0x{stored:02x}, computed 0x{computed:02x}")]
    BadHeaderChecksum { stored: u8, computed: u8 },

    #[error("Unrecognized ROM format")]
    UnrecognizedFormat,

    #[error("Failed to read ROM: {0}")]
    Read(String),
}

/// Save-state serialization errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a save-state file")]
    BadMagic,

    #[error("Unsupported save-state version {0}")]
    UnsupportedVersion(u16),

    #[error("Save-state file is truncated")]
    Truncated,

    #[error("Save-state checksum mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("Missing save-state section: {0}")]
    MissingSection(&'static str),

    #[error("Duplicate save-state section: {0}")]
    DuplicateSection(&'static str),

    #[error("Unknown save-state section id {0}")]
    UnknownSection(u16),

    #[error("Section {section} is {actual} bytes, expected {expected}")]
    SectionSize {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, CoreError>;
