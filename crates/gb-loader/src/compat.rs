//! Compatibility database
//!
//! Some cartridges under-report their enhancements in the header, or only
//! run correctly on one specific model. Entries are keyed by the CRC32 of the
//! header block so that revisions with identical headers share an entry.
//! No entries are built in; the host supplies them as a TOML file.

use anyhow::Context;
use gb_core::{Enhancements, GbModel};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Known facts about one cartridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompatEntry {
    /// Enhancements to assume in addition to the header's
    pub enhancements: Enhancements,
    /// Model the cartridge must run on, overriding detection
    pub model: Option<GbModel>,
}

#[derive(Debug, Deserialize)]
struct DatabaseFile {
    #[serde(default, rename = "entry")]
    entries: Vec<EntryRecord>,
}

#[derive(Debug, Deserialize)]
struct EntryRecord {
    crc32: u32,
    #[serde(default)]
    color: bool,
    #[serde(default)]
    super_game_boy: bool,
    #[serde(default)]
    model: Option<GbModel>,
}

/// Header CRC32 to compatibility entry lookup
#[derive(Debug, Clone, Default)]
pub struct CompatDatabase {
    entries: HashMap<u32, CompatEntry>,
}

impl CompatDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML database
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let file: DatabaseFile = toml::from_str(content).context("parsing compatibility database")?;
        let mut database = Self::new();

        for record in file.entries {
            let mut enhancements = Enhancements::empty();
            if record.color {
                enhancements |= Enhancements::COLOR;
            }
            if record.super_game_boy {
                enhancements |= Enhancements::SUPER_GAME_BOY;
            }
            database.insert(
                record.crc32,
                CompatEntry {
                    enhancements,
                    model: record.model,
                },
            );
        }

        Ok(database)
    }

    /// Load a TOML database from disk
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading compatibility database {}", path.display()))?;
        let database = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded {} compatibility entries from {}",
            database.len(),
            path.display()
        );
        Ok(database)
    }

    /// Add or replace an entry
    pub fn insert(&mut self, crc32: u32, entry: CompatEntry) {
        if self.entries.insert(crc32, entry).is_some() {
            tracing::debug!("Compatibility entry 0x{:08x} replaced", crc32);
        }
    }

    pub fn lookup(&self, crc32: u32) -> Option<&CompatEntry> {
        self.entries.get(&crc32)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
