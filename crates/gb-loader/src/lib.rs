//! Cartridge inspection for oxidized-gb
//!
//! Computes the cartridge signature of a loaded ROM and decides which
//! hardware model it should run on.

pub mod compat;
pub mod header;
pub mod model;

pub use compat::{CompatDatabase, CompatEntry};
pub use header::{header_crc32, CartridgeSignature};
pub use model::{decide, ModelResolver, Resolution, ResolutionSource, BASE_MODEL};
