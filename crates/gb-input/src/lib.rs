//! Input translation for oxidized-gb
//!
//! Host buttons arrive either as one full snapshot per frame or as discrete
//! press/release events, depending on the negotiated host contract.

pub mod keys;
pub mod mapping;

pub use keys::{GbKeys, GbaKeys, HostButton, InputSnapshot};
pub use mapping::{button_table, InputMapper};
