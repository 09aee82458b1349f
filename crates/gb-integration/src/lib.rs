//! Host-facing integration layer for oxidized-gb
//!
//! This crate ties the engine, input mapping, model resolution, audio pacing
//! and save states together behind a single [`Session`].

mod active;
pub mod session;
pub mod state_store;

pub use active::is_active;
pub use session::{FamilyControls, GameBoyControls, Session, SessionState};
pub use state_store::{SectionId, StateSnapshot};
