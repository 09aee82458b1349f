//! Audio pacing for oxidized-gb

pub mod pacer;

pub use pacer::{AudioPacer, DeliveryMode, PacerStats};
