//! Process-wide active session slot
//!
//! The engine registers its logger, rumble and push-audio callbacks as plain
//! function pointers with no context argument. The routes below resolve them
//! to the one live session through this slot. Claiming the slot while another
//! session holds it is a programming error and panics.

use gb_audio::AudioPacer;
use gb_core::engine::SampleSource;
use gb_core::host::{AudioSink, HostLogger, RumbleSink};
use gb_core::logging::{format_engine_message, EngineLogLevel, HostLogLevel};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Host sinks and pacing state reachable from engine callbacks
pub(crate) struct SessionOutputs {
    pub audio: Box<dyn AudioSink>,
    pub logger: Box<dyn HostLogger>,
    pub rumble: Box<dyn RumbleSink>,
    pub pacer: AudioPacer,
}

pub(crate) type SharedOutputs = Arc<Mutex<SessionOutputs>>;

static ACTIVE_SESSION: Lazy<Mutex<Option<Weak<Mutex<SessionOutputs>>>>> =
    Lazy::new(|| Mutex::new(None));

/// Ownership of the active slot; releases it on drop
pub(crate) struct ActiveSlot {
    _private: (),
}

impl ActiveSlot {
    /// Claim the slot for `outputs`
    ///
    /// Panics if another session is alive.
    pub fn claim(outputs: &SharedOutputs) -> Self {
        let mut slot = ACTIVE_SESSION.lock();
        assert!(
            slot.is_none(),
            "only one session may exist per process; drop the previous session first"
        );
        *slot = Some(Arc::downgrade(outputs));
        tracing::debug!("Active session slot claimed");
        Self { _private: () }
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        ACTIVE_SESSION.lock().take();
        tracing::debug!("Active session slot released");
    }
}

/// Whether a session currently holds the slot
pub fn is_active() -> bool {
    ACTIVE_SESSION.lock().is_some()
}

fn with_active<R>(f: impl FnOnce(&mut SessionOutputs) -> R) -> Option<R> {
    let outputs = ACTIVE_SESSION.lock().as_ref().and_then(Weak::upgrade)?;
    let mut outputs = outputs.lock();
    Some(f(&mut outputs))
}

/// Logger route handed to the engine
pub(crate) fn route_log(category: &str, level: EngineLogLevel, message: &str) {
    let host_level = HostLogLevel::from(level);
    let line = format_engine_message(category, message);

    match host_level {
        HostLogLevel::Critical => tracing::error!(target: "engine", "{}", line),
        HostLogLevel::Warning => tracing::warn!(target: "engine", "{}", line),
        HostLogLevel::Info | HostLogLevel::Message => tracing::info!(target: "engine", "{}", line),
        HostLogLevel::Debug => tracing::debug!(target: "engine", "{}", line),
    }

    with_active(|outputs| outputs.logger.log(host_level, &line));
}

/// Rumble route handed to the engine
pub(crate) fn route_rumble(channel: u32, strong: u16, weak: u16) {
    if with_active(|outputs| outputs.rumble.rumble(channel, strong, weak)).is_none() {
        tracing::trace!("rumble with no active session dropped");
    }
}

/// Push-style audio route handed to the engine
pub(crate) fn route_audio_stream(source: &mut dyn SampleSource) {
    with_active(|outputs| {
        let SessionOutputs { audio, pacer, .. } = outputs;
        pacer.deliver_quantum(source, audio.as_mut());
    });
}
