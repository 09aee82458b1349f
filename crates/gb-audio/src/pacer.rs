//! Audio output pacing
//!
//! The engine produces samples at its own rate, so the number available at a
//! host frame boundary jitters from frame to frame. Two delivery shapes exist:
//!
//! - **Push**: the engine hands over one fixed quantum whenever it has
//!   buffered that much; the pacer forwards it unchanged.
//! - **Pull**: the pacer polls once per frame and reads an amount tracked by
//!   an exponential moving average of what the engine makes available, so the
//!   host sees a steady stream without gaps or unbounded buffering.

use gb_core::config::AudioConfig;
use gb_core::engine::SampleSource;
use gb_core::host::AudioSink;
use gb_core::DeviceFamily;

/// How samples leave the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Engine calls back with exactly `quantum` frames
    Push { quantum: usize },
    /// Adapter polls and reads a variable amount every frame
    Pull,
}

impl DeliveryMode {
    /// Delivery shape matching a device family
    pub fn for_family(family: DeviceFamily, config: &AudioConfig) -> Self {
        match family {
            DeviceFamily::GameBoy => Self::Push {
                quantum: config.push_quantum,
            },
            DeviceFamily::GameBoyAdvance => Self::Pull,
        }
    }
}

/// Running totals, mostly for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacerStats {
    /// Pull ticks that found samples
    pub ticks: u64,
    /// Pull ticks that found nothing
    pub idle_ticks: u64,
    /// Times the read buffer grew
    pub growths: u64,
    /// Frames forwarded to the host
    pub frames_forwarded: u64,
}

/// Paces engine audio into host-sized buffers
#[derive(Debug)]
pub struct AudioPacer {
    mode: DeliveryMode,
    channels: usize,
    alpha: f64,
    /// Moving average of available frames per video frame
    ema_samples_per_frame: f64,
    /// Interleaved scratch buffer, `buffer_capacity * channels` long
    buffer: Vec<i16>,
    /// Capacity in frames; only ever grows
    buffer_capacity: usize,
    min_engine_buffer: usize,
    max_engine_buffer: usize,
    stats: PacerStats,
}

impl AudioPacer {
    /// Create a pacer seeded with the engine's nominal samples per frame
    pub fn new(mode: DeliveryMode, config: &AudioConfig, nominal_samples_per_frame: f64) -> Self {
        let channels = 2;
        let smoothing_frames = config.smoothing_frames.max(1);
        let buffer_capacity = match mode {
            DeliveryMode::Push { quantum } => quantum,
            DeliveryMode::Pull => (2.0 * nominal_samples_per_frame).ceil() as usize,
        };

        Self {
            mode,
            channels,
            alpha: 1.0 / smoothing_frames as f64,
            ema_samples_per_frame: nominal_samples_per_frame,
            buffer: vec![0; buffer_capacity * channels],
            buffer_capacity,
            min_engine_buffer: config.pull_buffer_samples,
            max_engine_buffer: config.max_buffer_samples,
            stats: PacerStats::default(),
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn ema_samples_per_frame(&self) -> f64 {
        self.ema_samples_per_frame
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn stats(&self) -> PacerStats {
        self.stats
    }

    /// Size the engine-side buffer for the chosen delivery shape
    pub fn prepare(&self, source: &mut dyn SampleSource) {
        let frames = match self.mode {
            DeliveryMode::Push { quantum } => quantum,
            DeliveryMode::Pull => self.engine_buffer_request(),
        };
        source.set_buffer_size(frames);
    }

    /// Per-frame tick; returns the frames forwarded to the host
    ///
    /// Push sessions receive their audio through [`AudioPacer::deliver_quantum`],
    /// so the tick does nothing for them.
    ///
    /// The read target is `floor(ema)`, so an average approaching the true rate
    /// from below reads one frame short per tick. Unread frames stay in the
    /// engine and raise the next `available`, which pulls the average up.
    pub fn tick(&mut self, source: &mut dyn SampleSource, sink: &mut dyn AudioSink) -> usize {
        if self.mode != DeliveryMode::Pull {
            return 0;
        }

        let available = source.available_samples();
        if available == 0 {
            self.stats.idle_ticks += 1;
            return 0;
        }
        self.stats.ticks += 1;

        self.ema_samples_per_frame =
            self.alpha * available as f64 + (1.0 - self.alpha) * self.ema_samples_per_frame;
        let target = self.ema_samples_per_frame.floor() as usize;

        if self.buffer_capacity < target * 2 {
            self.grow(target * 2);
        }

        let requested = self.engine_buffer_request();
        if source.buffer_size() != requested {
            source.set_buffer_size(requested);
        }

        let produced = source.read_samples(&mut self.buffer, target);
        tracing::trace!(
            "audio tick: available={} ema={:.2} target={} produced={}",
            available,
            self.ema_samples_per_frame,
            target,
            produced
        );
        self.forward(sink, produced)
    }

    /// Forward one push-style quantum; returns the frames forwarded
    pub fn deliver_quantum(&mut self, source: &mut dyn SampleSource, sink: &mut dyn AudioSink) -> usize {
        let DeliveryMode::Push { quantum } = self.mode else {
            panic!("push-style audio delivered to a pull-mode pacer");
        };

        let produced = source.read_samples(&mut self.buffer, quantum);
        self.forward(sink, produced)
    }

    fn forward(&mut self, sink: &mut dyn AudioSink, produced: usize) -> usize {
        if produced > 0 {
            sink.play_samples(&self.buffer[..produced * self.channels]);
            self.stats.frames_forwarded += produced as u64;
        }
        produced
    }

    fn grow(&mut self, frames: usize) {
        tracing::debug!(
            "Growing audio buffer from {} to {} frames",
            self.buffer_capacity,
            frames
        );
        self.buffer_capacity = frames;
        self.buffer.resize(frames * self.channels, 0);
        self.stats.growths += 1;
    }

    fn engine_buffer_request(&self) -> usize {
        self.buffer_capacity
            .max(self.min_engine_buffer)
            .min(self.max_engine_buffer)
    }
}
