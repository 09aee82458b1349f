//! Sinks provided by the embedding host

use crate::logging::HostLogLevel;
use parking_lot::Mutex;
use std::sync::Arc;

/// Rectangle in framebuffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Framebuffer pixel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Xrgb8888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Xrgb8888 => 4,
        }
    }
}

/// Host-owned framebuffer the engine renders into
#[derive(Debug)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u32>,
    area: Rect,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            pixels: vec![0; width as usize * height as usize],
            area: Rect::new(0, 0, width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row stride in bytes
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Region of the buffer holding the visible picture
    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
    }
}

/// Shared handle to a host framebuffer
#[derive(Debug, Clone)]
pub struct VideoTarget(Arc<Mutex<Framebuffer>>);

impl VideoTarget {
    pub fn new(framebuffer: Framebuffer) -> Self {
        Self(Arc::new(Mutex::new(framebuffer)))
    }

    pub fn lock(&self) -> parking_lot::MutexGuard<'_, Framebuffer> {
        self.0.lock()
    }

    pub fn area(&self) -> Rect {
        self.0.lock().area()
    }

    pub fn set_area(&self, area: Rect) {
        self.0.lock().set_area(area);
    }

    pub fn stride(&self) -> usize {
        self.0.lock().stride()
    }

    /// Whether two handles refer to the same framebuffer
    pub fn same_buffer(&self, other: &VideoTarget) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Allocates framebuffers on behalf of the adapter
pub trait FramebufferAllocator: Send {
    fn allocate(&mut self, width: u32, height: u32, format: PixelFormat) -> VideoTarget;
}

/// Receives interleaved stereo samples
pub trait AudioSink: Send {
    /// `samples.len()` is the interleaved sample count
    fn play_samples(&mut self, samples: &[i16]);
}

/// Receives translated log records
pub trait HostLogger: Send {
    fn log(&mut self, level: HostLogLevel, message: &str);
}

/// Receives controller rumble requests
pub trait RumbleSink: Send {
    fn rumble(&mut self, channel: u32, strong: u16, weak: u16);
}

/// Everything the host lends to a session
pub struct HostSinks {
    pub video: Box<dyn FramebufferAllocator>,
    pub audio: Box<dyn AudioSink>,
    pub logger: Box<dyn HostLogger>,
    pub rumble: Box<dyn RumbleSink>,
}

/// Allocator that hands out plain heap framebuffers
#[derive(Debug, Default)]
pub struct HeapAllocator;

impl FramebufferAllocator for HeapAllocator {
    fn allocate(&mut self, width: u32, height: u32, format: PixelFormat) -> VideoTarget {
        VideoTarget::new(Framebuffer::new(width, height, format))
    }
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play_samples(&mut self, _samples: &[i16]) {}
}

impl HostLogger for NullSink {
    fn log(&mut self, _level: HostLogLevel, _message: &str) {}
}

impl RumbleSink for NullSink {
    fn rumble(&mut self, _channel: u32, _strong: u16, _weak: u16) {}
}

impl HostSinks {
    /// Sinks that allocate real framebuffers and drop all output
    pub fn headless() -> Self {
        Self {
            video: Box::new(HeapAllocator),
            audio: Box::new(NullSink),
            logger: Box::new(NullSink),
            rumble: Box::new(NullSink),
        }
    }
}
