//! Session configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fourcc::FourCC;
use crate::traits::{BufferClass, MemoryKind};

/// Default readiness bound for one frame.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything needed to open a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Device node.
    pub path: PathBuf,
    /// Buffer queue to use.
    pub buffer_class: BufferClass,
    /// Requested pixel format.
    pub pixel_format: FourCC,
    /// Requested width in pixels.
    pub width: u32,
    /// Requested height in pixels.
    pub height: u32,
    /// Buffer memory kind. Sessions support [`MemoryKind::Mmap`] only.
    pub memory: MemoryKind,
    /// Number of buffers to ask the driver for.
    pub buffer_count: u32,
    /// How long `grab_frame` waits for the device.
    pub ready_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/video0"),
            buffer_class: BufferClass::VideoCapture,
            pixel_format: FourCC::YUYV,
            width: 640,
            height: 480,
            memory: MemoryKind::Mmap,
            buffer_count: 4,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Default configuration for the device at `path`.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Set the pixel format.
    #[must_use]
    pub const fn with_pixel_format(mut self, pixel_format: FourCC) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    /// Set the frame size.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the buffer class.
    #[must_use]
    pub const fn with_buffer_class(mut self, buffer_class: BufferClass) -> Self {
        self.buffer_class = buffer_class;
        self
    }

    /// Set the memory kind.
    #[must_use]
    pub const fn with_memory(mut self, memory: MemoryKind) -> Self {
        self.memory = memory;
        self
    }

    /// Set how many buffers to request.
    #[must_use]
    pub const fn with_buffer_count(mut self, buffer_count: u32) -> Self {
        self.buffer_count = buffer_count;
        self
    }

    /// Set the readiness bound.
    #[must_use]
    pub const fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }
}
