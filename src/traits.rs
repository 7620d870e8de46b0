//! Core traits and types for the capture session.

use std::io;
use std::time::Duration;

use crate::fourcc::FourCC;
use crate::sys::{self, Request};

/// Direction of data flow a buffer queue serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferClass {
    /// Device produces frames (camera).
    VideoCapture,
    /// Device consumes frames (display, encoder input).
    VideoOutput,
}

impl BufferClass {
    /// Raw `v4l2_buf_type` value.
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::VideoCapture => sys::BUF_TYPE_VIDEO_CAPTURE,
            Self::VideoOutput => sys::BUF_TYPE_VIDEO_OUTPUT,
        }
    }
}

/// How a buffer's backing memory is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Driver allocates, application maps.
    Mmap,
    /// Application allocates and passes a pointer.
    UserPtr,
    /// Application passes a dmabuf file descriptor.
    DmaBuf,
}

impl MemoryKind {
    /// Raw `v4l2_memory` value.
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::Mmap => sys::MEMORY_MMAP,
            Self::UserPtr => sys::MEMORY_USERPTR,
            Self::DmaBuf => sys::MEMORY_DMABUF,
        }
    }
}

/// Field ordering of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Driver chooses.
    Any,
    /// Progressive.
    None,
    /// Top field only.
    Top,
    /// Bottom field only.
    Bottom,
    /// Both fields interleaved.
    Interlaced,
    /// Top field first, sequential.
    SeqTb,
    /// Bottom field first, sequential.
    SeqBt,
    /// Alternating fields in separate buffers.
    Alternate,
    /// Interleaved, top field transmitted first.
    InterlacedTb,
    /// Interleaved, bottom field transmitted first.
    InterlacedBt,
}

impl Field {
    /// Decode a raw `v4l2_field`; unknown values map to `Any`.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::None,
            2 => Self::Top,
            3 => Self::Bottom,
            4 => Self::Interlaced,
            5 => Self::SeqTb,
            6 => Self::SeqBt,
            7 => Self::Alternate,
            8 => Self::InterlacedTb,
            9 => Self::InterlacedBt,
            _ => Self::Any,
        }
    }
}

/// Device capability flags (`V4L2_CAP_*`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityFlags(pub u32);

impl CapabilityFlags {
    /// Single-planar video capture.
    pub const VIDEO_CAPTURE: Self = Self(0x0000_0001);
    /// Single-planar video output.
    pub const VIDEO_OUTPUT: Self = Self(0x0000_0002);
    /// Video overlay.
    pub const VIDEO_OVERLAY: Self = Self(0x0000_0004);
    /// Multi-planar video capture.
    pub const VIDEO_CAPTURE_MPLANE: Self = Self(0x0000_1000);
    /// Multi-planar video output.
    pub const VIDEO_OUTPUT_MPLANE: Self = Self(0x0000_2000);
    /// Memory-to-memory device.
    pub const VIDEO_M2M: Self = Self(0x0000_8000);
    /// `read()`/`write()` I/O.
    pub const READWRITE: Self = Self(0x0100_0000);
    /// Streaming I/O.
    pub const STREAMING: Self = Self(0x0400_0000);
    /// `device_caps` field is valid.
    pub const DEVICE_CAPS: Self = Self(0x8000_0000);

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Identity and capabilities of an open device, captured once at open.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Kernel version the driver reports.
    pub version: u32,
    /// Capabilities of the physical device as a whole.
    pub capabilities: CapabilityFlags,
    /// Capabilities of this device node.
    pub device_caps: CapabilityFlags,
}

impl DeviceCapabilities {
    /// Node capabilities if the driver reports them, whole-device ones otherwise.
    pub const fn effective(&self) -> CapabilityFlags {
        if self.capabilities.contains(CapabilityFlags::DEVICE_CAPS) {
            self.device_caps
        } else {
            self.capabilities
        }
    }

    /// Whether the device can capture video.
    pub const fn can_capture(&self) -> bool {
        self.effective().contains(CapabilityFlags::VIDEO_CAPTURE)
    }

    /// Whether the device supports streaming I/O.
    pub const fn can_stream(&self) -> bool {
        self.effective().contains(CapabilityFlags::STREAMING)
    }
}

/// One entry of a format enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// Enumeration index.
    pub index: u32,
    /// Pixel format code.
    pub pixel_format: FourCC,
    /// Driver-supplied description.
    pub description: String,
    /// Raw `V4L2_FMT_FLAG_*` bits.
    pub flags: u32,
}

impl FormatDescriptor {
    /// Compressed bitstream format.
    pub const fn is_compressed(&self) -> bool {
        self.flags & sys::FMT_FLAG_COMPRESSED != 0
    }

    /// Converted in software by the driver.
    pub const fn is_emulated(&self) -> bool {
        self.flags & sys::FMT_FLAG_EMULATED != 0
    }
}

/// Negotiated pixel format and frame geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Pixel format.
    pub pixel_format: FourCC,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Field ordering.
    pub field: Field,
    /// Bytes per line (stride).
    pub bytes_per_line: u32,
    /// Total frame size in bytes.
    pub size_image: u32,
}

/// Which frame sizes a pixel format supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    /// Exactly one size.
    Discrete {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// Any size within the bounds.
    Continuous {
        /// Minimum width.
        min_width: u32,
        /// Maximum width.
        max_width: u32,
        /// Minimum height.
        min_height: u32,
        /// Maximum height.
        max_height: u32,
    },
    /// Sizes within the bounds on a step grid anchored at the minimum.
    Stepwise {
        /// Minimum width.
        min_width: u32,
        /// Maximum width.
        max_width: u32,
        /// Width increment.
        step_width: u32,
        /// Minimum height.
        min_height: u32,
        /// Maximum height.
        max_height: u32,
        /// Height increment.
        step_height: u32,
    },
}

impl FrameSize {
    /// Whether `width` x `height` is one of the sizes this entry describes.
    pub const fn contains(&self, width: u32, height: u32) -> bool {
        match *self {
            Self::Discrete {
                width: w,
                height: h,
            } => w == width && h == height,
            Self::Continuous {
                min_width,
                max_width,
                min_height,
                max_height,
            } => {
                width >= min_width && width <= max_width && height >= min_height && height <= max_height
            }
            Self::Stepwise {
                min_width,
                max_width,
                step_width,
                min_height,
                max_height,
                step_height,
            } => {
                if width < min_width || width > max_width || height < min_height || height > max_height {
                    return false;
                }
                on_step(width - min_width, step_width) && on_step(height - min_height, step_height)
            }
        }
    }
}

const fn on_step(delta: u32, step: u32) -> bool {
    // a zero step only admits the minimum
    if step == 0 {
        delta == 0
    } else {
        delta % step == 0
    }
}

/// Metadata for a captured frame.
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Ring slot the payload was copied from.
    pub index: u32,
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// A captured frame, owned and independent of the buffer ring.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw frame data.
    pub data: Vec<u8>,
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

impl Frame {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the payload begins with a JPEG start-of-image marker.
    pub fn is_jpeg(&self) -> bool {
        self.data.starts_with(&[0xFF, 0xD8])
    }
}

/// A driver-shared memory region backing one ring slot.
///
/// Slot memory never leaves the ring: the only read access is a copy.
pub trait MappedRegion {
    /// Mapped length in bytes.
    fn len(&self) -> usize;

    /// Whether the mapping is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the first `len` bytes (clamped to the mapping) into an owned buffer.
    fn copy_prefix(&self, len: usize) -> Vec<u8>;

    /// Release the mapping.
    fn unmap(self) -> io::Result<()>
    where
        Self: Sized;
}

/// Transport that carries control requests to a device driver.
///
/// One request is in flight per call. Failures carry the driver's errno.
pub trait ControlChannel {
    /// Memory region returned by [`ControlChannel::map`].
    type Region: MappedRegion;

    /// Send `request`; on success the request structure has been filled in.
    fn send(&mut self, request: Request<'_>) -> io::Result<()>;

    /// Map `length` bytes at device location `offset`.
    fn map(&mut self, offset: u32, length: usize) -> io::Result<Self::Region>;

    /// Block until the device has a completed buffer or `timeout` elapses.
    ///
    /// Returns `Ok(false)` on timeout.
    fn wait_ready(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Release the device handle. Later requests fail.
    fn close(&mut self) -> io::Result<()>;
}
