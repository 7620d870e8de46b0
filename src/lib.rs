//! v4l2-grab: single-frame capture from V4L2 devices.
//!
//! A [`Camera`] owns one device node. Opening it negotiates capabilities and
//! the pixel format, then sets up a ring of memory-mapped driver buffers.
//! Frames are grabbed one at a time: wait for readiness, dequeue, copy the
//! payload out, hand the buffer back.
//!
//! Everything below the session talks to the device through the
//! [`ControlChannel`] trait, so the whole pipeline runs against a simulated
//! driver in unit tests.
//!
//! ```no_run
//! use v4l2_grab::{Camera, FourCC, SessionConfig};
//!
//! # fn main() -> Result<(), v4l2_grab::CameraError> {
//! let config = SessionConfig::new("/dev/video0")
//!     .with_pixel_format(FourCC::JPEG)
//!     .with_size(1024, 768);
//! let mut camera = Camera::open(&config)?;
//! camera.stream_on()?;
//! let frame = camera.grab_frame()?;
//! println!("{} bytes", frame.len());
//! camera.close()?;
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod capture;
pub mod config;
pub mod control;
pub mod device;
pub mod discovery;
pub mod error;
pub mod format;
pub mod fourcc;
pub mod ring;
pub mod session;
pub mod stream;
pub mod sys;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use config::SessionConfig;
pub use control::{ControlId, ControlInfo, ControlType, MenuItem};
pub use device::DeviceChannel;
pub use discovery::{find_devices, list_devices, DeviceNode};
pub use error::{CameraError, ErrorKind, Result};
pub use fourcc::FourCC;
pub use ring::Ownership;
pub use session::Camera;
pub use stream::StreamState;
pub use traits::{
    BufferClass, CapabilityFlags, ControlChannel, DeviceCapabilities, Field, FormatDescriptor,
    Frame, FrameGeometry, FrameMetadata, FrameSize, MappedRegion, MemoryKind,
};
