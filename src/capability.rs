//! Device identity, format and frame-size discovery.
//!
//! Enumerations are lazy: each `next()` issues one request with the next
//! index, and the driver's `EINVAL` ends the sequence. Any other failure is
//! yielded once as an error and ends the sequence too. Calling the
//! `enumerate_*` function again, or [`Enumeration::restart`], starts over at
//! index 0.

use std::io;

use log::debug;

use crate::error::{CameraError, Result};
use crate::fourcc::FourCC;
use crate::sys::{
    self, c_string, v4l2_capability, v4l2_fmtdesc, v4l2_frmsizeenum, Request, Zeroed,
};
use crate::traits::{
    BufferClass, CapabilityFlags, ControlChannel, DeviceCapabilities, FormatDescriptor, FrameSize,
};

/// Query device identity and capability flags.
pub fn query_capabilities<C: ControlChannel>(channel: &mut C) -> Result<DeviceCapabilities> {
    let mut raw = v4l2_capability::zeroed();
    channel
        .send(Request::QueryCap(&mut raw))
        .map_err(|err| CameraError::from_os("VIDIOC_QUERYCAP", err))?;

    let caps = DeviceCapabilities {
        driver: c_string(&raw.driver),
        card: c_string(&raw.card),
        bus_info: c_string(&raw.bus_info),
        version: raw.version,
        capabilities: CapabilityFlags(raw.capabilities),
        device_caps: CapabilityFlags(raw.device_caps),
    };
    debug!(
        "device {} ({}) on {}, caps {:#010x}",
        caps.card, caps.driver, caps.bus_info, caps.capabilities.0
    );
    Ok(caps)
}

/// A lazy, restartable index-driven enumeration.
pub struct Enumeration<'a, C, K, T> {
    channel: &'a mut C,
    key: K,
    fetch: fn(&mut C, K, u32) -> io::Result<T>,
    op: &'static str,
    index: u32,
    done: bool,
}

impl<C, K, T> Enumeration<'_, C, K, T> {
    /// Start again from index 0.
    pub fn restart(&mut self) {
        self.index = 0;
        self.done = false;
    }
}

impl<C: ControlChannel, K: Copy, T> Iterator for Enumeration<'_, C, K, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match (self.fetch)(self.channel, self.key, self.index) {
            Ok(item) => {
                self.index += 1;
                Some(Ok(item))
            }
            Err(err) if err.raw_os_error() == Some(libc::EINVAL) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(CameraError::from_os(self.op, err)))
            }
        }
    }
}

/// Formats supported on a buffer class.
pub type FormatIter<'a, C> = Enumeration<'a, C, BufferClass, FormatDescriptor>;

/// Frame sizes supported for a pixel format.
pub type FrameSizeIter<'a, C> = Enumeration<'a, C, FourCC, FrameSize>;

/// Enumerate the pixel formats supported on `class`.
pub fn enumerate_formats<C: ControlChannel>(channel: &mut C, class: BufferClass) -> FormatIter<'_, C> {
    Enumeration {
        channel,
        key: class,
        fetch: fetch_format::<C>,
        op: "VIDIOC_ENUM_FMT",
        index: 0,
        done: false,
    }
}

/// Enumerate the frame sizes supported for `pixel_format`.
pub fn enumerate_frame_sizes<C: ControlChannel>(
    channel: &mut C,
    pixel_format: FourCC,
) -> FrameSizeIter<'_, C> {
    Enumeration {
        channel,
        key: pixel_format,
        fetch: fetch_frame_size::<C>,
        op: "VIDIOC_ENUM_FRAMESIZES",
        index: 0,
        done: false,
    }
}

fn fetch_format<C: ControlChannel>(
    channel: &mut C,
    class: BufferClass,
    index: u32,
) -> io::Result<FormatDescriptor> {
    let mut raw = v4l2_fmtdesc {
        index,
        type_: class.as_raw(),
        ..v4l2_fmtdesc::zeroed()
    };
    channel.send(Request::EnumFmt(&mut raw))?;
    Ok(FormatDescriptor {
        index: raw.index,
        pixel_format: FourCC::from_u32(raw.pixelformat),
        description: c_string(&raw.description),
        flags: raw.flags,
    })
}

fn fetch_frame_size<C: ControlChannel>(
    channel: &mut C,
    pixel_format: FourCC,
    index: u32,
) -> io::Result<FrameSize> {
    let mut raw = v4l2_frmsizeenum {
        index,
        pixel_format: pixel_format.to_u32(),
        ..v4l2_frmsizeenum::zeroed()
    };
    channel.send(Request::EnumFrameSizes(&mut raw))?;
    match raw.type_ {
        sys::FRMSIZE_TYPE_DISCRETE => {
            let size = sys::discrete_size(&raw);
            Ok(FrameSize::Discrete {
                width: size.width,
                height: size.height,
            })
        }
        sys::FRMSIZE_TYPE_CONTINUOUS => {
            let range = sys::stepwise_size(&raw);
            Ok(FrameSize::Continuous {
                min_width: range.min_width,
                max_width: range.max_width,
                min_height: range.min_height,
                max_height: range.max_height,
            })
        }
        sys::FRMSIZE_TYPE_STEPWISE => {
            let range = sys::stepwise_size(&raw);
            Ok(FrameSize::Stepwise {
                min_width: range.min_width,
                max_width: range.max_width,
                step_width: range.step_width,
                min_height: range.min_height,
                max_height: range.max_height,
                step_height: range.step_height,
            })
        }
        _ => Err(io::Error::from_raw_os_error(libc::EPROTO)),
    }
}

/// Whether `pixel_format` is offered on `class`.
pub fn has_format<C: ControlChannel>(
    channel: &mut C,
    class: BufferClass,
    pixel_format: FourCC,
) -> Result<bool> {
    for desc in enumerate_formats(channel, class) {
        if desc?.pixel_format == pixel_format {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Whether a format with exactly this description is offered on `class`.
pub fn has_format_description<C: ControlChannel>(
    channel: &mut C,
    class: BufferClass,
    description: &str,
) -> Result<bool> {
    for desc in enumerate_formats(channel, class) {
        if desc?.description == description {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Descriptions of every format offered on `class`, in enumeration order.
pub fn format_descriptions<C: ControlChannel>(
    channel: &mut C,
    class: BufferClass,
) -> Result<Vec<String>> {
    enumerate_formats(channel, class)
        .map(|desc| desc.map(|d| d.description))
        .collect()
}

/// Whether `width` x `height` is supported for `pixel_format`.
///
/// The first frame-size entry that admits the size answers; later entries
/// are not consulted.
pub fn supports_frame_size<C: ControlChannel>(
    channel: &mut C,
    pixel_format: FourCC,
    width: u32,
    height: u32,
) -> Result<bool> {
    for size in enumerate_frame_sizes(channel, pixel_format) {
        if size?.contains(width, height) {
            return Ok(true);
        }
    }
    Ok(false)
}
