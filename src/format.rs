//! Pixel format negotiation.

use log::{debug, info};

use crate::error::{CameraError, Result};
use crate::fourcc::FourCC;
use crate::sys::{self, v4l2_pix_format, Request, Zeroed};
use crate::traits::{BufferClass, ControlChannel, Field, FrameGeometry};

fn geometry_from_raw(pix: &v4l2_pix_format) -> FrameGeometry {
    FrameGeometry {
        pixel_format: FourCC::from_u32(pix.pixelformat),
        width: pix.width,
        height: pix.height,
        field: Field::from_raw(pix.field),
        bytes_per_line: pix.bytesperline,
        size_image: pix.sizeimage,
    }
}

/// Ask the device to use `pixel_format` at `width` x `height`, progressive.
///
/// The device may adjust the request; the geometry it actually applied is
/// returned and is what the buffer ring must be sized for.
pub fn set_format<C: ControlChannel>(
    channel: &mut C,
    class: BufferClass,
    pixel_format: FourCC,
    width: u32,
    height: u32,
) -> Result<FrameGeometry> {
    let mut format = sys::new_format(class.as_raw());
    sys::set_pix(
        &mut format,
        v4l2_pix_format {
            width,
            height,
            pixelformat: pixel_format.to_u32(),
            field: sys::FIELD_NONE,
            ..v4l2_pix_format::zeroed()
        },
    );
    channel
        .send(Request::SetFmt(&mut format))
        .map_err(|err| CameraError::from_os("VIDIOC_S_FMT", err))?;

    let applied = geometry_from_raw(&sys::pix(&format));
    if applied.pixel_format != pixel_format || applied.width != width || applied.height != height {
        info!(
            "requested {pixel_format} {width}x{height}, device applied {} {}x{}",
            applied.pixel_format, applied.width, applied.height
        );
    } else {
        debug!(
            "format set: {} {}x{} stride {} size {}",
            applied.pixel_format,
            applied.width,
            applied.height,
            applied.bytes_per_line,
            applied.size_image
        );
    }
    Ok(applied)
}

/// Read the format currently applied on `class`.
pub fn get_format<C: ControlChannel>(channel: &mut C, class: BufferClass) -> Result<FrameGeometry> {
    let mut format = sys::new_format(class.as_raw());
    channel
        .send(Request::GetFmt(&mut format))
        .map_err(|err| CameraError::from_os("VIDIOC_G_FMT", err))?;
    Ok(geometry_from_raw(&sys::pix(&format)))
}
