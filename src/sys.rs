//! V4L2 requests issued through a [`ControlChannel`](crate::ControlChannel).
//!
//! Structures are the bindgen-generated ones from [`v4l::v4l_sys`] and
//! request codes come from [`v4l::v4l2::vidioc`]. This module adds the
//! [`Request`] enum that pairs each code with its structure, plus accessors
//! for the anonymous unions the generated types carry.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::mem;
use std::time::Duration;

use v4l::v4l2::vidioc;
use v4l::v4l_sys;

pub use v4l_sys::{
    v4l2_buffer, v4l2_capability, v4l2_control, v4l2_fmtdesc, v4l2_format, v4l2_frmsize_discrete,
    v4l2_frmsize_stepwise, v4l2_frmsizeenum, v4l2_pix_format, v4l2_queryctrl, v4l2_querymenu,
    v4l2_requestbuffers,
};

/// Numeric type of a request code.
pub type RequestCode = vidioc::_IOC_TYPE;

/// `V4L2_BUF_TYPE_VIDEO_CAPTURE`
pub const BUF_TYPE_VIDEO_CAPTURE: u32 = v4l_sys::v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE;
/// `V4L2_BUF_TYPE_VIDEO_OUTPUT`
pub const BUF_TYPE_VIDEO_OUTPUT: u32 = v4l_sys::v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_OUTPUT;

/// `V4L2_MEMORY_MMAP`
pub const MEMORY_MMAP: u32 = v4l_sys::v4l2_memory_V4L2_MEMORY_MMAP;
/// `V4L2_MEMORY_USERPTR`
pub const MEMORY_USERPTR: u32 = v4l_sys::v4l2_memory_V4L2_MEMORY_USERPTR;
/// `V4L2_MEMORY_DMABUF`
pub const MEMORY_DMABUF: u32 = v4l_sys::v4l2_memory_V4L2_MEMORY_DMABUF;

/// `V4L2_FIELD_NONE`, progressive frames.
pub const FIELD_NONE: u32 = v4l_sys::v4l2_field_V4L2_FIELD_NONE;

/// `V4L2_FRMSIZE_TYPE_DISCRETE`
pub const FRMSIZE_TYPE_DISCRETE: u32 = v4l_sys::v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_DISCRETE;
/// `V4L2_FRMSIZE_TYPE_CONTINUOUS`
pub const FRMSIZE_TYPE_CONTINUOUS: u32 = v4l_sys::v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_CONTINUOUS;
/// `V4L2_FRMSIZE_TYPE_STEPWISE`
pub const FRMSIZE_TYPE_STEPWISE: u32 = v4l_sys::v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_STEPWISE;

/// `V4L2_FMT_FLAG_COMPRESSED`
pub const FMT_FLAG_COMPRESSED: u32 = v4l_sys::V4L2_FMT_FLAG_COMPRESSED;
/// `V4L2_FMT_FLAG_EMULATED`
pub const FMT_FLAG_EMULATED: u32 = v4l_sys::V4L2_FMT_FLAG_EMULATED;

/// `V4L2_CTRL_FLAG_DISABLED`
pub const CTRL_FLAG_DISABLED: u32 = v4l_sys::V4L2_CTRL_FLAG_DISABLED;
/// `V4L2_CTRL_FLAG_NEXT_CTRL`, or'd into a control id to walk the list.
pub const CTRL_FLAG_NEXT_CTRL: u32 = v4l_sys::V4L2_CTRL_FLAG_NEXT_CTRL;

/// `V4L2_CTRL_TYPE_MENU`
pub const CTRL_TYPE_MENU: u32 = v4l_sys::v4l2_ctrl_type_V4L2_CTRL_TYPE_MENU;
/// `V4L2_CTRL_TYPE_INTEGER_MENU`
pub const CTRL_TYPE_INTEGER_MENU: u32 = v4l_sys::v4l2_ctrl_type_V4L2_CTRL_TYPE_INTEGER_MENU;

/// Kernel structures whose all-zero bit pattern is a valid value.
///
/// The kernel expects unused and reserved fields to be zero, so every
/// request structure starts out zeroed.
///
/// # Safety
///
/// Implementors must be plain C data: integers, arrays, unions and raw
/// pointers only.
pub unsafe trait Zeroed: Copy {
    /// All-zero value.
    fn zeroed() -> Self {
        // SAFETY: guaranteed by the implementor.
        unsafe { mem::zeroed() }
    }
}

// SAFETY: all of these are bindgen-generated C structures.
unsafe impl Zeroed for v4l2_buffer {}
unsafe impl Zeroed for v4l2_capability {}
unsafe impl Zeroed for v4l2_control {}
unsafe impl Zeroed for v4l2_fmtdesc {}
unsafe impl Zeroed for v4l2_format {}
unsafe impl Zeroed for v4l2_frmsizeenum {}
unsafe impl Zeroed for v4l2_pix_format {}
unsafe impl Zeroed for v4l2_queryctrl {}
unsafe impl Zeroed for v4l2_querymenu {}
unsafe impl Zeroed for v4l2_requestbuffers {}

/// Zeroed `v4l2_format` for buffer class `type_`.
pub fn new_format(type_: u32) -> v4l2_format {
    v4l2_format {
        type_,
        ..v4l2_format::zeroed()
    }
}

/// Single-planar view of a format payload.
pub fn pix(format: &v4l2_format) -> v4l2_pix_format {
    // SAFETY: formats start zeroed and every bit pattern is a valid
    // `v4l2_pix_format`.
    unsafe { format.fmt.pix }
}

/// Store a single-planar payload into a format.
pub fn set_pix(format: &mut v4l2_format, pix: v4l2_pix_format) {
    format.fmt.pix = pix;
}

/// Zeroed `v4l2_buffer` addressing slot `index`.
pub fn new_buffer(index: u32, type_: u32, memory: u32) -> v4l2_buffer {
    v4l2_buffer {
        index,
        type_,
        memory,
        ..v4l2_buffer::zeroed()
    }
}

/// Device-side location token of an mmap buffer.
pub fn buffer_offset(buf: &v4l2_buffer) -> u32 {
    // SAFETY: buffers start zeroed and `offset` is the member the kernel
    // fills for `V4L2_MEMORY_MMAP`.
    unsafe { buf.m.offset }
}

/// Set the mmap location token of a buffer.
pub fn set_buffer_offset(buf: &mut v4l2_buffer, offset: u32) {
    buf.m.offset = offset;
}

/// Capture timestamp of a dequeued buffer. Negative fields read as zero.
pub fn buffer_timestamp(buf: &v4l2_buffer) -> Duration {
    let secs = u64::try_from(buf.timestamp.tv_sec).unwrap_or(0);
    let micros = u32::try_from(buf.timestamp.tv_usec).unwrap_or(0);
    Duration::new(secs, 0) + Duration::from_micros(u64::from(micros))
}

/// Fixed size of a discrete frame-size entry.
pub fn discrete_size(raw: &v4l2_frmsizeenum) -> v4l2_frmsize_discrete {
    // SAFETY: the structure starts zeroed and both union members are
    // plain integers.
    unsafe { raw.__bindgen_anon_1.discrete }
}

/// Range of a stepwise or continuous frame-size entry.
pub fn stepwise_size(raw: &v4l2_frmsizeenum) -> v4l2_frmsize_stepwise {
    // SAFETY: as for `discrete_size`.
    unsafe { raw.__bindgen_anon_1.stepwise }
}

/// Label of a named menu entry.
pub fn menu_name(raw: &v4l2_querymenu) -> String {
    // copied out first, the structure is packed
    // SAFETY: the structure starts zeroed and the name is a byte array.
    let name = unsafe { raw.__bindgen_anon_1.name };
    c_string(&name)
}

/// Value of an integer menu entry.
pub fn menu_value(raw: &v4l2_querymenu) -> i64 {
    // SAFETY: as for `menu_name`.
    unsafe { raw.__bindgen_anon_1.value }
}

/// A control request together with the structure it fills in place.
pub enum Request<'a> {
    /// `VIDIOC_QUERYCAP`
    QueryCap(&'a mut v4l2_capability),
    /// `VIDIOC_ENUM_FMT`
    EnumFmt(&'a mut v4l2_fmtdesc),
    /// `VIDIOC_G_FMT`
    GetFmt(&'a mut v4l2_format),
    /// `VIDIOC_S_FMT`
    SetFmt(&'a mut v4l2_format),
    /// `VIDIOC_REQBUFS`
    ReqBufs(&'a mut v4l2_requestbuffers),
    /// `VIDIOC_QUERYBUF`
    QueryBuf(&'a mut v4l2_buffer),
    /// `VIDIOC_QBUF`
    QBuf(&'a mut v4l2_buffer),
    /// `VIDIOC_DQBUF`
    DqBuf(&'a mut v4l2_buffer),
    /// `VIDIOC_STREAMON`, carrying the buffer type.
    StreamOn(&'a mut u32),
    /// `VIDIOC_STREAMOFF`, carrying the buffer type.
    StreamOff(&'a mut u32),
    /// `VIDIOC_ENUM_FRAMESIZES`
    EnumFrameSizes(&'a mut v4l2_frmsizeenum),
    /// `VIDIOC_QUERYCTRL`
    QueryCtrl(&'a mut v4l2_queryctrl),
    /// `VIDIOC_QUERYMENU`
    QueryMenu(&'a mut v4l2_querymenu),
    /// `VIDIOC_G_CTRL`
    GetCtrl(&'a mut v4l2_control),
    /// `VIDIOC_S_CTRL`
    SetCtrl(&'a mut v4l2_control),
}

impl Request<'_> {
    /// Numeric request code passed to `ioctl(2)`.
    pub const fn code(&self) -> RequestCode {
        match self {
            Self::QueryCap(_) => vidioc::VIDIOC_QUERYCAP,
            Self::EnumFmt(_) => vidioc::VIDIOC_ENUM_FMT,
            Self::GetFmt(_) => vidioc::VIDIOC_G_FMT,
            Self::SetFmt(_) => vidioc::VIDIOC_S_FMT,
            Self::ReqBufs(_) => vidioc::VIDIOC_REQBUFS,
            Self::QueryBuf(_) => vidioc::VIDIOC_QUERYBUF,
            Self::QBuf(_) => vidioc::VIDIOC_QBUF,
            Self::DqBuf(_) => vidioc::VIDIOC_DQBUF,
            Self::StreamOn(_) => vidioc::VIDIOC_STREAMON,
            Self::StreamOff(_) => vidioc::VIDIOC_STREAMOFF,
            Self::EnumFrameSizes(_) => vidioc::VIDIOC_ENUM_FRAMESIZES,
            Self::QueryCtrl(_) => vidioc::VIDIOC_QUERYCTRL,
            Self::QueryMenu(_) => vidioc::VIDIOC_QUERYMENU,
            Self::GetCtrl(_) => vidioc::VIDIOC_G_CTRL,
            Self::SetCtrl(_) => vidioc::VIDIOC_S_CTRL,
        }
    }

    /// Request name, for logs and errors.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::QueryCap(_) => "VIDIOC_QUERYCAP",
            Self::EnumFmt(_) => "VIDIOC_ENUM_FMT",
            Self::GetFmt(_) => "VIDIOC_G_FMT",
            Self::SetFmt(_) => "VIDIOC_S_FMT",
            Self::ReqBufs(_) => "VIDIOC_REQBUFS",
            Self::QueryBuf(_) => "VIDIOC_QUERYBUF",
            Self::QBuf(_) => "VIDIOC_QBUF",
            Self::DqBuf(_) => "VIDIOC_DQBUF",
            Self::StreamOn(_) => "VIDIOC_STREAMON",
            Self::StreamOff(_) => "VIDIOC_STREAMOFF",
            Self::EnumFrameSizes(_) => "VIDIOC_ENUM_FRAMESIZES",
            Self::QueryCtrl(_) => "VIDIOC_QUERYCTRL",
            Self::QueryMenu(_) => "VIDIOC_QUERYMENU",
            Self::GetCtrl(_) => "VIDIOC_G_CTRL",
            Self::SetCtrl(_) => "VIDIOC_S_CTRL",
        }
    }

    /// Pointer to the request structure, for handing to the kernel.
    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        match self {
            Self::QueryCap(r) => erase(&mut **r),
            Self::EnumFmt(r) => erase(&mut **r),
            Self::GetFmt(r) | Self::SetFmt(r) => erase(&mut **r),
            Self::ReqBufs(r) => erase(&mut **r),
            Self::QueryBuf(r) | Self::QBuf(r) | Self::DqBuf(r) => erase(&mut **r),
            Self::StreamOn(r) | Self::StreamOff(r) => erase(&mut **r),
            Self::EnumFrameSizes(r) => erase(&mut **r),
            Self::QueryCtrl(r) => erase(&mut **r),
            Self::QueryMenu(r) => erase(&mut **r),
            Self::GetCtrl(r) | Self::SetCtrl(r) => erase(&mut **r),
        }
    }
}

fn erase<T>(value: &mut T) -> *mut c_void {
    std::ptr::from_mut(value).cast()
}

/// Convert a NUL-terminated fixed-size C string into an owned `String`.
pub fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(bytes.get(..end).unwrap_or_default()).into_owned()
}
