//! Device controls: discovery, menus and get/set.

use std::fmt;

use log::debug;

use crate::error::{CameraError, Result};
use crate::sys::{
    self, c_string, v4l2_control, v4l2_queryctrl, v4l2_querymenu, Request, Zeroed,
};
use crate::traits::ControlChannel;

/// Control identifier (`V4L2_CID_*`).
///
/// Drivers define private controls beyond the well-known ones, so any value
/// is accepted; [`ControlId::name`] resolves the well-known subset.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(pub u32);

const USER_BASE: u32 = 0x0098_0900;
const CAMERA_BASE: u32 = 0x009a_0900;

impl ControlId {
    /// Picture brightness.
    pub const BRIGHTNESS: Self = Self(USER_BASE);
    /// Picture contrast.
    pub const CONTRAST: Self = Self(USER_BASE + 1);
    /// Color saturation.
    pub const SATURATION: Self = Self(USER_BASE + 2);
    /// Hue.
    pub const HUE: Self = Self(USER_BASE + 3);
    /// Automatic white balance.
    pub const AUTO_WHITE_BALANCE: Self = Self(USER_BASE + 12);
    /// Red chroma balance.
    pub const RED_BALANCE: Self = Self(USER_BASE + 14);
    /// Blue chroma balance.
    pub const BLUE_BALANCE: Self = Self(USER_BASE + 15);
    /// Gamma adjust.
    pub const GAMMA: Self = Self(USER_BASE + 16);
    /// Exposure (user class).
    pub const EXPOSURE: Self = Self(USER_BASE + 17);
    /// Automatic gain.
    pub const AUTOGAIN: Self = Self(USER_BASE + 18);
    /// Gain.
    pub const GAIN: Self = Self(USER_BASE + 19);
    /// Mirror horizontally.
    pub const HFLIP: Self = Self(USER_BASE + 20);
    /// Mirror vertically.
    pub const VFLIP: Self = Self(USER_BASE + 21);
    /// Power line frequency filter (menu).
    pub const POWER_LINE_FREQUENCY: Self = Self(USER_BASE + 24);
    /// White balance temperature in Kelvin.
    pub const WHITE_BALANCE_TEMPERATURE: Self = Self(USER_BASE + 26);
    /// Sharpness.
    pub const SHARPNESS: Self = Self(USER_BASE + 27);
    /// Backlight compensation.
    pub const BACKLIGHT_COMPENSATION: Self = Self(USER_BASE + 28);
    /// Color effects (menu).
    pub const COLORFX: Self = Self(USER_BASE + 31);
    /// Rotation in degrees.
    pub const ROTATE: Self = Self(USER_BASE + 34);
    /// Minimum number of buffers the driver needs for capture.
    pub const MIN_BUFFERS_FOR_CAPTURE: Self = Self(USER_BASE + 39);
    /// Auto exposure mode (menu).
    pub const EXPOSURE_AUTO: Self = Self(CAMERA_BASE + 1);
    /// Exposure time in 100 us units.
    pub const EXPOSURE_ABSOLUTE: Self = Self(CAMERA_BASE + 2);
    /// Allow frame rate variation under auto exposure.
    pub const EXPOSURE_AUTO_PRIORITY: Self = Self(CAMERA_BASE + 3);
    /// Pan position.
    pub const PAN_ABSOLUTE: Self = Self(CAMERA_BASE + 8);
    /// Tilt position.
    pub const TILT_ABSOLUTE: Self = Self(CAMERA_BASE + 9);
    /// Focus position.
    pub const FOCUS_ABSOLUTE: Self = Self(CAMERA_BASE + 10);
    /// Continuous autofocus.
    pub const FOCUS_AUTO: Self = Self(CAMERA_BASE + 12);
    /// Zoom position.
    pub const ZOOM_ABSOLUTE: Self = Self(CAMERA_BASE + 13);

    /// Name of a well-known control.
    pub fn name(self) -> Option<&'static str> {
        KNOWN_CONTROLS
            .iter()
            .find(|(id, _)| *id == self)
            .map(|(_, name)| *name)
    }
}

const KNOWN_CONTROLS: &[(ControlId, &str)] = &[
    (ControlId::BRIGHTNESS, "Brightness"),
    (ControlId::CONTRAST, "Contrast"),
    (ControlId::SATURATION, "Saturation"),
    (ControlId::HUE, "Hue"),
    (ControlId::AUTO_WHITE_BALANCE, "White Balance, Automatic"),
    (ControlId::RED_BALANCE, "Red Balance"),
    (ControlId::BLUE_BALANCE, "Blue Balance"),
    (ControlId::GAMMA, "Gamma"),
    (ControlId::EXPOSURE, "Exposure"),
    (ControlId::AUTOGAIN, "Gain, Automatic"),
    (ControlId::GAIN, "Gain"),
    (ControlId::HFLIP, "Horizontal Flip"),
    (ControlId::VFLIP, "Vertical Flip"),
    (ControlId::POWER_LINE_FREQUENCY, "Power Line Frequency"),
    (ControlId::WHITE_BALANCE_TEMPERATURE, "White Balance Temperature"),
    (ControlId::SHARPNESS, "Sharpness"),
    (ControlId::BACKLIGHT_COMPENSATION, "Backlight Compensation"),
    (ControlId::COLORFX, "Color Effects"),
    (ControlId::ROTATE, "Rotate"),
    (ControlId::MIN_BUFFERS_FOR_CAPTURE, "Min Number of Capture Buffers"),
    (ControlId::EXPOSURE_AUTO, "Auto Exposure"),
    (ControlId::EXPOSURE_ABSOLUTE, "Exposure Time, Absolute"),
    (ControlId::EXPOSURE_AUTO_PRIORITY, "Exposure, Dynamic Framerate"),
    (ControlId::PAN_ABSOLUTE, "Pan, Absolute"),
    (ControlId::TILT_ABSOLUTE, "Tilt, Absolute"),
    (ControlId::FOCUS_ABSOLUTE, "Focus, Absolute"),
    (ControlId::FOCUS_AUTO, "Focus, Automatic Continuous"),
    (ControlId::ZOOM_ABSOLUTE, "Zoom, Absolute"),
];

impl fmt::Debug for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "ControlId({:#010x} {name:?})", self.0),
            None => write!(f, "ControlId({:#010x})", self.0),
        }
    }
}

/// Value type of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    /// Signed integer in a range.
    Integer,
    /// On/off.
    Boolean,
    /// Choice among named items.
    Menu,
    /// Action with no value.
    Button,
    /// 64-bit integer.
    Integer64,
    /// Control class marker, not a real control.
    Class,
    /// String value.
    String,
    /// Bit mask.
    Bitmask,
    /// Choice among integer items.
    IntegerMenu,
    /// Compound or otherwise unrecognized type.
    Other(u32),
}

impl ControlType {
    const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Integer,
            2 => Self::Boolean,
            sys::CTRL_TYPE_MENU => Self::Menu,
            4 => Self::Button,
            5 => Self::Integer64,
            6 => Self::Class,
            7 => Self::String,
            8 => Self::Bitmask,
            sys::CTRL_TYPE_INTEGER_MENU => Self::IntegerMenu,
            other => Self::Other(other),
        }
    }
}

/// Description of one device control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlInfo {
    /// Control identifier.
    pub id: ControlId,
    /// Value type.
    pub control_type: ControlType,
    /// Driver-supplied name.
    pub name: String,
    /// Lowest accepted value.
    pub minimum: i32,
    /// Highest accepted value.
    pub maximum: i32,
    /// Value granularity.
    pub step: i32,
    /// Value after reset.
    pub default_value: i32,
    /// Raw `V4L2_CTRL_FLAG_*` bits.
    pub flags: u32,
}

impl ControlInfo {
    /// Whether the control offers menu items.
    pub const fn is_menu(&self) -> bool {
        matches!(self.control_type, ControlType::Menu | ControlType::IntegerMenu)
    }
}

/// One item of a menu control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    /// Item of a [`ControlType::Menu`] control.
    Named {
        /// Value to set to select this item.
        index: u32,
        /// Item label.
        name: String,
    },
    /// Item of a [`ControlType::IntegerMenu`] control.
    Integer {
        /// Value to set to select this item.
        index: u32,
        /// Integer the item stands for.
        value: i64,
    },
}

/// Enumerate every enabled control the device offers.
pub fn query_controls<C: ControlChannel>(channel: &mut C) -> Result<Vec<ControlInfo>> {
    let mut controls = Vec::new();
    let mut next = sys::CTRL_FLAG_NEXT_CTRL;
    loop {
        let mut raw = v4l2_queryctrl {
            id: next,
            ..v4l2_queryctrl::zeroed()
        };
        match channel.send(Request::QueryCtrl(&mut raw)) {
            Ok(()) => {}
            Err(err) if err.raw_os_error() == Some(libc::EINVAL) => break,
            Err(err) => return Err(CameraError::from_os("VIDIOC_QUERYCTRL", err)),
        }
        next = raw.id | sys::CTRL_FLAG_NEXT_CTRL;
        if raw.flags & sys::CTRL_FLAG_DISABLED != 0 {
            continue;
        }
        controls.push(ControlInfo {
            id: ControlId(raw.id),
            control_type: ControlType::from_raw(raw.type_),
            name: c_string(&raw.name),
            minimum: raw.minimum,
            maximum: raw.maximum,
            step: raw.step,
            default_value: raw.default_value,
            flags: raw.flags,
        });
    }
    debug!("{} controls", controls.len());
    Ok(controls)
}

/// Items of a menu control.
///
/// Indices between the control's minimum and maximum that the driver does not
/// offer are skipped. Non-menu controls have no items.
pub fn query_menus<C: ControlChannel>(channel: &mut C, control: &ControlInfo) -> Result<Vec<MenuItem>> {
    let mut items = Vec::new();
    if !control.is_menu() {
        return Ok(items);
    }
    let (Ok(first), Ok(last)) = (u32::try_from(control.minimum), u32::try_from(control.maximum))
    else {
        return Ok(items);
    };
    for index in first..=last {
        let mut raw = v4l2_querymenu {
            id: control.id.0,
            index,
            ..v4l2_querymenu::zeroed()
        };
        match channel.send(Request::QueryMenu(&mut raw)) {
            Ok(()) => {}
            Err(err) if err.raw_os_error() == Some(libc::EINVAL) => continue,
            Err(err) => return Err(CameraError::from_os("VIDIOC_QUERYMENU", err)),
        }
        items.push(if control.control_type == ControlType::IntegerMenu {
            MenuItem::Integer {
                index,
                value: sys::menu_value(&raw),
            }
        } else {
            MenuItem::Named {
                index,
                name: sys::menu_name(&raw),
            }
        });
    }
    Ok(items)
}

/// Current value of control `id`.
pub fn get_control<C: ControlChannel>(channel: &mut C, id: ControlId) -> Result<i32> {
    let mut raw = v4l2_control { id: id.0, value: 0 };
    channel
        .send(Request::GetCtrl(&mut raw))
        .map_err(|err| CameraError::from_os("VIDIOC_G_CTRL", err))?;
    Ok(raw.value)
}

/// Set control `id`; returns the value the driver applied.
pub fn set_control<C: ControlChannel>(channel: &mut C, id: ControlId, value: i32) -> Result<i32> {
    let mut raw = v4l2_control { id: id.0, value };
    channel
        .send(Request::SetCtrl(&mut raw))
        .map_err(|err| CameraError::from_os("VIDIOC_S_CTRL", err))?;
    debug!("{id:?} set to {}", raw.value);
    Ok(raw.value)
}
