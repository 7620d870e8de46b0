//! Pixel-format codes.

use std::fmt;

/// Pixel format representation (e.g., YUYV, MJPG, RGB3).
///
/// The numeric form packs the first character into the least significant
/// byte, as the kernel's `v4l2_fourcc` macro does.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// UYVY pixel format (4:2:2 packed).
    pub const UYVY: Self = Self::new(b"UYVY");
    /// MJPEG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
    /// JFIF JPEG pixel format.
    pub const JPEG: Self = Self::new(b"JPEG");
    /// RGB3 pixel format (24-bit RGB).
    pub const RGB3: Self = Self::new(b"RGB3");
    /// BGR3 pixel format (24-bit BGR).
    pub const BGR3: Self = Self::new(b"BGR3");
    /// 16-bit RGB 5-6-5.
    pub const RGBP: Self = Self::new(b"RGBP");
    /// 8-bit greyscale.
    pub const GREY: Self = Self::new(b"GREY");
    /// Y/UV 4:2:0 semi-planar.
    pub const NV12: Self = Self::new(b"NV12");
    /// Planar YUV 4:2:0.
    pub const YU12: Self = Self::new(b"YU12");
    /// 8-bit Bayer BGGR.
    pub const BA81: Self = Self::new(b"BA81");
    /// H.264 elementary stream.
    pub const H264: Self = Self::new(b"H264");

    /// Numeric code as carried in kernel structures.
    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Decode a numeric code.
    pub const fn from_u32(code: u32) -> Self {
        Self(code.to_le_bytes())
    }

    /// Human-readable name for well-known formats.
    pub fn name(self) -> Option<&'static str> {
        KNOWN_FORMATS
            .iter()
            .find(|(code, _)| *code == self)
            .map(|(_, name)| *name)
    }

    /// Whether the payload is a compressed bitstream rather than raw pixels.
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::MJPG | Self::JPEG | Self::H264)
    }
}

const KNOWN_FORMATS: &[(FourCC, &str)] = &[
    (FourCC::YUYV, "YUYV 4:2:2"),
    (FourCC::UYVY, "UYVY 4:2:2"),
    (FourCC::MJPG, "Motion-JPEG"),
    (FourCC::JPEG, "JFIF JPEG"),
    (FourCC::RGB3, "24-bit RGB 8-8-8"),
    (FourCC::BGR3, "24-bit BGR 8-8-8"),
    (FourCC::RGBP, "16-bit RGB 5-6-5"),
    (FourCC::GREY, "8-bit Greyscale"),
    (FourCC::NV12, "Y/UV 4:2:0"),
    (FourCC::YU12, "Planar YUV 4:2:0"),
    (FourCC::BA81, "8-bit Bayer BGBG/GRGR"),
    (FourCC::H264, "H.264"),
];

impl From<u32> for FourCC {
    fn from(code: u32) -> Self {
        Self::from_u32(code)
    }
}

impl From<FourCC> for u32 {
    fn from(fourcc: FourCC) -> Self {
        fourcc.to_u32()
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            write!(f, "{}", b.escape_ascii())?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FourCC").field(&format_args!("{self}")).finish()
    }
}
