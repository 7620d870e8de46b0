//! Structural checks on captured frames.
//!
//! These look at frame metadata and container markers only; payloads are
//! never decoded.

use std::fmt;

use crate::traits::Frame;

/// Why a frame failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No frames to check.
    EmptySequence,
    /// Sequence numbers skip.
    SequenceGap {
        /// Position in the slice.
        index: usize,
        /// Expected sequence number.
        expected: u32,
        /// Actual sequence number.
        actual: u32,
    },
    /// Payload is not a JPEG image.
    NotJpeg,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySequence => write!(f, "Cannot validate empty frame sequence"),
            Self::SequenceGap {
                index,
                expected,
                actual,
            } => write!(f, "Frame sequence gap at index {index}: expected {expected}, got {actual}"),
            Self::NotJpeg => write!(f, "Payload lacks JPEG start/end markers"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validation result.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Check that sequence numbers increase by one with no gaps.
pub fn validate_frame_sequence(frames: &[Frame]) -> Result<()> {
    if frames.is_empty() {
        return Err(ValidationError::EmptySequence);
    }
    for (index, pair) in frames.windows(2).enumerate() {
        if let [prev, curr] = pair {
            let expected = prev.metadata.sequence.wrapping_add(1);
            if curr.metadata.sequence != expected {
                return Err(ValidationError::SequenceGap {
                    index: index + 1,
                    expected,
                    actual: curr.metadata.sequence,
                });
            }
        }
    }
    Ok(())
}

/// Check that a payload starts with a JPEG start-of-image marker and carries
/// an end-of-image marker.
pub fn validate_jpeg(frame: &Frame) -> Result<()> {
    let has_eoi = frame.data.windows(2).any(|w| w == [0xFF, 0xD9]);
    if frame.is_jpeg() && has_eoi {
        Ok(())
    } else {
        Err(ValidationError::NotJpeg)
    }
}
