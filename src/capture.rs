//! Frame acquisition: wait, dequeue, copy out, re-enqueue.

use log::trace;
use std::time::Duration;

use crate::error::{CameraError, Result};
use crate::ring::BufferRing;
use crate::stream::StreamController;
use crate::traits::{ControlChannel, Frame, FrameMetadata};

/// Acquire one frame from a streaming ring.
///
/// Nothing is dequeued when the wait times out or the dequeue fails, so the
/// ring is unchanged. The payload is copied before the slot goes back to the
/// driver; a failure to return it is reported as
/// [`CameraError::RingConsistency`].
pub fn grab_frame<C: ControlChannel>(
    channel: &mut C,
    ring: &mut BufferRing<C::Region>,
    stream: &StreamController,
    timeout: Duration,
) -> Result<Frame> {
    if !stream.is_streaming() {
        return Err(CameraError::InvalidState("not streaming"));
    }

    let ready = channel
        .wait_ready(timeout)
        .map_err(|err| CameraError::from_os("poll", err))?;
    if !ready {
        return Err(CameraError::Timeout(timeout));
    }

    let dequeued = ring.dequeue(channel)?;
    let data = ring.copy_out(&dequeued);
    let metadata = FrameMetadata {
        index: dequeued.index(),
        sequence: dequeued.sequence(),
        timestamp: dequeued.timestamp(),
        bytes_used: dequeued.bytes_used(),
    };
    ring.enqueue(channel, dequeued)?;

    trace!(
        "frame {} from buffer {}: {} bytes",
        metadata.sequence,
        metadata.index,
        data.len()
    );
    Ok(Frame { data, metadata })
}
