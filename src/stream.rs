//! Streaming on/off state machine.

use log::debug;

use crate::error::{CameraError, Result};
use crate::ring::BufferRing;
use crate::sys::Request;
use crate::traits::{BufferClass, ControlChannel, MappedRegion};

/// Whether queued buffers are being filled by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Not capturing. Initial state.
    #[default]
    Stopped,
    /// Capturing into queued buffers.
    Streaming,
}

/// Gate for dequeue/enqueue traffic on one buffer class.
#[derive(Debug)]
pub struct StreamController {
    class: BufferClass,
    state: StreamState,
}

impl StreamController {
    /// New controller in the stopped state.
    pub const fn new(class: BufferClass) -> Self {
        Self {
            class,
            state: StreamState::Stopped,
        }
    }

    /// Current state.
    pub const fn state(&self) -> StreamState {
        self.state
    }

    /// Whether the device is streaming.
    pub fn is_streaming(&self) -> bool {
        self.state == StreamState::Streaming
    }

    /// Start streaming.
    ///
    /// Requires a non-empty ring with every slot queued to the driver. The
    /// state stays `Stopped` if the device refuses.
    pub fn start<C: ControlChannel, R: MappedRegion>(
        &mut self,
        channel: &mut C,
        ring: Option<&BufferRing<R>>,
    ) -> Result<()> {
        if self.is_streaming() {
            return Err(CameraError::InvalidState("already streaming"));
        }
        let Some(ring) = ring else {
            return Err(CameraError::InvalidState("no buffer ring"));
        };
        if ring.is_empty() {
            return Err(CameraError::InvalidState("buffer ring is empty"));
        }
        if !ring.all_driver_owned() {
            return Err(CameraError::InvalidState("buffers held by the application"));
        }

        let mut buf_type = self.class.as_raw();
        channel
            .send(Request::StreamOn(&mut buf_type))
            .map_err(|err| CameraError::from_os("VIDIOC_STREAMON", err))?;
        self.state = StreamState::Streaming;
        debug!("stream on");
        Ok(())
    }

    /// Stop streaming. A no-op when already stopped.
    ///
    /// If the device refuses, the state stays `Streaming`: the driver may
    /// still own the buffers, so they are not safe to unmap.
    pub fn stop<C: ControlChannel>(&mut self, channel: &mut C) -> Result<()> {
        if !self.is_streaming() {
            return Ok(());
        }
        let mut buf_type = self.class.as_raw();
        channel
            .send(Request::StreamOff(&mut buf_type))
            .map_err(|err| CameraError::from_os("VIDIOC_STREAMOFF", err))?;
        self.state = StreamState::Stopped;
        debug!("stream off");
        Ok(())
    }
}
