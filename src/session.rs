//! Capture session: the open/close lifecycle around one device.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

use crate::capability::{self, FormatIter, FrameSizeIter};
use crate::capture;
use crate::config::SessionConfig;
use crate::control::{self, ControlId, ControlInfo, MenuItem};
use crate::device::DeviceChannel;
use crate::error::{CameraError, Result};
use crate::format;
use crate::fourcc::FourCC;
use crate::ring::{self, BufferRing, Ownership};
use crate::stream::{StreamController, StreamState};
use crate::traits::{
    BufferClass, ControlChannel, DeviceCapabilities, Frame, FrameGeometry, MappedRegion, MemoryKind,
};

/// An open capture device with a negotiated format and a mapped buffer ring.
///
/// Streaming starts stopped. Closing (explicitly or on drop) stops the
/// stream, unmaps and releases the ring, then closes the handle.
///
/// ```no_run
/// use v4l2_grab::{Camera, FourCC, SessionConfig};
///
/// let config = SessionConfig::new("/dev/video0")
///     .with_pixel_format(FourCC::JPEG)
///     .with_size(1024, 768);
/// let mut camera = Camera::open(&config)?;
/// camera.stream_on()?;
/// let frame = camera.grab_frame()?;
/// assert!(frame.is_jpeg());
/// camera.close()?;
/// # Ok::<(), v4l2_grab::CameraError>(())
/// ```
pub struct Camera<C: ControlChannel = DeviceChannel> {
    channel: C,
    path: PathBuf,
    class: BufferClass,
    capability: DeviceCapabilities,
    geometry: FrameGeometry,
    ring: Option<BufferRing<C::Region>>,
    stream: StreamController,
    ready_timeout: Duration,
    stuck_slot: Option<u32>,
    closed: bool,
}

impl Camera<DeviceChannel> {
    /// Open the device node named by `config` and prepare it for capture.
    pub fn open(config: &SessionConfig) -> Result<Self> {
        check_memory(config.memory)?;
        let channel =
            DeviceChannel::open(&config.path).map_err(|err| CameraError::from_os("open", err))?;
        Self::with_channel(channel, config)
    }
}

fn check_memory(memory: MemoryKind) -> Result<()> {
    if memory == MemoryKind::Mmap {
        Ok(())
    } else {
        Err(CameraError::Unsupported(format!(
            "{memory:?} buffers; sessions use mmap"
        )))
    }
}

struct Prepared<R: MappedRegion> {
    capability: DeviceCapabilities,
    geometry: FrameGeometry,
    ring: BufferRing<R>,
}

impl<C: ControlChannel> Camera<C> {
    /// Prepare a session over an already open control channel.
    ///
    /// On failure the channel is closed before the error is returned.
    pub fn with_channel(mut channel: C, config: &SessionConfig) -> Result<Self> {
        let prepared = match check_memory(config.memory).and_then(|()| prepare(&mut channel, config)) {
            Ok(prepared) => prepared,
            Err(err) => {
                if let Err(close_err) = channel.close() {
                    warn!("closing {} after failed open: {close_err}", config.path.display());
                }
                return Err(err);
            }
        };

        info!(
            "opened {}: {} ({}), {} {}x{}, {} buffers",
            config.path.display(),
            prepared.capability.card,
            prepared.capability.driver,
            prepared.geometry.pixel_format,
            prepared.geometry.width,
            prepared.geometry.height,
            prepared.ring.len()
        );

        Ok(Self {
            channel,
            path: config.path.clone(),
            class: config.buffer_class,
            capability: prepared.capability,
            geometry: prepared.geometry,
            ring: Some(prepared.ring),
            stream: StreamController::new(config.buffer_class),
            ready_timeout: config.ready_timeout,
            stuck_slot: None,
            closed: false,
        })
    }

    fn channel(&mut self) -> Result<&mut C> {
        if self.closed {
            Err(CameraError::Closed)
        } else {
            Ok(&mut self.channel)
        }
    }

    fn check_consistent(&self) -> Result<()> {
        match self.stuck_slot {
            Some(index) => Err(CameraError::RingConsistency {
                index,
                source: io::Error::other("buffer was never returned to the driver"),
            }),
            None => Ok(()),
        }
    }

    /// Start streaming.
    pub fn stream_on(&mut self) -> Result<()> {
        if self.closed {
            return Err(CameraError::Closed);
        }
        self.check_consistent()?;
        if self.stream.is_streaming() {
            return Err(CameraError::InvalidState("already streaming"));
        }
        // slots come back application-owned after a stream off
        if let Some(ring) = self.ring.as_mut() {
            ring.requeue_all(&mut self.channel)?;
        }
        self.stream.start(&mut self.channel, self.ring.as_ref())
    }

    /// Stop streaming. A no-op when already stopped.
    pub fn stream_off(&mut self) -> Result<()> {
        if self.closed {
            return Err(CameraError::Closed);
        }
        if !self.stream.is_streaming() {
            return Ok(());
        }
        self.stream.stop(&mut self.channel)?;
        if let Some(ring) = self.ring.as_mut() {
            ring.reclaim_all();
        }
        Ok(())
    }

    /// Wait for, copy out and return the next frame.
    ///
    /// After a [`CameraError::RingConsistency`] failure the session is
    /// degraded and every later call fails the same way; close and reopen.
    pub fn grab_frame(&mut self) -> Result<Frame> {
        if self.closed {
            return Err(CameraError::Closed);
        }
        self.check_consistent()?;
        let Some(ring) = self.ring.as_mut() else {
            return Err(CameraError::InvalidState("no buffer ring"));
        };
        let result = capture::grab_frame(&mut self.channel, ring, &self.stream, self.ready_timeout);
        if let Err(CameraError::RingConsistency { index, .. }) = &result {
            warn!("buffer {index} stuck; session degraded");
            self.stuck_slot = Some(*index);
        }
        result
    }

    /// Stop, release the ring and close the handle.
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned. Closing an already closed session does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut first: Option<CameraError> = None;

        if let Err(err) = self.stream.stop(&mut self.channel) {
            warn!("stream off while closing {}: {err}", self.path.display());
        }

        if let Some(ring) = self.ring.take() {
            if let Err(err) = ring::unmap_buffers(ring) {
                first.get_or_insert(err);
            }
            if let Err(err) = ring::request_buffers(&mut self.channel, 0, self.class, MemoryKind::Mmap) {
                warn!("releasing buffers of {}: {err}", self.path.display());
                first.get_or_insert(err);
            }
        }

        if let Err(err) = self.channel.close() {
            warn!("closing {}: {err}", self.path.display());
            first.get_or_insert(CameraError::from_os("close", err));
        }

        info!("closed {}", self.path.display());
        first.map_or(Ok(()), Err)
    }

    /// Device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Driver name.
    pub fn driver(&self) -> &str {
        &self.capability.driver
    }

    /// Card name.
    pub fn card(&self) -> &str {
        &self.capability.card
    }

    /// Bus location.
    pub fn bus_info(&self) -> &str {
        &self.capability.bus_info
    }

    /// Capabilities captured at open.
    pub const fn capability(&self) -> &DeviceCapabilities {
        &self.capability
    }

    /// Geometry the device accepted at open.
    pub const fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// Number of buffers in the ring.
    pub fn buffer_count(&self) -> usize {
        self.ring.as_ref().map_or(0, BufferRing::len)
    }

    /// Ownership tag of every ring slot.
    pub fn ownerships(&self) -> Vec<Ownership> {
        self.ring.as_ref().map(BufferRing::ownerships).unwrap_or_default()
    }

    /// Streaming state.
    pub const fn stream_state(&self) -> StreamState {
        self.stream.state()
    }

    /// Whether a buffer could not be returned to the driver.
    pub const fn is_degraded(&self) -> bool {
        self.stuck_slot.is_some()
    }

    /// Whether the session has been closed.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Query identity and capabilities again.
    pub fn query_capabilities(&mut self) -> Result<DeviceCapabilities> {
        capability::query_capabilities(self.channel()?)
    }

    /// Lazily enumerate the formats on the session's buffer class.
    pub fn enumerate_formats(&mut self) -> Result<FormatIter<'_, C>> {
        let class = self.class;
        Ok(capability::enumerate_formats(self.channel()?, class))
    }

    /// Lazily enumerate the frame sizes of `pixel_format`.
    pub fn enumerate_frame_sizes(&mut self, pixel_format: FourCC) -> Result<FrameSizeIter<'_, C>> {
        Ok(capability::enumerate_frame_sizes(self.channel()?, pixel_format))
    }

    /// Whether `pixel_format` is offered.
    pub fn has_format(&mut self, pixel_format: FourCC) -> Result<bool> {
        let class = self.class;
        capability::has_format(self.channel()?, class, pixel_format)
    }

    /// Whether a format with this exact description is offered.
    pub fn has_format_description(&mut self, description: &str) -> Result<bool> {
        let class = self.class;
        capability::has_format_description(self.channel()?, class, description)
    }

    /// Descriptions of every offered format.
    pub fn format_descriptions(&mut self) -> Result<Vec<String>> {
        let class = self.class;
        capability::format_descriptions(self.channel()?, class)
    }

    /// Whether `width` x `height` is supported for `pixel_format`.
    pub fn supports_frame_size(&mut self, pixel_format: FourCC, width: u32, height: u32) -> Result<bool> {
        capability::supports_frame_size(self.channel()?, pixel_format, width, height)
    }

    /// Format currently applied by the device.
    pub fn get_format(&mut self) -> Result<FrameGeometry> {
        let class = self.class;
        format::get_format(self.channel()?, class)
    }

    /// Enabled controls.
    pub fn query_controls(&mut self) -> Result<Vec<ControlInfo>> {
        control::query_controls(self.channel()?)
    }

    /// Items of a menu control.
    pub fn query_menus(&mut self, control: &ControlInfo) -> Result<Vec<MenuItem>> {
        control::query_menus(self.channel()?, control)
    }

    /// Current value of a control.
    pub fn get_control(&mut self, id: ControlId) -> Result<i32> {
        control::get_control(self.channel()?, id)
    }

    /// Set a control; returns the applied value.
    pub fn set_control(&mut self, id: ControlId, value: i32) -> Result<i32> {
        control::set_control(self.channel()?, id, value)
    }
}

fn prepare<C: ControlChannel>(channel: &mut C, config: &SessionConfig) -> Result<Prepared<C::Region>> {
    let capability = capability::query_capabilities(channel)?;
    if !capability.can_stream() {
        return Err(CameraError::Unsupported(format!(
            "{} has no streaming I/O",
            capability.card
        )));
    }

    let geometry = format::set_format(
        channel,
        config.buffer_class,
        config.pixel_format,
        config.width,
        config.height,
    )?;

    let granted = ring::request_buffers(channel, config.buffer_count, config.buffer_class, MemoryKind::Mmap)?;
    let mapped = if granted == 0 {
        Err(CameraError::InvalidState("driver granted no buffers"))
    } else {
        ring::map_buffers(channel, granted, config.buffer_class)
    };
    match mapped {
        Ok(ring) => Ok(Prepared {
            capability,
            geometry,
            ring,
        }),
        Err(err) => {
            if let Err(release_err) = ring::request_buffers(channel, 0, config.buffer_class, MemoryKind::Mmap) {
                warn!("releasing buffers after failed map: {release_err}");
            }
            debug!("open of {} failed: {err}", config.path.display());
            Err(err)
        }
    }
}

impl<C: ControlChannel> Drop for Camera<C> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("closing {} on drop: {err}", self.path.display());
        }
    }
}

impl<C: ControlChannel> std::fmt::Debug for Camera<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("path", &self.path)
            .field("card", &self.capability.card)
            .field("geometry", &self.geometry)
            .field("buffers", &self.buffer_count())
            .field("stream", &self.stream.state())
            .field("degraded", &self.is_degraded())
            .field("closed", &self.closed)
            .finish()
    }
}
