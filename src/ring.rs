//! Buffer ring shared with the driver.
//!
//! Every slot carries an ownership tag. A slot is `Application` owned only
//! between a successful dequeue and the matching enqueue; its memory can be
//! read only through the [`DequeuedSlot`] token that the dequeue hands out.

use std::io;
use std::time::Duration;

use log::{debug, warn};

use crate::error::{CameraError, Result};
use crate::sys::{self, v4l2_buffer, v4l2_requestbuffers, Request, Zeroed};
use crate::traits::{BufferClass, ControlChannel, MappedRegion, MemoryKind};

/// Which side may touch a slot's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Queued to the driver; the application must not read or write it.
    Driver,
    /// Dequeued by the application.
    Application,
}

#[derive(Debug)]
struct Slot<R> {
    index: u32,
    length: usize,
    ownership: Ownership,
    region: R,
}

/// Proof that a slot was dequeued and is application-owned.
///
/// Only [`BufferRing::dequeue`] creates one, and [`BufferRing::enqueue`]
/// consumes it.
#[derive(Debug)]
#[must_use = "a dequeued slot must be enqueued again"]
pub struct DequeuedSlot {
    index: u32,
    bytes_used: u32,
    sequence: u32,
    timestamp: Duration,
}

impl DequeuedSlot {
    /// Ring index of the slot.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Valid payload bytes the driver reported.
    pub const fn bytes_used(&self) -> u32 {
        self.bytes_used
    }

    /// Driver frame sequence number.
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Capture timestamp.
    pub const fn timestamp(&self) -> Duration {
        self.timestamp
    }
}

/// Fixed set of mapped buffers exchanged with the driver.
#[derive(Debug)]
pub struct BufferRing<R: MappedRegion> {
    class: BufferClass,
    memory: MemoryKind,
    slots: Vec<Slot<R>>,
}

/// Ask the driver for `count` buffers; returns how many it granted.
///
/// A count of zero releases the driver-side reservation.
pub fn request_buffers<C: ControlChannel>(
    channel: &mut C,
    count: u32,
    class: BufferClass,
    memory: MemoryKind,
) -> Result<u32> {
    let mut req = v4l2_requestbuffers {
        count,
        type_: class.as_raw(),
        memory: memory.as_raw(),
        ..v4l2_requestbuffers::zeroed()
    };
    channel
        .send(Request::ReqBufs(&mut req))
        .map_err(|err| CameraError::from_os("VIDIOC_REQBUFS", err))?;
    if count > 0 && req.count < count {
        debug!("requested {count} buffers, driver granted {}", req.count);
    }
    Ok(req.count)
}

/// Map `granted` driver buffers and queue each of them to the driver.
///
/// On failure every mapping made so far is released before the error is
/// returned. The driver-side reservation is left to the caller.
pub fn map_buffers<C: ControlChannel>(
    channel: &mut C,
    granted: u32,
    class: BufferClass,
) -> Result<BufferRing<C::Region>> {
    let mut ring = BufferRing {
        class,
        memory: MemoryKind::Mmap,
        slots: Vec::with_capacity(granted as usize),
    };

    for index in 0..granted {
        match map_slot(channel, index, class) {
            Ok(slot) => ring.slots.push(slot),
            Err(err) => {
                discard(ring);
                return Err(err);
            }
        }
    }

    for index in 0..granted {
        if let Err(err) = ring.queue(channel, index) {
            discard(ring);
            return Err(CameraError::from_os("VIDIOC_QBUF", err));
        }
    }

    debug!("mapped {granted} buffers");
    Ok(ring)
}

fn map_slot<C: ControlChannel>(
    channel: &mut C,
    index: u32,
    class: BufferClass,
) -> Result<Slot<C::Region>> {
    let mut buf = sys::new_buffer(index, class.as_raw(), MemoryKind::Mmap.as_raw());
    channel
        .send(Request::QueryBuf(&mut buf))
        .map_err(|err| CameraError::from_os("VIDIOC_QUERYBUF", err))?;
    let length = buf.length as usize;
    let region = channel
        .map(sys::buffer_offset(&buf), length)
        .map_err(|err| CameraError::from_os("mmap", err))?;
    debug!("buffer {index}: {length} bytes at offset {:#x}", sys::buffer_offset(&buf));
    Ok(Slot {
        index,
        length,
        ownership: Ownership::Application,
        region,
    })
}

fn discard<R: MappedRegion>(ring: BufferRing<R>) {
    if let Err(err) = unmap_buffers(ring) {
        warn!("unwinding partial buffer ring: {err}");
    }
}

/// Unmap every slot of `ring`.
///
/// All slots are attempted; the first failure is the one reported.
pub fn unmap_buffers<R: MappedRegion>(ring: BufferRing<R>) -> Result<()> {
    let mut first = None;
    for slot in ring.slots {
        if let Err(err) = slot.region.unmap() {
            warn!("munmap of buffer {} failed: {err}", slot.index);
            first.get_or_insert(CameraError::from_os("munmap", err));
        }
    }
    first.map_or(Ok(()), Err)
}

impl<R: MappedRegion> BufferRing<R> {
    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the ring has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Buffer class the ring serves.
    pub const fn class(&self) -> BufferClass {
        self.class
    }

    /// Ownership tag of slot `index`.
    pub fn ownership(&self, index: u32) -> Option<Ownership> {
        self.slot(index).map(|slot| slot.ownership)
    }

    /// Mapped length of slot `index`.
    pub fn slot_len(&self, index: u32) -> Option<usize> {
        self.slot(index).map(|slot| slot.length)
    }

    /// Ownership tag of every slot, in index order.
    pub fn ownerships(&self) -> Vec<Ownership> {
        self.slots.iter().map(|slot| slot.ownership).collect()
    }

    /// Whether every slot is queued to the driver.
    pub fn all_driver_owned(&self) -> bool {
        self.slots
            .iter()
            .all(|slot| slot.ownership == Ownership::Driver)
    }

    fn slot(&self, index: u32) -> Option<&Slot<R>> {
        self.slots.get(index as usize)
    }

    fn slot_mut(&mut self, index: u32) -> Option<&mut Slot<R>> {
        self.slots.get_mut(index as usize)
    }

    fn raw_buffer(&self, index: u32) -> v4l2_buffer {
        sys::new_buffer(index, self.class.as_raw(), self.memory.as_raw())
    }

    fn queue<C: ControlChannel>(&mut self, channel: &mut C, index: u32) -> io::Result<()> {
        let mut buf = self.raw_buffer(index);
        channel.send(Request::QBuf(&mut buf))?;
        if let Some(slot) = self.slot_mut(index) {
            slot.ownership = Ownership::Driver;
        }
        Ok(())
    }

    /// Take the next completed slot from the driver.
    ///
    /// A dequeued index outside the ring is a [`CameraError::RingConsistency`]:
    /// the driver already considers that buffer handed out.
    pub fn dequeue<C: ControlChannel>(&mut self, channel: &mut C) -> Result<DequeuedSlot> {
        let mut buf = self.raw_buffer(0);
        channel
            .send(Request::DqBuf(&mut buf))
            .map_err(|err| CameraError::from_os("VIDIOC_DQBUF", err))?;

        let Some(slot) = self.slot_mut(buf.index) else {
            return Err(CameraError::RingConsistency {
                index: buf.index,
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("driver returned buffer {} outside the ring", buf.index),
                ),
            });
        };
        slot.ownership = Ownership::Application;
        Ok(DequeuedSlot {
            index: buf.index,
            bytes_used: buf.bytesused,
            sequence: buf.sequence,
            timestamp: sys::buffer_timestamp(&buf),
        })
    }

    /// Copy the valid payload of a dequeued slot.
    pub fn copy_out(&self, dequeued: &DequeuedSlot) -> Vec<u8> {
        self.slot(dequeued.index)
            .map(|slot| slot.region.copy_prefix(dequeued.bytes_used as usize))
            .unwrap_or_default()
    }

    /// Hand a dequeued slot back to the driver.
    ///
    /// On failure the slot stays application-owned and the ring can no longer
    /// be trusted.
    pub fn enqueue<C: ControlChannel>(&mut self, channel: &mut C, dequeued: DequeuedSlot) -> Result<()> {
        let index = dequeued.index;
        self.queue(channel, index)
            .map_err(|source| CameraError::RingConsistency { index, source })
    }

    /// Queue every application-owned slot, e.g. before restarting a stream.
    pub fn requeue_all<C: ControlChannel>(&mut self, channel: &mut C) -> Result<()> {
        let pending: Vec<u32> = self
            .slots
            .iter()
            .filter(|slot| slot.ownership == Ownership::Application)
            .map(|slot| slot.index)
            .collect();
        for index in pending {
            self.queue(channel, index)
                .map_err(|err| CameraError::from_os("VIDIOC_QBUF", err))?;
        }
        Ok(())
    }

    /// Record that the driver released every slot (after stream off).
    pub fn reclaim_all(&mut self) {
        for slot in &mut self.slots {
            slot.ownership = Ownership::Application;
        }
    }
}
