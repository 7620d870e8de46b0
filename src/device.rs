//! V4L2 device node implementation of the control channel.

#![allow(unsafe_code)]

use std::fs::OpenOptions;
use std::io;
use std::mem::ManuallyDrop;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::time::Duration;

use log::{trace, warn};
use v4l::v4l2;

use crate::sys::Request;
use crate::traits::{ControlChannel, MappedRegion};

/// Control channel backed by an open `/dev/video*` node.
#[derive(Debug)]
pub struct DeviceChannel {
    path: PathBuf,
    fd: Option<OwnedFd>,
}

impl DeviceChannel {
    /// Open a V4L2 device node for non-blocking read/write access.
    ///
    /// Readiness is waited for with [`ControlChannel::wait_ready`], so a
    /// dequeue with no finished buffer fails with `EAGAIN` instead of
    /// blocking.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)?;
        Ok(Self {
            path,
            fd: Some(OwnedFd::from(file)),
        })
    }

    /// Path the channel was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn raw_fd(&self) -> io::Result<RawFd> {
        self.fd
            .as_ref()
            .map(AsRawFd::as_raw_fd)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }
}

impl ControlChannel for DeviceChannel {
    type Region = MmapRegion;

    fn send(&mut self, mut request: Request<'_>) -> io::Result<()> {
        let fd = self.raw_fd()?;
        let code = request.code();
        trace!("{} on fd {fd}", request.name());
        loop {
            // SAFETY: `code` is the request matching the structure behind
            // the pointer, which stays mutably borrowed for the call.
            match unsafe { v4l2::ioctl(fd, code, request.as_mut_ptr()) } {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                result => return result,
            }
        }
    }

    fn map(&mut self, offset: u32, length: usize) -> io::Result<MmapRegion> {
        let fd = self.raw_fd()?;
        let offset = libc::off_t::try_from(offset)
            .map_err(|_| io::Error::from_raw_os_error(libc::EOVERFLOW))?;
        // SAFETY: a fresh shared mapping chosen by the kernel; no existing
        // memory is aliased.
        let addr = unsafe {
            v4l2::mmap(
                ptr::null_mut(),
                length,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                offset,
            )
        }?;
        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOMEM))?;
        Ok(MmapRegion { ptr, len: length })
    }

    fn wait_ready(&mut self, timeout: Duration) -> io::Result<bool> {
        let fd = self.raw_fd()?;
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        loop {
            // SAFETY: `pfd` is a single valid pollfd for the call's duration.
            let ret = unsafe { libc::poll(&mut pfd, 1, millis) };
            match ret {
                -1 => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err);
                    }
                }
                0 => return Ok(false),
                _ => {
                    if pfd.revents & libc::POLLNVAL != 0 {
                        return Err(io::Error::from_raw_os_error(libc::EBADF));
                    }
                    if pfd.revents & libc::POLLIN == 0 {
                        // POLLERR or POLLHUP with no finished buffer
                        return Err(io::Error::from_raw_os_error(libc::EIO));
                    }
                    return Ok(true);
                }
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        // dropping the descriptor closes it
        self.fd.take();
        Ok(())
    }
}

/// A shared mapping of one driver buffer.
#[derive(Debug)]
pub struct MmapRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the region is plain shared memory owned by this value; moving it to
// another thread moves that ownership with it.
unsafe impl Send for MmapRegion {}

impl MmapRegion {
    fn release(&self) -> io::Result<()> {
        // SAFETY: `ptr`/`len` are exactly what `mmap` returned and the region
        // is released at most once (`unmap` suppresses `Drop`).
        unsafe { v4l2::munmap(self.ptr.as_ptr().cast(), self.len) }
    }
}

impl MappedRegion for MmapRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_prefix(&self, len: usize) -> Vec<u8> {
        let len = len.min(self.len);
        // SAFETY: the mapping is valid for `self.len` bytes until unmapped,
        // and the ring only calls this for an application-owned slot.
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), len) };
        bytes.to_vec()
    }

    fn unmap(self) -> io::Result<()> {
        let region = ManuallyDrop::new(self);
        region.release()
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!("munmap of {} bytes failed: {err}", self.len);
        }
    }
}
