//! Simulated V4L2 driver for testing without hardware.
//!
//! [`MockChannel`] answers the same requests a capture driver does, keeps the
//! buffer queue the way the kernel would, and lets tests inject failures and
//! inspect what happened. Clones share one driver, so a test can keep a handle
//! after handing the channel to a session.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crate::fourcc::FourCC;
use crate::sys::{
    self, v4l2_buffer, v4l2_frmsize_discrete, v4l2_frmsize_stepwise, v4l2_pix_format, Request,
    Zeroed,
};
use crate::traits::{CapabilityFlags, ControlChannel, MappedRegion};

/// Device-side stride between buffer offsets.
const OFFSET_STRIDE: u32 = 0x0100_0000;

/// Largest JPEG payload the mock produces.
const JPEG_PAYLOAD: usize = 4096;

/// Kind of request, for failure injection and counters.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    QueryCap,
    EnumFmt,
    GetFmt,
    SetFmt,
    ReqBufs,
    QueryBuf,
    QBuf,
    DqBuf,
    StreamOn,
    StreamOff,
    EnumFrameSizes,
    QueryCtrl,
    QueryMenu,
    GetCtrl,
    SetCtrl,
}

impl RequestKind {
    fn of(request: &Request<'_>) -> (Self, Option<u32>) {
        match request {
            Request::QueryCap(_) => (Self::QueryCap, None),
            Request::EnumFmt(r) => (Self::EnumFmt, Some(r.index)),
            Request::GetFmt(_) => (Self::GetFmt, None),
            Request::SetFmt(_) => (Self::SetFmt, None),
            Request::ReqBufs(_) => (Self::ReqBufs, None),
            Request::QueryBuf(r) => (Self::QueryBuf, Some(r.index)),
            Request::QBuf(r) => (Self::QBuf, Some(r.index)),
            Request::DqBuf(_) => (Self::DqBuf, None),
            Request::StreamOn(_) => (Self::StreamOn, None),
            Request::StreamOff(_) => (Self::StreamOff, None),
            Request::EnumFrameSizes(r) => (Self::EnumFrameSizes, Some(r.index)),
            Request::QueryCtrl(_) => (Self::QueryCtrl, None),
            Request::QueryMenu(r) => (Self::QueryMenu, Some(r.index)),
            Request::GetCtrl(_) => (Self::GetCtrl, None),
            Request::SetCtrl(_) => (Self::SetCtrl, None),
        }
    }
}

/// Test pattern types for raw frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Horizontal gradient from dark to light.
    Gradient,
    /// Solid color with specified Y, U, V values.
    Solid(u8, u8, u8),
}

#[derive(Debug)]
struct Failure {
    kind: RequestKind,
    index: Option<u32>,
    errno: i32,
    once: bool,
}

#[derive(Debug)]
struct MockSlot {
    data: Vec<u8>,
    queued: bool,
}

/// Geometry the mock driver has negotiated.
#[derive(Debug, Clone, Copy)]
struct MockFormat {
    fourcc: FourCC,
    width: u32,
    height: u32,
    bytes_per_line: u32,
    size_image: u32,
}

impl MockFormat {
    fn to_raw(self) -> v4l2_pix_format {
        v4l2_pix_format {
            width: self.width,
            height: self.height,
            pixelformat: self.fourcc.to_u32(),
            field: sys::FIELD_NONE,
            bytesperline: self.bytes_per_line,
            sizeimage: self.size_image,
            ..v4l2_pix_format::zeroed()
        }
    }
}

/// A frame-size entry as the driver reports it.
#[derive(Debug, Clone, Copy)]
enum MockSize {
    Discrete(u32, u32),
    Continuous([u32; 6]),
    Stepwise([u32; 6]),
}

#[derive(Debug, Clone)]
struct MockControl {
    id: u32,
    type_: u32,
    name: &'static str,
    minimum: i32,
    maximum: i32,
    default_value: i32,
    flags: u32,
    value: i32,
    menu: &'static [(u32, &'static str)],
}

#[derive(Debug)]
struct MockState {
    capabilities: u32,
    format: MockFormat,
    max_size: (u32, u32),
    max_buffers: u32,
    slots: Vec<MockSlot>,
    queue: VecDeque<u32>,
    streaming: bool,
    never_ready: bool,
    closed: bool,
    close_calls: usize,
    sequence: u32,
    misreport_dequeue: Option<u32>,
    pattern: TestPattern,
    failures: Vec<Failure>,
    map_failures: Vec<(u32, i32)>,
    unmap_failures: Vec<(u32, i32)>,
    requests: Vec<RequestKind>,
    live_mappings: usize,
    unmaps: usize,
    controls: Vec<MockControl>,
}

const FORMATS: &[(FourCC, &str, u32)] = &[
    (FourCC::YUYV, "YUYV 4:2:2", 0),
    (FourCC::JPEG, "JFIF JPEG", sys::FMT_FLAG_COMPRESSED),
];

const POWER_LINE_MENU: &[(u32, &str)] = &[(0, "Disabled"), (2, "60 Hz")];

fn default_controls() -> Vec<MockControl> {
    let integer = |id, name, maximum, default_value| MockControl {
        id,
        type_: 1,
        name,
        minimum: 0,
        maximum,
        default_value,
        flags: 0,
        value: default_value,
        menu: &[],
    };
    vec![
        integer(0x0098_0900, "Brightness", 255, 128),
        MockControl {
            flags: sys::CTRL_FLAG_DISABLED,
            ..integer(0x0098_0901, "Contrast", 255, 128)
        },
        MockControl {
            type_: 2,
            ..integer(0x0098_0914, "Horizontal Flip", 1, 0)
        },
        MockControl {
            type_: sys::CTRL_TYPE_MENU,
            menu: POWER_LINE_MENU,
            ..integer(0x0098_0918, "Power Line Frequency", 2, 2)
        },
    ]
}

fn pix_format(fourcc: FourCC, width: u32, height: u32) -> MockFormat {
    let (bytes_per_line, size_image) = if fourcc.is_compressed() {
        (0, width * height)
    } else {
        (width * 2, width * 2 * height)
    };
    MockFormat {
        fourcc,
        width,
        height,
        bytes_per_line,
        size_image,
    }
}

fn frame_sizes(fourcc: FourCC) -> &'static [MockSize] {
    match fourcc {
        FourCC::JPEG => &[
            MockSize::Discrete(1024, 768),
            MockSize::Stepwise([100, 200, 10, 100, 200, 10]),
        ],
        FourCC::YUYV => &[MockSize::Continuous([16, 1920, 1, 16, 1080, 1])],
        _ => &[],
    }
}

const fn stepwise(range: [u32; 6]) -> v4l2_frmsize_stepwise {
    let [min_width, max_width, step_width, min_height, max_height, step_height] = range;
    v4l2_frmsize_stepwise {
        min_width,
        max_width,
        step_width,
        min_height,
        max_height,
        step_height,
    }
}

fn fill_name(dst: &mut [u8], src: &str) {
    let len = src.len().min(dst.len().saturating_sub(1));
    dst[..len].copy_from_slice(&src.as_bytes()[..len]);
}

fn errno<T>(code: i32) -> io::Result<T> {
    Err(io::Error::from_raw_os_error(code))
}

/// Simulated capture driver.
#[derive(Debug, Clone)]
pub struct MockChannel {
    state: Rc<RefCell<MockState>>,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannel {
    /// A capture device offering YUYV and JPEG, with up to 8 buffers.
    #[must_use]
    pub fn new() -> Self {
        let caps = CapabilityFlags::VIDEO_CAPTURE.0 | CapabilityFlags::STREAMING.0;
        Self {
            state: Rc::new(RefCell::new(MockState {
                capabilities: caps,
                format: pix_format(FourCC::YUYV, 640, 480),
                max_size: (1920, 1080),
                max_buffers: 8,
                slots: Vec::new(),
                queue: VecDeque::new(),
                streaming: false,
                never_ready: false,
                closed: false,
                close_calls: 0,
                sequence: 0,
                misreport_dequeue: None,
                pattern: TestPattern::ColorBars,
                failures: Vec::new(),
                map_failures: Vec::new(),
                unmap_failures: Vec::new(),
                requests: Vec::new(),
                live_mappings: 0,
                unmaps: 0,
                controls: default_controls(),
            })),
        }
    }

    /// Clamp negotiated frame sizes to `width` x `height`.
    #[must_use]
    pub fn with_max_size(self, width: u32, height: u32) -> Self {
        self.state.borrow_mut().max_size = (width, height);
        self
    }

    /// Grant at most `count` buffers.
    #[must_use]
    pub fn with_max_buffers(self, count: u32) -> Self {
        self.state.borrow_mut().max_buffers = count;
        self
    }

    /// Pattern used for raw frames.
    #[must_use]
    pub fn with_pattern(self, pattern: TestPattern) -> Self {
        self.state.borrow_mut().pattern = pattern;
        self
    }

    /// Report no streaming I/O capability.
    #[must_use]
    pub fn without_streaming(self) -> Self {
        self.state.borrow_mut().capabilities &= !CapabilityFlags::STREAMING.0;
        self
    }

    /// Fail every request of `kind` with `code`.
    pub fn fail_on(&self, kind: RequestKind, code: i32) {
        self.push_failure(kind, None, code, false);
    }

    /// Fail requests of `kind` that carry `index` with `code`.
    pub fn fail_on_index(&self, kind: RequestKind, index: u32, code: i32) {
        self.push_failure(kind, Some(index), code, false);
    }

    /// Fail the next request of `kind` with `code`.
    pub fn fail_once(&self, kind: RequestKind, code: i32) {
        self.push_failure(kind, None, code, true);
    }

    fn push_failure(&self, kind: RequestKind, index: Option<u32>, code: i32, once: bool) {
        self.state.borrow_mut().failures.push(Failure {
            kind,
            index,
            errno: code,
            once,
        });
    }

    /// Fail mapping of buffer `index`.
    pub fn fail_map_at(&self, index: u32, code: i32) {
        self.state.borrow_mut().map_failures.push((index, code));
    }

    /// Fail unmapping of buffer `index`.
    pub fn fail_unmap_at(&self, index: u32, code: i32) {
        self.state.borrow_mut().unmap_failures.push((index, code));
    }

    /// Report `index` for the next dequeued buffer instead of the real one.
    ///
    /// The real buffer still leaves the driver queue, as it would with a
    /// confused driver.
    pub fn misreport_next_dequeue(&self, index: u32) {
        self.state.borrow_mut().misreport_dequeue = Some(index);
    }

    /// Make readiness waits time out (or stop doing so).
    pub fn set_never_ready(&self, never_ready: bool) {
        self.state.borrow_mut().never_ready = never_ready;
    }

    /// Switch streaming directly, bypassing the request path.
    ///
    /// Stopping returns every queued buffer to the application, as stream
    /// off does.
    pub fn set_streaming(&self, streaming: bool) {
        let mut state = self.state.borrow_mut();
        if streaming {
            state.start_streaming();
        } else {
            state.stop_streaming();
        }
    }

    /// Number of requests of `kind` seen so far.
    pub fn count(&self, kind: RequestKind) -> usize {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|k| **k == kind)
            .count()
    }

    /// Buffers currently reserved on the driver side.
    pub fn reserved_buffers(&self) -> usize {
        self.state.borrow().slots.len()
    }

    /// Mappings not yet released.
    pub fn live_mappings(&self) -> usize {
        self.state.borrow().live_mappings
    }

    /// Unmap calls made so far, failed ones included.
    pub fn unmaps(&self) -> usize {
        self.state.borrow().unmaps
    }

    /// Whether the device is streaming.
    pub fn is_streaming(&self) -> bool {
        self.state.borrow().streaming
    }

    /// Whether the handle was closed.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Number of close calls.
    pub fn close_calls(&self) -> usize {
        self.state.borrow().close_calls
    }
}

impl MockState {
    fn take_failure(&mut self, kind: RequestKind, index: Option<u32>) -> Option<i32> {
        let pos = self
            .failures
            .iter()
            .position(|f| f.kind == kind && (f.index.is_none() || f.index == index))?;
        let code = self.failures[pos].errno;
        if self.failures[pos].once {
            self.failures.remove(pos);
        }
        Some(code)
    }

    fn start_streaming(&mut self) {
        self.streaming = true;
        self.sequence = 0;
    }

    fn stop_streaming(&mut self) {
        self.streaming = false;
        self.queue.clear();
        for slot in &mut self.slots {
            slot.queued = false;
        }
    }

    fn slot_size(&self) -> usize {
        self.format.size_image as usize
    }

    fn control(&self, id: u32) -> Option<&MockControl> {
        self.controls.iter().find(|c| c.id == id)
    }

    fn handle(&mut self, request: Request<'_>) -> io::Result<()> {
        let capture = sys::BUF_TYPE_VIDEO_CAPTURE;
        match request {
            Request::QueryCap(raw) => {
                fill_name(&mut raw.driver, "mock");
                fill_name(&mut raw.card, "Mock Camera");
                fill_name(&mut raw.bus_info, "mock:0");
                raw.version = 0x0006_0800;
                raw.capabilities = self.capabilities | CapabilityFlags::DEVICE_CAPS.0;
                raw.device_caps = self.capabilities;
            }
            Request::EnumFmt(raw) => {
                if raw.type_ != capture {
                    return errno(libc::EINVAL);
                }
                let Some((fourcc, description, flags)) = FORMATS.get(raw.index as usize) else {
                    return errno(libc::EINVAL);
                };
                raw.pixelformat = fourcc.to_u32();
                raw.flags = *flags;
                fill_name(&mut raw.description, description);
            }
            Request::GetFmt(raw) => {
                if raw.type_ != capture {
                    return errno(libc::EINVAL);
                }
                sys::set_pix(raw, self.format.to_raw());
            }
            Request::SetFmt(raw) => {
                if raw.type_ != capture {
                    return errno(libc::EINVAL);
                }
                if self.streaming || !self.slots.is_empty() {
                    return errno(libc::EBUSY);
                }
                let requested = sys::pix(raw);
                let fourcc = FORMATS
                    .iter()
                    .map(|(f, _, _)| *f)
                    .find(|f| f.to_u32() == requested.pixelformat)
                    .unwrap_or(FourCC::YUYV);
                let width = requested.width.clamp(2, self.max_size.0) & !1;
                let height = requested.height.clamp(1, self.max_size.1);
                self.format = pix_format(fourcc, width, height);
                sys::set_pix(raw, self.format.to_raw());
            }
            Request::ReqBufs(raw) => {
                if raw.type_ != capture || raw.memory != sys::MEMORY_MMAP {
                    return errno(libc::EINVAL);
                }
                if self.streaming || self.live_mappings > 0 {
                    return errno(libc::EBUSY);
                }
                let granted = raw.count.min(self.max_buffers);
                let size = self.slot_size();
                self.slots = (0..granted)
                    .map(|_| MockSlot {
                        data: vec![0; size],
                        queued: false,
                    })
                    .collect();
                self.queue.clear();
                raw.count = granted;
            }
            Request::QueryBuf(raw) => {
                if raw.type_ != capture || raw.index as usize >= self.slots.len() {
                    return errno(libc::EINVAL);
                }
                raw.length = self.format.size_image;
                let offset = raw.index * OFFSET_STRIDE;
                sys::set_buffer_offset(raw, offset);
            }
            Request::QBuf(raw) => {
                let Some(slot) = self.slots.get_mut(raw.index as usize) else {
                    return errno(libc::EINVAL);
                };
                if raw.type_ != capture || slot.queued {
                    return errno(libc::EINVAL);
                }
                slot.queued = true;
                self.queue.push_back(raw.index);
            }
            Request::DqBuf(raw) => {
                if raw.type_ != capture || !self.streaming {
                    return errno(libc::EINVAL);
                }
                let Some(index) = self.queue.pop_front() else {
                    return errno(libc::EAGAIN);
                };
                self.complete(index, raw);
                if let Some(reported) = self.misreport_dequeue.take() {
                    raw.index = reported;
                }
            }
            Request::StreamOn(buf_type) => {
                if *buf_type != capture || self.slots.is_empty() {
                    return errno(libc::EINVAL);
                }
                self.start_streaming();
            }
            Request::StreamOff(buf_type) => {
                if *buf_type != capture {
                    return errno(libc::EINVAL);
                }
                self.stop_streaming();
            }
            Request::EnumFrameSizes(raw) => {
                let sizes = frame_sizes(FourCC::from_u32(raw.pixel_format));
                let Some(size) = sizes.get(raw.index as usize) else {
                    return errno(libc::EINVAL);
                };
                match *size {
                    MockSize::Discrete(width, height) => {
                        raw.type_ = sys::FRMSIZE_TYPE_DISCRETE;
                        raw.__bindgen_anon_1.discrete = v4l2_frmsize_discrete { width, height };
                    }
                    MockSize::Continuous(range) => {
                        raw.type_ = sys::FRMSIZE_TYPE_CONTINUOUS;
                        raw.__bindgen_anon_1.stepwise = stepwise(range);
                    }
                    MockSize::Stepwise(range) => {
                        raw.type_ = sys::FRMSIZE_TYPE_STEPWISE;
                        raw.__bindgen_anon_1.stepwise = stepwise(range);
                    }
                }
            }
            Request::QueryCtrl(raw) => {
                let found = if raw.id & sys::CTRL_FLAG_NEXT_CTRL == 0 {
                    self.control(raw.id)
                } else {
                    let after = raw.id & !sys::CTRL_FLAG_NEXT_CTRL;
                    let first = raw.id == sys::CTRL_FLAG_NEXT_CTRL;
                    self.controls.iter().find(|c| first || c.id > after)
                };
                let Some(control) = found else {
                    return errno(libc::EINVAL);
                };
                *raw = sys::v4l2_queryctrl {
                    id: control.id,
                    type_: control.type_,
                    minimum: control.minimum,
                    maximum: control.maximum,
                    step: 1,
                    default_value: control.default_value,
                    flags: control.flags,
                    ..sys::v4l2_queryctrl::zeroed()
                };
                fill_name(&mut raw.name, control.name);
            }
            Request::QueryMenu(raw) => {
                let (id, wanted) = (raw.id, raw.index);
                let item = self
                    .control(id)
                    .and_then(|c| c.menu.iter().find(|(index, _)| *index == wanted));
                let Some((_, label)) = item else {
                    return errno(libc::EINVAL);
                };
                let mut name = [0u8; 32];
                fill_name(&mut name, label);
                raw.__bindgen_anon_1.name = name;
            }
            Request::GetCtrl(raw) => {
                let Some(control) = self.control(raw.id) else {
                    return errno(libc::EINVAL);
                };
                raw.value = control.value;
            }
            Request::SetCtrl(raw) => {
                let Some(control) = self.controls.iter_mut().find(|c| c.id == raw.id) else {
                    return errno(libc::EINVAL);
                };
                control.value = raw.value.clamp(control.minimum, control.maximum);
                raw.value = control.value;
            }
        }
        Ok(())
    }

    /// Fill slot `index` with the next frame and describe it in `raw`.
    fn complete(&mut self, index: u32, raw: &mut v4l2_buffer) {
        let sequence = self.sequence;
        self.sequence += 1;
        let format = self.format;
        let pattern = self.pattern;
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return;
        };
        slot.queued = false;

        let bytes_used = if format.fourcc.is_compressed() {
            write_jpeg(&mut slot.data, sequence)
        } else {
            write_pattern(&mut slot.data, &format, pattern);
            slot.data.len()
        };

        let timestamp = Duration::from_millis(u64::from(sequence) * 33);
        raw.index = index;
        raw.bytesused = u32::try_from(bytes_used).expect("slot sizes fit in u32");
        raw.sequence = sequence;
        raw.field = sys::FIELD_NONE;
        raw.length = format.size_image;
        raw.timestamp.tv_sec = timestamp.as_secs().try_into().expect("small timestamp");
        raw.timestamp.tv_usec = timestamp.subsec_micros().try_into().expect("micros fit");
    }
}

/// Write a minimal JFIF-looking payload tagged with `sequence`.
fn write_jpeg(data: &mut [u8], sequence: u32) -> usize {
    let len = data.len().min(JPEG_PAYLOAD);
    if len < 20 {
        return 0;
    }
    let header = [
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01,
    ];
    data[..header.len()].copy_from_slice(&header);
    data[header.len()..header.len() + 4].copy_from_slice(&sequence.to_le_bytes());
    data[header.len() + 4..len - 2].fill(0x55);
    data[len - 2..len].copy_from_slice(&[0xFF, 0xD9]);
    len
}

/// Generate YUYV frame data based on pattern.
fn write_pattern(data: &mut [u8], format: &MockFormat, pattern: TestPattern) {
    let stride = format.bytes_per_line as usize;
    match pattern {
        TestPattern::ColorBars => generate_color_bars(data, format.width, stride),
        TestPattern::Gradient => generate_gradient(data, format.width, stride),
        TestPattern::Solid(y, u, v) => generate_solid(data, y, u, v),
    }
}

/// YUYV values of the eight SMPTE bars, left to right.
pub const COLOR_BARS_YUV: [(u8, u8, u8); 8] = [
    (235, 128, 128), // White
    (210, 16, 146),  // Yellow
    (170, 166, 16),  // Cyan
    (145, 54, 34),   // Green
    (106, 202, 222), // Magenta
    (81, 90, 240),   // Red
    (41, 240, 110),  // Blue
    (16, 128, 128),  // Black
];

fn generate_color_bars(data: &mut [u8], width: u32, stride: usize) {
    let bar_width = (width / 8).max(1);
    for row in data.chunks_exact_mut(stride) {
        for (pair, px) in row.chunks_exact_mut(4).enumerate().take(width as usize / 2) {
            let x = u32::try_from(pair * 2).expect("row fits in u32");
            let (y, u, v) = COLOR_BARS_YUV[(x / bar_width).min(7) as usize];
            px.copy_from_slice(&[y, u, y, v]);
        }
    }
}

fn generate_gradient(data: &mut [u8], width: u32, stride: usize) {
    for row in data.chunks_exact_mut(stride) {
        for (pair, px) in row.chunks_exact_mut(4).enumerate().take(width as usize / 2) {
            let x = pair * 2;
            let y = u8::try_from(x * 255 / width as usize).expect("gradient stays in range");
            px.copy_from_slice(&[y, 128, y, 128]);
        }
    }
}

fn generate_solid(data: &mut [u8], y: u8, u: u8, v: u8) {
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&[y, u, y, v]);
    }
}

impl ControlChannel for MockChannel {
    type Region = MockRegion;

    fn send(&mut self, request: Request<'_>) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return errno(libc::EBADF);
        }
        let (kind, index) = RequestKind::of(&request);
        state.requests.push(kind);
        if let Some(code) = state.take_failure(kind, index) {
            return errno(code);
        }
        state.handle(request)
    }

    fn map(&mut self, offset: u32, length: usize) -> io::Result<MockRegion> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return errno(libc::EBADF);
        }
        let index = offset / OFFSET_STRIDE;
        if offset % OFFSET_STRIDE != 0 || index as usize >= state.slots.len() || length > state.slot_size() {
            return errno(libc::EINVAL);
        }
        if let Some(&(_, code)) = state.map_failures.iter().find(|(i, _)| *i == index) {
            return errno(code);
        }
        state.live_mappings += 1;
        Ok(MockRegion {
            state: Rc::clone(&self.state),
            index,
            len: length,
            released: false,
        })
    }

    fn wait_ready(&mut self, _timeout: Duration) -> io::Result<bool> {
        let state = self.state.borrow();
        if state.closed {
            return errno(libc::EBADF);
        }
        Ok(!state.never_ready)
    }

    fn close(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.close_calls += 1;
        state.closed = true;
        state.stop_streaming();
        Ok(())
    }
}

/// Mapping of one mock buffer.
#[derive(Debug)]
pub struct MockRegion {
    state: Rc<RefCell<MockState>>,
    index: u32,
    len: usize,
    released: bool,
}

impl MockRegion {
    fn release(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.unmaps += 1;
        self.released = true;
        state.live_mappings = state.live_mappings.saturating_sub(1);
        match state.unmap_failures.iter().find(|(i, _)| *i == self.index) {
            Some(&(_, code)) => errno(code),
            None => Ok(()),
        }
    }
}

impl MappedRegion for MockRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_prefix(&self, len: usize) -> Vec<u8> {
        let state = self.state.borrow();
        state
            .slots
            .get(self.index as usize)
            .map(|slot| slot.data[..len.min(self.len).min(slot.data.len())].to_vec())
            .unwrap_or_default()
    }

    fn unmap(mut self) -> io::Result<()> {
        self.release()
    }
}

impl Drop for MockRegion {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::{v4l2_capability, v4l2_requestbuffers};

    #[test]
    fn test_mock_identity() {
        let mut channel = MockChannel::new();
        let mut caps = v4l2_capability::zeroed();
        channel
            .send(Request::QueryCap(&mut caps))
            .expect("querycap should succeed");
        assert_eq!(sys::c_string(&caps.driver), "mock");
        assert_eq!(caps.device_caps & CapabilityFlags::STREAMING.0, CapabilityFlags::STREAMING.0);
    }

    #[test]
    fn test_reqbufs_refused_while_mapped() {
        let mut channel = MockChannel::new();
        let mut req = v4l2_requestbuffers {
            count: 2,
            type_: sys::BUF_TYPE_VIDEO_CAPTURE,
            memory: sys::MEMORY_MMAP,
            ..v4l2_requestbuffers::zeroed()
        };
        channel.send(Request::ReqBufs(&mut req)).expect("reqbufs");
        let region = channel.map(OFFSET_STRIDE, 16).expect("map slot 1");

        let mut release = v4l2_requestbuffers { count: 0, ..req };
        let err = channel
            .send(Request::ReqBufs(&mut release))
            .expect_err("mapped buffers are busy");
        assert_eq!(err.raw_os_error(), Some(libc::EBUSY));

        region.unmap().expect("unmap");
        channel.send(Request::ReqBufs(&mut release)).expect("release after unmap");
        assert_eq!(channel.reserved_buffers(), 0);
    }

    #[test]
    fn test_dropped_region_is_released() {
        let mut channel = MockChannel::new();
        let mut req = v4l2_requestbuffers {
            count: 1,
            type_: sys::BUF_TYPE_VIDEO_CAPTURE,
            memory: sys::MEMORY_MMAP,
            ..v4l2_requestbuffers::zeroed()
        };
        channel.send(Request::ReqBufs(&mut req)).expect("reqbufs");
        drop(channel.map(0, 16).expect("map"));
        assert_eq!(channel.live_mappings(), 0);
    }

    #[test]
    fn test_color_bars_layout() {
        let format = pix_format(FourCC::YUYV, 16, 2);
        let mut data = vec![0u8; format.size_image as usize];
        write_pattern(&mut data, &format, TestPattern::ColorBars);
        // bar width is two pixels, so pair 0 is white and pair 7 black
        assert_eq!(&data[..4], &[235, 128, 235, 128]);
        assert_eq!(&data[28..32], &[16, 128, 16, 128]);
        assert_eq!(&data[32..36], &[235, 128, 235, 128]);
    }

    #[test]
    fn test_jpeg_payload_markers() {
        let mut data = vec![0u8; 8192];
        let len = write_jpeg(&mut data, 7);
        assert_eq!(len, JPEG_PAYLOAD);
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
        assert_eq!(&data[len - 2..len], &[0xFF, 0xD9]);
        assert_eq!(&data[13..17], &7u32.to_le_bytes());
    }

    #[test]
    fn test_closed_channel_rejects_everything() {
        let mut channel = MockChannel::new();
        channel.close().expect("close");
        let mut caps = v4l2_capability::zeroed();
        assert!(channel.send(Request::QueryCap(&mut caps)).is_err());
        assert!(channel.wait_ready(Duration::ZERO).is_err());
    }
}
