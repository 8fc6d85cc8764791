#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::rc::Rc;

use vsync_flip::core::{CancelToken, DisplayMode, Layout, PixelFormat, Rect};
use vsync_flip::traits::{
    Allocation, AllocationId, DisplayDevice, FlipEvent, FramebufferId, Output, PlaneId,
};
use vsync_flip::DeviceError;

/// Everything the mock device was asked to do, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Allocate(u32),
    Register { allocation: u32, framebuffer: u32 },
    Deregister(u32),
    Release(u32),
    SetMode(u32),
    Restore,
    Flip(u32),
    SetPlane { plane: u32, framebuffer: Option<u32> },
    Close,
}

pub type OpLog = Rc<RefCell<Vec<Op>>>;

/// Which call fails, counted from zero per kind
#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub find_output: bool,
    pub allocate: Option<usize>,
    pub register: Option<usize>,
    pub set_mode: bool,
    pub flip: Option<usize>,
    pub busy: Option<usize>,
    pub set_plane: bool,
}

/// Pipe that turns readable when a flip completes, like a DRM card fd
struct CompletionPipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl CompletionPipe {
    fn new() -> io::Result<Self> {
        let mut fds = [0; 2];
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(unsafe {
            Self {
                read: OwnedFd::from_raw_fd(fds[0]),
                write: OwnedFd::from_raw_fd(fds[1]),
            }
        })
    }

    fn signal(&self) {
        let byte = [1u8];
        unsafe { libc::write(self.write.as_raw_fd(), byte.as_ptr().cast(), 1) };
    }

    /// Bytes consumed, each one a signalled completion
    fn drain(&self) -> usize {
        let mut buf = [0u8; 64];
        let mut total = 0;
        loop {
            let fd = self.read.as_raw_fd();
            let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n <= 0 {
                return total;
            }
            total += n as usize;
        }
    }
}

/// In-memory display device recording every call
pub struct MockDevice {
    log: OpLog,
    violations: Rc<RefCell<Vec<String>>>,
    memory: HashMap<u32, Vec<u8>>,
    layouts: HashMap<u32, Layout>,
    backing: HashMap<u32, u32>,
    counts: HashMap<&'static str, usize>,
    next_id: u32,
    pending: Option<FramebufferId>,
    on_screen: Option<FramebufferId>,
    completed: u64,
    sequence: u32,
    auto_complete: bool,
    overlay: Option<PlaneId>,
    cancel_after: Option<(u64, CancelToken)>,
    mode: DisplayMode,
    completions: Option<CompletionPipe>,
    reads: usize,
    pub fail: Failures,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            violations: Rc::new(RefCell::new(Vec::new())),
            memory: HashMap::new(),
            layouts: HashMap::new(),
            backing: HashMap::new(),
            counts: HashMap::new(),
            next_id: 1,
            pending: None,
            on_screen: None,
            completed: 0,
            sequence: 0,
            auto_complete: true,
            overlay: None,
            cancel_after: None,
            mode: DisplayMode::new(8, 6, 60),
            completions: None,
            reads: 0,
            fail: Failures::default(),
        }
    }

    pub fn with_overlay(mut self) -> Self {
        self.overlay = Some(PlaneId(42));
        self
    }

    /// Flips are accepted but never complete
    pub fn withhold_completions(mut self) -> Self {
        self.auto_complete = false;
        self
    }

    /// Deliver completions through a pollable descriptor instead of
    /// the in-process queue
    pub fn with_event_fd(mut self) -> Self {
        self.completions = Some(CompletionPipe::new().expect("completion pipe"));
        self
    }

    pub fn with_failures(mut self, fail: Failures) -> Self {
        self.fail = fail;
        self
    }

    /// Cancel `token` once `flips` completions have been delivered
    pub fn cancel_after(mut self, flips: u64, token: CancelToken) -> Self {
        self.cancel_after = Some((flips, token));
        self
    }

    pub fn log(&self) -> OpLog {
        self.log.clone()
    }

    pub fn violations(&self) -> Rc<RefCell<Vec<String>>> {
        self.violations.clone()
    }

    pub fn on_screen(&self) -> Option<FramebufferId> {
        self.on_screen
    }

    pub fn pending(&self) -> Option<FramebufferId> {
        self.pending
    }

    /// Times `read_events` was called
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Deliver the pending completion by hand
    pub fn complete_pending(&mut self) -> Option<FlipEvent> {
        let framebuffer = self.pending.take()?;
        self.on_screen = Some(framebuffer);
        self.sequence += 1;
        self.completed += 1;
        if let Some((after, token)) = &self.cancel_after {
            if self.completed >= *after {
                token.cancel();
            }
        }
        Some(FlipEvent {
            framebuffer,
            sequence: self.sequence,
        })
    }

    fn record(&self, op: Op) {
        self.log.borrow_mut().push(op);
    }

    /// True when this is the failing call of its kind
    fn hits(&mut self, kind: &'static str, nth: Option<usize>) -> bool {
        let count = self.counts.entry(kind).or_insert(0);
        let current = *count;
        *count += 1;
        nth == Some(current)
    }

    fn fresh_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn failure(op: &'static str, errno: i32) -> DeviceError {
    DeviceError::new(op, io::Error::from_raw_os_error(errno))
}

impl DisplayDevice for MockDevice {
    type Snapshot = &'static str;

    fn find_output(&mut self) -> Result<Output, DeviceError> {
        if self.fail.find_output {
            return Err(failure("discover", libc::ENODEV));
        }
        Ok(Output {
            connector: 31,
            encoder: 32,
            pipe: 33,
            mode: self.mode,
            format: PixelFormat::Xrgb8888,
        })
    }

    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Allocation, DeviceError> {
        let nth = self.fail.allocate;
        if self.hits("allocate", nth) {
            return Err(failure("allocate", libc::ENOMEM));
        }
        let id = self.fresh_id();
        // Padded stride, like real hardware.
        let layout = Layout::new(width, height, width * format.bytes_per_pixel() + 16, format);
        self.memory.insert(id, vec![0; layout.min_len()]);
        self.layouts.insert(id, layout);
        self.record(Op::Allocate(id));
        Ok(Allocation {
            id: AllocationId(id),
            layout,
            size: layout.min_len(),
        })
    }

    fn pixels(&mut self, id: AllocationId) -> Result<&mut [u8], DeviceError> {
        let scanned_out = self
            .backing
            .iter()
            .filter(|(_, &allocation)| allocation == id.0)
            .map(|(&fb, _)| FramebufferId(fb))
            .find(|fb| Some(*fb) == self.on_screen || Some(*fb) == self.pending);
        if let Some(fb) = scanned_out {
            self.violations
                .borrow_mut()
                .push(format!("painted {:?} while {:?} is scanned out", id, fb));
        }
        self.memory
            .get_mut(&id.0)
            .map(Vec::as_mut_slice)
            .ok_or_else(|| failure("pixels", libc::ENOENT))
    }

    fn release(&mut self, id: AllocationId) -> Result<(), DeviceError> {
        if self.backing.values().any(|&allocation| allocation == id.0) {
            self.violations
                .borrow_mut()
                .push(format!("released {:?} while still registered", id));
        }
        self.memory.remove(&id.0);
        self.record(Op::Release(id.0));
        Ok(())
    }

    fn register(&mut self, allocation: &Allocation) -> Result<FramebufferId, DeviceError> {
        let nth = self.fail.register;
        if self.hits("register", nth) {
            return Err(failure("register", libc::EINVAL));
        }
        let framebuffer = 100 + self.fresh_id();
        self.backing.insert(framebuffer, allocation.id.0);
        self.record(Op::Register {
            allocation: allocation.id.0,
            framebuffer,
        });
        Ok(FramebufferId(framebuffer))
    }

    fn deregister(&mut self, framebuffer: FramebufferId) -> Result<(), DeviceError> {
        self.backing.remove(&framebuffer.0);
        self.record(Op::Deregister(framebuffer.0));
        Ok(())
    }

    fn current_config(&mut self, _output: &Output) -> Result<&'static str, DeviceError> {
        Ok("console")
    }

    fn set_mode(
        &mut self,
        _output: &Output,
        framebuffer: FramebufferId,
    ) -> Result<(), DeviceError> {
        if self.fail.set_mode {
            return Err(failure("set_mode", libc::EINVAL));
        }
        self.on_screen = Some(framebuffer);
        self.record(Op::SetMode(framebuffer.0));
        Ok(())
    }

    fn restore(&mut self, _output: &Output, snapshot: &&'static str) -> Result<(), DeviceError> {
        assert_eq!(*snapshot, "console");
        self.on_screen = None;
        self.record(Op::Restore);
        Ok(())
    }

    fn page_flip(
        &mut self,
        _output: &Output,
        framebuffer: FramebufferId,
    ) -> Result<(), DeviceError> {
        if self.pending.is_some() {
            return Err(failure("page_flip", libc::EBUSY));
        }
        let busy = self.fail.busy;
        if self.hits("busy", busy) {
            return Err(failure("page_flip", libc::EBUSY));
        }
        let nth = self.fail.flip;
        if self.hits("flip", nth) {
            return Err(failure("page_flip", libc::EINVAL));
        }
        self.pending = Some(framebuffer);
        self.record(Op::Flip(framebuffer.0));
        if let (true, Some(pipe)) = (self.auto_complete, &self.completions) {
            pipe.signal();
        }
        Ok(())
    }

    fn event_fd(&self) -> Option<BorrowedFd<'_>> {
        self.completions.as_ref().map(|pipe| pipe.read.as_fd())
    }

    fn has_queued_events(&self) -> bool {
        self.completions.is_none() && self.auto_complete && self.pending.is_some()
    }

    fn read_events(&mut self) -> Result<Vec<FlipEvent>, DeviceError> {
        self.reads += 1;
        if let Some(pipe) = &self.completions {
            if pipe.drain() == 0 {
                return Ok(Vec::new());
            }
        }
        if !self.auto_complete {
            return Ok(Vec::new());
        }
        Ok(self.complete_pending().into_iter().collect())
    }

    fn probe_overlay(&mut self, _output: &Output) -> Option<PlaneId> {
        self.overlay
    }

    fn set_plane(
        &mut self,
        plane: PlaneId,
        _output: &Output,
        framebuffer: Option<FramebufferId>,
        _dest: Rect,
        _src: Rect,
    ) -> Result<(), DeviceError> {
        if self.fail.set_plane && framebuffer.is_some() {
            return Err(failure("set_plane", libc::EINVAL));
        }
        self.record(Op::SetPlane {
            plane: plane.0,
            framebuffer: framebuffer.map(|fb| fb.0),
        });
        Ok(())
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.record(Op::Close);
    }
}

/// Check the teardown rules against a finished op log
///
/// Every allocation is released, every framebuffer is deregistered
/// before its memory is released, planes and configuration are reset
/// before any framebuffer goes away, and the device closes last.
pub fn assert_clean_teardown(ops: &[Op]) {
    assert_eq!(ops.last(), Some(&Op::Close), "device must close last: {:?}", ops);

    let position = |target: Op| ops.iter().position(|op| *op == target);

    for op in ops {
        match *op {
            Op::Allocate(id) => {
                assert!(position(Op::Release(id)).is_some(), "allocation {} leaked: {:?}", id, ops);
            }
            Op::Register { allocation, framebuffer } => {
                let deregistered = position(Op::Deregister(framebuffer)).unwrap_or_else(|| {
                    panic!("framebuffer {} never deregistered: {:?}", framebuffer, ops)
                });
                let released = position(Op::Release(allocation)).unwrap_or(usize::MAX);
                assert!(
                    deregistered < released,
                    "memory released before its framebuffer: {:?}",
                    ops
                );
            }
            _ => {}
        }
    }

    for op in ops {
        match *op {
            Op::SetMode(fb) | Op::Flip(fb) => {
                let restore = position(Op::Restore);
                if let (Some(restore), Some(deregister)) = (restore, position(Op::Deregister(fb))) {
                    assert!(
                        restore < deregister,
                        "scanned-out {} deregistered before restore: {:?}",
                        fb,
                        ops
                    );
                }
            }
            Op::SetPlane { plane, framebuffer: Some(fb) } => {
                let cleared = position(Op::SetPlane { plane, framebuffer: None })
                    .unwrap_or_else(|| panic!("plane {} never cleared: {:?}", plane, ops));
                let deregistered = position(Op::Deregister(fb)).unwrap_or(usize::MAX);
                assert!(
                    cleared < deregistered,
                    "plane still showed {} when it was deregistered: {:?}",
                    fb,
                    ops
                );
            }
            _ => {}
        }
    }
}
