use std::fmt::Debug;
use std::os::fd::BorrowedFd;

use crate::core::geometry::{DisplayMode, Layout, PixelFormat, Rect};
use crate::error::DeviceError;

/// Device memory allocation handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationId(pub u32);

/// Presentable framebuffer object, distinct from the memory behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

/// Hardware compositing plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneId(pub u32);

/// Scanout-capable memory returned by the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub id: AllocationId,
    pub layout: Layout,
    /// Mapped size in bytes, at least `layout.min_len()`
    pub size: usize,
}

/// Physical output chosen by discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub connector: u32,
    pub encoder: u32,
    /// Display pipeline (CRTC) driving the connector
    pub pipe: u32,
    pub mode: DisplayMode,
    /// Preferred pixel format for buffers shown on this output
    pub format: PixelFormat,
}

/// Hardware signalled that a flip finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipEvent {
    /// Framebuffer now being scanned out
    pub framebuffer: FramebufferId,
    /// Vblank sequence reported by the device
    pub sequence: u32,
}

/// Display device - allocator, framebuffer binder and pipeline controller
///
/// All resources are referred to by id; the caller owns their lifecycle and
/// must release them in dependency order before the device is dropped.
pub trait DisplayDevice {
    /// Original configuration captured for restoration on exit
    type Snapshot: Debug;

    /// Find the first connected output with at least one mode
    fn find_output(&mut self) -> Result<Output, DeviceError>;

    /// Allocate zero-initialized scanout memory and map it for CPU writes
    fn allocate(&mut self, width: u32, height: u32, format: PixelFormat)
        -> Result<Allocation, DeviceError>;

    /// Mapped pixels of a live allocation
    fn pixels(&mut self, id: AllocationId) -> Result<&mut [u8], DeviceError>;

    /// Unmap and free an allocation
    fn release(&mut self, id: AllocationId) -> Result<(), DeviceError>;

    /// Register an allocation as a presentable framebuffer
    fn register(&mut self, allocation: &Allocation) -> Result<FramebufferId, DeviceError>;

    /// Remove a framebuffer; the allocation stays alive
    fn deregister(&mut self, framebuffer: FramebufferId) -> Result<(), DeviceError>;

    /// Capture the configuration currently driving the output
    fn current_config(&mut self, output: &Output) -> Result<Self::Snapshot, DeviceError>;

    /// Synchronously show `framebuffer` on `output` at its mode
    fn set_mode(&mut self, output: &Output, framebuffer: FramebufferId) -> Result<(), DeviceError>;

    /// Reapply a captured configuration
    fn restore(&mut self, output: &Output, snapshot: &Self::Snapshot) -> Result<(), DeviceError>;

    /// Queue an asynchronous vsync-aligned switch to `framebuffer`
    fn page_flip(&mut self, output: &Output, framebuffer: FramebufferId) -> Result<(), DeviceError>;

    /// Descriptor that becomes readable when completion events arrive
    fn event_fd(&self) -> Option<BorrowedFd<'_>>;

    /// Completions that can be read without waiting
    fn has_queued_events(&self) -> bool {
        false
    }

    /// Read every pending completion event
    fn read_events(&mut self) -> Result<Vec<FlipEvent>, DeviceError>;

    /// Single probe for an unused overlay plane usable with `output`
    fn probe_overlay(&mut self, _output: &Output) -> Option<PlaneId> {
        None
    }

    /// Bind `framebuffer` to `plane`, or unbind when `None`
    fn set_plane(
        &mut self,
        _plane: PlaneId,
        _output: &Output,
        _framebuffer: Option<FramebufferId>,
        _dest: Rect,
        _src: Rect,
    ) -> Result<(), DeviceError> {
        Err(DeviceError::other(
            "set_plane",
            std::io::ErrorKind::Unsupported,
            "device has no overlay planes",
        ))
    }
}
