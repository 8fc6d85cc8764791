use std::io::ErrorKind;
use std::os::fd::BorrowedFd;

use log::{debug, error, info, warn};

use crate::core::geometry::{Layout, PixelFormat, Rect};
use crate::error::{DeviceError, SetupError};
use crate::frame::FrameInfo;
use crate::paint::Surface;
use crate::traits::{
    Allocation, DisplayDevice, FlipEvent, FramebufferId, Output, Painter, PlaneId,
};

/// Index of a buffer owned by a [`Display`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

/// Allocation plus the framebuffer registered on top of it
#[derive(Debug)]
struct Buffer {
    allocation: Allocation,
    framebuffer: Option<FramebufferId>,
}

/// Display owns the device and every resource created from it
///
/// Buffers are created allocate → map → register and torn down in reverse:
/// on drop the original configuration is restored, bound planes are
/// cleared, every framebuffer is deregistered, then every allocation is
/// freed, and only then is the device itself closed.
pub struct Display<D: DisplayDevice> {
    buffers: Vec<Option<Buffer>>,
    planes: Vec<PlaneId>,
    snapshot: Option<D::Snapshot>,
    mode_set: bool,
    output: Output,
    device: D,
}

impl<D: DisplayDevice> Display<D> {
    /// Take ownership of an opened device and discover its output
    pub fn open(mut device: D) -> Result<Self, SetupError> {
        let output = device.find_output().map_err(SetupError::Startup)?;
        info!(
            "output: connector {} encoder {} pipe {} at {}x{}@{}Hz ({:?})",
            output.connector,
            output.encoder,
            output.pipe,
            output.mode.width,
            output.mode.height,
            output.mode.refresh,
            output.format
        );

        Ok(Self {
            buffers: Vec::new(),
            planes: Vec::new(),
            snapshot: None,
            mode_set: false,
            output,
            device,
        })
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Access device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Access mutable device
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Allocate a presentable buffer the size of the output's mode
    pub fn create_screen_buffer(&mut self) -> Result<BufferId, SetupError> {
        let mode = self.output.mode;
        self.create_buffer(mode.width, mode.height, self.output.format)
    }

    /// Allocate, map and register a buffer
    ///
    /// When registration fails the fresh allocation is released before the
    /// error is returned.
    pub fn create_buffer(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<BufferId, SetupError> {
        if width == 0 || height == 0 {
            return Err(SetupError::Allocation(DeviceError::other(
                "allocate",
                ErrorKind::InvalidInput,
                "buffer dimensions must be non-zero",
            )));
        }

        let allocation = self
            .device
            .allocate(width, height, format)
            .map_err(SetupError::Allocation)?;

        let framebuffer = match self.device.register(&allocation) {
            Ok(framebuffer) => framebuffer,
            Err(e) => {
                if let Err(release) = self.device.release(allocation.id) {
                    error!("releasing unregistered allocation {:?}: {}", allocation.id, release);
                }
                return Err(SetupError::Allocation(e));
            }
        };

        debug!(
            "buffer {:?}: {}x{} stride {} size {} -> framebuffer {:?}",
            allocation.id,
            allocation.layout.width,
            allocation.layout.height,
            allocation.layout.stride,
            allocation.size,
            framebuffer
        );

        self.buffers.push(Some(Buffer {
            allocation,
            framebuffer: Some(framebuffer),
        }));
        Ok(BufferId(self.buffers.len() - 1))
    }

    fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(id.0).and_then(Option::as_ref)
    }

    fn registered(&self, id: BufferId, op: &'static str) -> Result<FramebufferId, DeviceError> {
        self.framebuffer(id)
            .ok_or_else(|| DeviceError::other(op, ErrorKind::NotFound, "buffer is not registered"))
    }

    /// Framebuffer registered for a live buffer
    pub fn framebuffer(&self, id: BufferId) -> Option<FramebufferId> {
        self.buffer(id).and_then(|buffer| buffer.framebuffer)
    }

    pub fn layout(&self, id: BufferId) -> Option<Layout> {
        self.buffer(id).map(|buffer| buffer.allocation.layout)
    }

    /// Number of buffers still holding device memory
    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().flatten().count()
    }

    /// Hand the buffer's pixels to `painter` for the duration of one call
    pub fn paint(
        &mut self,
        id: BufferId,
        painter: &mut dyn Painter,
        frame: &FrameInfo,
    ) -> Result<(), DeviceError> {
        let (allocation, layout) = self
            .buffer(id)
            .map(|buffer| (buffer.allocation.id, buffer.allocation.layout))
            .ok_or_else(|| DeviceError::other("paint", ErrorKind::NotFound, "unknown buffer"))?;

        let pixels = self.device.pixels(allocation)?;
        let mut surface = Surface::new(pixels, layout)
            .map_err(|e| DeviceError::other("paint", ErrorKind::InvalidData, &e.to_string()))?;
        painter.paint(&mut surface, frame);
        Ok(())
    }

    /// Show `id` as the initial picture; allowed once per session
    ///
    /// The configuration active before the call is captured and, once the
    /// mode-set succeeded, reapplied when the display is dropped.
    pub fn set_mode(&mut self, id: BufferId) -> Result<(), SetupError> {
        if self.mode_set {
            return Err(SetupError::ModeAlreadySet);
        }
        let framebuffer = self.registered(id, "set_mode").map_err(SetupError::ModeSet)?;

        let snapshot = self
            .device
            .current_config(&self.output)
            .map_err(SetupError::Startup)?;
        debug!("saved configuration: {:?}", snapshot);

        self.device
            .set_mode(&self.output, framebuffer)
            .map_err(SetupError::ModeSet)?;
        self.snapshot = Some(snapshot);
        self.mode_set = true;
        Ok(())
    }

    /// Request an asynchronous flip to `id`
    pub fn page_flip(&mut self, id: BufferId) -> Result<(), DeviceError> {
        let framebuffer = self.registered(id, "page_flip")?;
        self.device.page_flip(&self.output, framebuffer)
    }

    pub fn event_fd(&self) -> Option<BorrowedFd<'_>> {
        self.device.event_fd()
    }

    pub fn has_queued_events(&self) -> bool {
        self.device.has_queued_events()
    }

    pub fn read_events(&mut self) -> Result<Vec<FlipEvent>, DeviceError> {
        self.device.read_events()
    }

    /// Single capability probe for an overlay plane
    pub fn probe_overlay(&mut self) -> Option<PlaneId> {
        self.device.probe_overlay(&self.output)
    }

    /// Bind buffer `id` to `plane`; `src` is in buffer pixels
    pub fn show_plane(
        &mut self,
        plane: PlaneId,
        id: BufferId,
        dest: Rect,
        src: Rect,
    ) -> Result<(), DeviceError> {
        let framebuffer = self.registered(id, "set_plane")?;
        self.device
            .set_plane(plane, &self.output, Some(framebuffer), dest, src)?;
        if !self.planes.contains(&plane) {
            self.planes.push(plane);
        }
        Ok(())
    }

    /// Unbind `plane` by applying an empty configuration
    pub fn hide_plane(&mut self, plane: PlaneId) -> Result<(), DeviceError> {
        self.planes.retain(|p| *p != plane);
        self.device
            .set_plane(plane, &self.output, None, Rect::default(), Rect::default())
    }

    /// Deregister and free one buffer ahead of the final teardown
    pub fn release_buffer(&mut self, id: BufferId) -> Result<(), DeviceError> {
        let Some(slot) = self.buffers.get_mut(id.0) else {
            return Ok(());
        };
        let Some(mut buffer) = slot.take() else {
            return Ok(());
        };

        if let Some(framebuffer) = buffer.framebuffer {
            if let Err(e) = self.device.deregister(framebuffer) {
                self.buffers[id.0] = Some(buffer);
                return Err(e);
            }
            buffer.framebuffer = None;
        }
        self.free(buffer)
    }

    fn free(&mut self, buffer: Buffer) -> Result<(), DeviceError> {
        if let Some(framebuffer) = buffer.framebuffer {
            debug_assert!(
                false,
                "freeing {:?} while {:?} is registered",
                buffer.allocation.id,
                framebuffer
            );
            return Err(DeviceError::other(
                "release",
                ErrorKind::InvalidInput,
                "allocation still backs a registered framebuffer",
            ));
        }
        self.device.release(buffer.allocation.id)
    }

    /// Reapply the configuration captured by [`Display::set_mode`]
    ///
    /// Failure is only logged: this runs on the way out.
    pub fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            match self.device.restore(&self.output, &snapshot) {
                Ok(()) => debug!("original configuration restored"),
                Err(e) => warn!("could not restore the original display configuration: {}", e),
            }
        }
    }

    fn teardown(&mut self) {
        for plane in std::mem::take(&mut self.planes) {
            if let Err(e) = self.hide_plane(plane) {
                warn!("clearing plane {:?}: {}", plane, e);
            }
        }

        self.restore();

        for buffer in self.buffers.iter_mut().rev().flatten() {
            if let Some(framebuffer) = buffer.framebuffer {
                match self.device.deregister(framebuffer) {
                    Ok(()) => buffer.framebuffer = None,
                    Err(e) => error!("deregistering {:?}: {}; its memory is kept", framebuffer, e),
                }
            }
        }

        let buffers = std::mem::take(&mut self.buffers);
        for buffer in buffers.into_iter().rev().flatten() {
            if buffer.framebuffer.is_some() {
                continue;
            }
            let allocation = buffer.allocation.id;
            if let Err(e) = self.free(buffer) {
                error!("releasing {:?}: {}", allocation, e);
            }
        }
    }
}

impl<D: DisplayDevice> Drop for Display<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
