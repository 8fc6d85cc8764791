//! Kernel mode-setting backend
//!
//! Buffers are dumb buffers mapped once for their whole lifetime. Flips
//! are asynchronous page flips whose completions arrive as events on the
//! card descriptor.

pub mod card;
pub mod discovery;
pub mod plane;

use std::collections::HashMap;
use std::io::ErrorKind;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::Path;

use drm::buffer::Buffer as _;
use drm::control::dumbbuffer::DumbBuffer;
use drm::control::{crtc, framebuffer, Device as ControlDevice, Event, PageFlipFlags};
use drm::Device as _;
use drm_fourcc::DrmFourcc;
use log::{debug, info, warn};
use memmap2::{MmapMut, MmapOptions};

pub use card::Card;
pub use discovery::Route;

use crate::core::geometry::{Layout, PixelFormat, Rect};
use crate::error::DeviceError;
use crate::traits::{
    Allocation, AllocationId, DisplayDevice, FlipEvent, FramebufferId, Output, PlaneId,
};

/// Dumb buffer and its persistent CPU mapping
struct DumbAllocation {
    map: MmapMut,
    buffer: DumbBuffer,
}

pub struct KmsDevice {
    allocations: HashMap<u32, DumbAllocation>,
    route: Option<Route>,
    pending: Option<FramebufferId>,
    card: Card,
}

fn fourcc(format: PixelFormat) -> DrmFourcc {
    match format {
        PixelFormat::Xrgb8888 => DrmFourcc::Xrgb8888,
        PixelFormat::Rgb565 => DrmFourcc::Rgb565,
    }
}

fn handle<T: From<drm::control::RawResourceHandle>>(
    raw: u32,
    op: &'static str,
) -> Result<T, DeviceError> {
    drm::control::from_u32(raw)
        .ok_or_else(|| DeviceError::other(op, ErrorKind::InvalidInput, "null object id"))
}

impl KmsDevice {
    pub fn open(path: &Path) -> Result<Self, DeviceError> {
        let card = Card::open(path)?;
        match card.get_driver() {
            Ok(driver) => info!("opened {} ({:?})", path.display(), driver.name()),
            Err(e) => debug!("opened {}, driver unknown: {}", path.display(), e),
        }

        Ok(Self {
            allocations: HashMap::new(),
            route: None,
            pending: None,
            card,
        })
    }

    fn route(&self) -> Result<Route, DeviceError> {
        self.route
            .ok_or_else(|| {
                DeviceError::other("route", ErrorKind::NotConnected, "no output discovered")
            })
    }

    fn map(&self, buffer: &DumbBuffer, len: usize) -> Result<MmapMut, DeviceError> {
        let request =
            drm_ffi::mode::dumbbuffer::map(self.card.as_fd(), buffer.handle().into(), 0, 0)
                .map_err(|e| DeviceError::new("map dumb buffer", e))?;

        // SAFETY: the offset comes from the kernel for this buffer and the
        // mapping is dropped before the buffer is destroyed.
        unsafe {
            MmapOptions::new()
                .offset(request.offset)
                .len(len)
                .map_mut(self.card.as_fd().as_raw_fd())
        }
        .map_err(|e| DeviceError::new("mmap", e))
    }

    fn allocation(&self, id: AllocationId) -> Result<&DumbAllocation, DeviceError> {
        self.allocations
            .get(&id.0)
            .ok_or_else(|| DeviceError::other("lookup", ErrorKind::NotFound, "unknown allocation"))
    }
}

impl DisplayDevice for KmsDevice {
    type Snapshot = crtc::Info;

    fn find_output(&mut self) -> Result<Output, DeviceError> {
        let route = discovery::find_route(&self.card)?;
        self.route = Some(route);

        Ok(Output {
            connector: route.connector.into(),
            encoder: route.encoder.into(),
            pipe: route.crtc.into(),
            mode: route.display_mode(),
            format: PixelFormat::Xrgb8888,
        })
    }

    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Allocation, DeviceError> {
        let buffer = self
            .card
            .create_dumb_buffer((width, height), fourcc(format), format.bits_per_pixel())
            .map_err(|e| DeviceError::new("create dumb buffer", e))?;

        let layout = Layout::new(width, height, buffer.pitch(), format);
        let size = layout.min_len();
        let map = match self.map(&buffer, size) {
            Ok(map) => map,
            Err(e) => {
                if let Err(destroy) = self.card.destroy_dumb_buffer(buffer) {
                    warn!("destroying unmapped dumb buffer: {}", destroy);
                }
                return Err(e);
            }
        };

        let id = AllocationId(buffer.handle().into());
        self.allocations.insert(id.0, DumbAllocation { map, buffer });
        Ok(Allocation { id, layout, size })
    }

    fn pixels(&mut self, id: AllocationId) -> Result<&mut [u8], DeviceError> {
        self.allocations
            .get_mut(&id.0)
            .map(|allocation| &mut allocation.map[..])
            .ok_or_else(|| DeviceError::other("pixels", ErrorKind::NotFound, "unknown allocation"))
    }

    fn release(&mut self, id: AllocationId) -> Result<(), DeviceError> {
        let Some(DumbAllocation { map, buffer }) = self.allocations.remove(&id.0) else {
            return Ok(());
        };
        drop(map);
        self.card
            .destroy_dumb_buffer(buffer)
            .map_err(|e| DeviceError::new("destroy dumb buffer", e))
    }

    fn register(&mut self, allocation: &Allocation) -> Result<FramebufferId, DeviceError> {
        let format = allocation.layout.format;
        let dumb = self.allocation(allocation.id)?;
        let framebuffer = self
            .card
            .add_framebuffer(&dumb.buffer, format.depth(), format.bits_per_pixel())
            .map_err(|e| DeviceError::new("add framebuffer", e))?;
        Ok(FramebufferId(framebuffer.into()))
    }

    fn deregister(&mut self, framebuffer: FramebufferId) -> Result<(), DeviceError> {
        let handle: framebuffer::Handle = handle(framebuffer.0, "destroy framebuffer")?;
        self.card
            .destroy_framebuffer(handle)
            .map_err(|e| DeviceError::new("destroy framebuffer", e))
    }

    fn current_config(&mut self, _output: &Output) -> Result<crtc::Info, DeviceError> {
        let route = self.route()?;
        self.card
            .get_crtc(route.crtc)
            .map_err(|e| DeviceError::new("get crtc", e))
    }

    fn set_mode(
        &mut self,
        _output: &Output,
        framebuffer: FramebufferId,
    ) -> Result<(), DeviceError> {
        let route = self.route()?;
        let fb: framebuffer::Handle = handle(framebuffer.0, "set crtc")?;
        self.card
            .set_crtc(route.crtc, Some(fb), (0, 0), &[route.connector], Some(route.mode))
            .map_err(|e| DeviceError::new("set crtc", e))
    }

    fn restore(&mut self, _output: &Output, snapshot: &crtc::Info) -> Result<(), DeviceError> {
        let route = self.route()?;
        self.card
            .set_crtc(
                snapshot.handle(),
                snapshot.framebuffer(),
                snapshot.position(),
                &[route.connector],
                snapshot.mode(),
            )
            .map_err(|e| DeviceError::new("restore crtc", e))
    }

    fn page_flip(
        &mut self,
        _output: &Output,
        framebuffer: FramebufferId,
    ) -> Result<(), DeviceError> {
        let route = self.route()?;
        let fb: framebuffer::Handle = handle(framebuffer.0, "page flip")?;
        self.card
            .page_flip(route.crtc, fb, PageFlipFlags::EVENT, None)
            .map_err(|e| DeviceError::new("page flip", e))?;
        self.pending = Some(framebuffer);
        Ok(())
    }

    fn event_fd(&self) -> Option<BorrowedFd<'_>> {
        Some(self.card.as_fd())
    }

    fn read_events(&mut self) -> Result<Vec<FlipEvent>, DeviceError> {
        let crtc = self.route()?.crtc;
        let events = self
            .card
            .receive_events()
            .map_err(|e| DeviceError::new("read events", e))?;

        let mut flips = Vec::new();
        for event in events {
            let Event::PageFlip(flip) = event else {
                continue;
            };
            if flip.crtc != crtc {
                continue;
            }
            match self.pending.take() {
                Some(framebuffer) => flips.push(FlipEvent {
                    framebuffer,
                    sequence: flip.frame,
                }),
                None => warn!("page flip event on {:?} with no flip outstanding", crtc),
            }
        }
        Ok(flips)
    }

    fn probe_overlay(&mut self, _output: &Output) -> Option<PlaneId> {
        let crtc = self.route.as_ref()?.crtc;
        plane::find_overlay(&self.card, crtc).map(|plane| PlaneId(plane.into()))
    }

    fn set_plane(
        &mut self,
        plane: PlaneId,
        _output: &Output,
        framebuffer: Option<FramebufferId>,
        dest: Rect,
        src: Rect,
    ) -> Result<(), DeviceError> {
        let route = self.route()?;
        let plane = handle(plane.0, "set plane")?;
        let fb = framebuffer
            .map(|fb| handle::<framebuffer::Handle>(fb.0, "set plane"))
            .transpose()?;

        // Source coordinates are 16.16 fixed point.
        let src_rect = (
            (src.x.max(0) as u32) << 16,
            (src.y.max(0) as u32) << 16,
            src.width << 16,
            src.height << 16,
        );
        self.card
            .set_plane(
                plane,
                route.crtc,
                fb,
                0,
                (dest.x, dest.y, dest.width, dest.height),
                src_rect,
            )
            .map_err(|e| DeviceError::new("set plane", e))
    }
}
