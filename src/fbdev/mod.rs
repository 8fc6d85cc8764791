//! Legacy framebuffer backend
//!
//! The virtual screen is doubled in height and the two halves serve as
//! the swap-chain pages. A flip pans to the other half and, with vsync
//! enabled, blocks until the next vertical blank. Completion is queued
//! in-process since fbdev has no event descriptor.

pub mod ioctl;

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use memmap2::{MmapMut, MmapOptions};

use crate::core::geometry::{DisplayMode, Layout, PixelFormat};
use crate::error::DeviceError;
use crate::traits::{Allocation, AllocationId, DisplayDevice, FlipEvent, FramebufferId, Output};

pub use ioctl::{FixScreenInfo, VarScreenInfo};

/// Frame pacing when the driver cannot wait for vblank
const UNSYNCED_FRAME_TIME: Duration = Duration::from_millis(20);

const PAGES: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
struct Page {
    allocated: bool,
    registered: bool,
}

pub struct FbdevDevice {
    map: Option<MmapMut>,
    pages: [Page; PAGES],
    var: VarScreenInfo,
    original: Option<VarScreenInfo>,
    layout: Option<Layout>,
    queued: VecDeque<FlipEvent>,
    sequence: u32,
    vsync: bool,
    file: File,
}

fn page_of(framebuffer: FramebufferId) -> Result<usize, DeviceError> {
    match framebuffer.0 {
        n @ 1..=2 => Ok(n as usize - 1),
        _ => Err(DeviceError::other("pan", ErrorKind::InvalidInput, "unknown framebuffer")),
    }
}

impl FbdevDevice {
    pub fn open(path: &Path, vsync: bool) -> Result<Self, DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)
            .map_err(|e| DeviceError::new("open", e))?;
        info!("opened {}", path.display());

        Ok(Self {
            map: None,
            pages: [Page::default(); PAGES],
            var: VarScreenInfo::default(),
            original: None,
            layout: None,
            queued: VecDeque::new(),
            sequence: 0,
            vsync,
            file,
        })
    }

    fn fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }

    fn layout(&self) -> Result<Layout, DeviceError> {
        self.layout
            .ok_or_else(|| {
                DeviceError::other("layout", ErrorKind::NotConnected, "screen not configured")
            })
    }

    /// Show page `page` and wait for it to be scanned out
    fn pan_to(&mut self, page: usize) -> Result<(), DeviceError> {
        let layout = self.layout()?;
        self.var.xoffset = 0;
        self.var.yoffset = layout.height * page as u32;
        let fd = self.file.as_fd();
        ioctl::pan_display(fd, &mut self.var)?;

        if !self.vsync {
            std::thread::sleep(UNSYNCED_FRAME_TIME);
            return Ok(());
        }
        match ioctl::wait_for_vsync(fd) {
            Ok(()) => Ok(()),
            Err(e) if matches!(e.source.raw_os_error(), Some(libc::ENOTTY | libc::EINVAL)) => {
                warn!("driver cannot wait for vsync, flipping unsynchronised: {}", e);
                self.vsync = false;
                std::thread::sleep(UNSYNCED_FRAME_TIME);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn put_original(&mut self) -> Result<(), DeviceError> {
        let Some(mut original) = self.original.take() else {
            return Ok(());
        };
        ioctl::put_var_info(self.fd(), &mut original)
    }
}

impl DisplayDevice for FbdevDevice {
    type Snapshot = VarScreenInfo;

    /// Double the virtual height and map both pages
    fn find_output(&mut self) -> Result<Output, DeviceError> {
        let original = ioctl::get_var_info(self.fd())?;
        let format = PixelFormat::from_bits_per_pixel(original.bits_per_pixel).ok_or_else(|| {
            DeviceError::other("configure", ErrorKind::Unsupported, "unsupported bits per pixel")
        })?;

        let mut var = original;
        var.xoffset = 0;
        var.yoffset = 0;
        var.yres_virtual = original.yres * PAGES as u32;
        ioctl::put_var_info(self.fd(), &mut var)?;
        self.original = Some(original);

        if var.yres_virtual < original.yres * PAGES as u32 {
            return Err(DeviceError::other(
                "configure",
                ErrorKind::Unsupported,
                "driver refused a double-height virtual screen",
            ));
        }

        let fix = ioctl::get_fix_info(self.fd())?;
        let layout = Layout::new(var.xres, var.yres, fix.line_length, format);
        if !layout.is_consistent() || (fix.smem_len as usize) < layout.min_len() * PAGES {
            return Err(DeviceError::other(
                "configure",
                ErrorKind::Unsupported,
                "framebuffer memory too small for two pages",
            ));
        }

        // SAFETY: the framebuffer device maps its whole video memory; the
        // mapping lives in `self` next to the descriptor it came from.
        let map = unsafe { MmapOptions::new().len(fix.smem_len as usize).map_mut(&self.file) }
            .map_err(|e| DeviceError::new("mmap", e))?;
        debug!(
            "{}: {} bytes of video memory, line length {}",
            fix.name(),
            fix.smem_len,
            fix.line_length
        );

        self.var = var;
        self.layout = Some(layout);
        self.map = Some(map);

        Ok(Output {
            connector: 0,
            encoder: 0,
            pipe: 0,
            mode: DisplayMode::new(var.xres, var.yres, var.refresh()),
            format,
        })
    }

    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Allocation, DeviceError> {
        let layout = self.layout()?;
        if (width, height, format) != (layout.width, layout.height, layout.format) {
            return Err(DeviceError::other(
                "allocate",
                ErrorKind::Unsupported,
                "fbdev pages are always screen sized",
            ));
        }
        let page = self
            .pages
            .iter()
            .position(|p| !p.allocated)
            .ok_or_else(|| {
                DeviceError::other("allocate", ErrorKind::OutOfMemory, "both pages in use")
            })?;

        self.pages[page].allocated = true;
        let pixels = self.pixels(AllocationId(page as u32))?;
        pixels.fill(0);

        Ok(Allocation {
            id: AllocationId(page as u32),
            layout,
            size: layout.min_len(),
        })
    }

    fn pixels(&mut self, id: AllocationId) -> Result<&mut [u8], DeviceError> {
        let page_len = self.layout()?.min_len();
        let page = id.0 as usize;
        if !self.pages.get(page).is_some_and(|p| p.allocated) {
            return Err(DeviceError::other("pixels", ErrorKind::NotFound, "page not allocated"));
        }
        let map = self
            .map
            .as_mut()
            .ok_or_else(|| DeviceError::other("pixels", ErrorKind::NotConnected, "not mapped"))?;
        Ok(&mut map[page * page_len..(page + 1) * page_len])
    }

    fn release(&mut self, id: AllocationId) -> Result<(), DeviceError> {
        if let Some(page) = self.pages.get_mut(id.0 as usize) {
            page.allocated = false;
        }
        Ok(())
    }

    fn register(&mut self, allocation: &Allocation) -> Result<FramebufferId, DeviceError> {
        let page = self
            .pages
            .get_mut(allocation.id.0 as usize)
            .filter(|p| p.allocated)
            .ok_or_else(|| {
                DeviceError::other("register", ErrorKind::NotFound, "page not allocated")
            })?;
        page.registered = true;
        Ok(FramebufferId(allocation.id.0 + 1))
    }

    fn deregister(&mut self, framebuffer: FramebufferId) -> Result<(), DeviceError> {
        let page = page_of(framebuffer)?;
        self.pages[page].registered = false;
        Ok(())
    }

    fn current_config(&mut self, _output: &Output) -> Result<VarScreenInfo, DeviceError> {
        self.original
            .ok_or_else(|| {
                DeviceError::other("get config", ErrorKind::NotConnected, "screen not configured")
            })
    }

    fn set_mode(
        &mut self,
        _output: &Output,
        framebuffer: FramebufferId,
    ) -> Result<(), DeviceError> {
        self.pan_to(page_of(framebuffer)?)
    }

    /// Leave page 0 on screen, then put back the original geometry
    fn restore(&mut self, _output: &Output, snapshot: &VarScreenInfo) -> Result<(), DeviceError> {
        if let Err(e) = self.pan_to(0) {
            warn!("could not return to the first page: {}", e);
        }
        self.original = Some(*snapshot);
        self.put_original()
    }

    fn page_flip(
        &mut self,
        _output: &Output,
        framebuffer: FramebufferId,
    ) -> Result<(), DeviceError> {
        if !self.queued.is_empty() {
            return Err(DeviceError::new(
                "page flip",
                std::io::Error::from_raw_os_error(libc::EBUSY),
            ));
        }
        self.pan_to(page_of(framebuffer)?)?;
        self.sequence = self.sequence.wrapping_add(1);
        self.queued.push_back(FlipEvent {
            framebuffer,
            sequence: self.sequence,
        });
        Ok(())
    }

    fn event_fd(&self) -> Option<BorrowedFd<'_>> {
        None
    }

    fn has_queued_events(&self) -> bool {
        !self.queued.is_empty()
    }

    fn read_events(&mut self) -> Result<Vec<FlipEvent>, DeviceError> {
        Ok(self.queued.drain(..).collect())
    }
}

impl Drop for FbdevDevice {
    fn drop(&mut self) {
        // Geometry changed in find_output but never restored through the
        // display, e.g. when setup failed before the first mode-set.
        if self.original.is_some() {
            self.map = None;
            if let Err(e) = self.put_original() {
                warn!("could not restore framebuffer geometry: {}", e);
            }
        }
    }
}
