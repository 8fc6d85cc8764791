//! Linux framebuffer ioctls and their argument structures

use std::os::fd::{AsRawFd, BorrowedFd};

use bytemuck::{Pod, Zeroable};

use crate::error::DeviceError;

const FBIOGET_VSCREENINFO: libc::c_ulong = 0x4600;
const FBIOPUT_VSCREENINFO: libc::c_ulong = 0x4601;
const FBIOGET_FSCREENINFO: libc::c_ulong = 0x4602;
const FBIOPAN_DISPLAY: libc::c_ulong = 0x4606;
const FBIO_WAITFORVSYNC: libc::c_ulong = 0x4004_4620;

/// Colour channel placement inside a pixel
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Bitfield {
    pub offset: u32,
    pub length: u32,
    pub msb_right: u32,
}

/// `struct fb_var_screeninfo`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct VarScreenInfo {
    pub xres: u32,
    pub yres: u32,
    pub xres_virtual: u32,
    pub yres_virtual: u32,
    pub xoffset: u32,
    pub yoffset: u32,
    pub bits_per_pixel: u32,
    pub grayscale: u32,
    pub red: Bitfield,
    pub green: Bitfield,
    pub blue: Bitfield,
    pub transp: Bitfield,
    pub nonstd: u32,
    pub activate: u32,
    pub height: u32,
    pub width: u32,
    pub accel_flags: u32,
    pub pixclock: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
    pub hsync_len: u32,
    pub vsync_len: u32,
    pub sync: u32,
    pub vmode: u32,
    pub rotate: u32,
    pub colorspace: u32,
    pub reserved: [u32; 4],
}

impl VarScreenInfo {
    /// Refresh rate derived from the pixel clock, if the driver reports one
    pub fn refresh(&self) -> u32 {
        if self.pixclock == 0 {
            return 0;
        }
        let htotal = u64::from(self.xres + self.left_margin + self.right_margin + self.hsync_len);
        let vtotal = u64::from(self.yres + self.upper_margin + self.lower_margin + self.vsync_len);
        let picos = u64::from(self.pixclock) * htotal * vtotal;
        if picos == 0 {
            return 0;
        }
        (1_000_000_000_000u64 / picos) as u32
    }
}

/// `struct fb_fix_screeninfo`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FixScreenInfo {
    pub id: [u8; 16],
    pub smem_start: libc::c_ulong,
    pub smem_len: u32,
    pub kind: u32,
    pub type_aux: u32,
    pub visual: u32,
    pub xpanstep: u16,
    pub ypanstep: u16,
    pub ywrapstep: u16,
    pub line_length: u32,
    pub mmio_start: libc::c_ulong,
    pub mmio_len: u32,
    pub accel: u32,
    pub capabilities: u16,
    pub reserved: [u16; 2],
}

impl Default for FixScreenInfo {
    fn default() -> Self {
        Self {
            id: [0; 16],
            smem_start: 0,
            smem_len: 0,
            kind: 0,
            type_aux: 0,
            visual: 0,
            xpanstep: 0,
            ypanstep: 0,
            ywrapstep: 0,
            line_length: 0,
            mmio_start: 0,
            mmio_len: 0,
            accel: 0,
            capabilities: 0,
            reserved: [0; 2],
        }
    }
}

impl FixScreenInfo {
    pub fn name(&self) -> String {
        let end = self.id.iter().position(|&b| b == 0).unwrap_or(self.id.len());
        String::from_utf8_lossy(&self.id[..end]).into_owned()
    }
}

fn call<T>(
    fd: BorrowedFd<'_>,
    request: libc::c_ulong,
    arg: *mut T,
    op: &'static str,
) -> Result<(), DeviceError> {
    // SAFETY: every request here takes a pointer to a `T` of the matching
    // kernel layout, valid for the duration of the call.
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, arg) };
    if rc < 0 {
        return Err(DeviceError::last_os_error(op));
    }
    Ok(())
}

pub fn get_var_info(fd: BorrowedFd<'_>) -> Result<VarScreenInfo, DeviceError> {
    let mut info = VarScreenInfo::default();
    call(fd, FBIOGET_VSCREENINFO, &mut info, "FBIOGET_VSCREENINFO")?;
    Ok(info)
}

/// Apply `info`; the driver writes back what it actually accepted
pub fn put_var_info(fd: BorrowedFd<'_>, info: &mut VarScreenInfo) -> Result<(), DeviceError> {
    call(fd, FBIOPUT_VSCREENINFO, info, "FBIOPUT_VSCREENINFO")
}

pub fn get_fix_info(fd: BorrowedFd<'_>) -> Result<FixScreenInfo, DeviceError> {
    let mut info = FixScreenInfo::default();
    call(fd, FBIOGET_FSCREENINFO, &mut info, "FBIOGET_FSCREENINFO")?;
    Ok(info)
}

pub fn pan_display(fd: BorrowedFd<'_>, info: &mut VarScreenInfo) -> Result<(), DeviceError> {
    call(fd, FBIOPAN_DISPLAY, info, "FBIOPAN_DISPLAY")
}

pub fn wait_for_vsync(fd: BorrowedFd<'_>) -> Result<(), DeviceError> {
    let mut screen: u32 = 0;
    call(fd, FBIO_WAITFORVSYNC, &mut screen, "FBIO_WAITFORVSYNC")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_info_matches_kernel_size() {
        assert_eq!(std::mem::size_of::<VarScreenInfo>(), 160);
    }

    #[test]
    fn test_fix_info_matches_kernel_size() {
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<FixScreenInfo>(), 80);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(std::mem::size_of::<FixScreenInfo>(), 68);
    }

    #[test]
    fn test_refresh_from_timings() {
        // 1024x768@60 VESA timings
        let info = VarScreenInfo {
            xres: 1024,
            yres: 768,
            pixclock: 15384,
            left_margin: 160,
            right_margin: 24,
            hsync_len: 136,
            upper_margin: 29,
            lower_margin: 3,
            vsync_len: 6,
            ..Default::default()
        };
        assert_eq!(info.refresh(), 60);
    }

    #[test]
    fn test_refresh_unknown_without_pixclock() {
        assert_eq!(VarScreenInfo::default().refresh(), 0);
    }

    #[test]
    fn test_fix_info_name_stops_at_nul() {
        let mut info = FixScreenInfo::default();
        info.id[..6].copy_from_slice(b"mxsfb\0");
        assert_eq!(info.name(), "mxsfb");
    }
}
