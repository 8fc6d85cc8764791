use std::fs::{File, OpenOptions};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use drm::control::Device as ControlDevice;
use drm::Device;

use crate::error::DeviceError;

/// Open DRM card node
#[derive(Debug)]
pub struct Card(File);

impl Card {
    pub fn open(path: &Path) -> Result<Self, DeviceError> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)
            .map(Card)
            .map_err(|e| DeviceError::new("open", e))
    }
}

impl AsFd for Card {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl Device for Card {}
impl ControlDevice for Card {}
