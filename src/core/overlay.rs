use log::{debug, info, warn};

use crate::core::geometry::Rect;
use crate::display::{BufferId, Display};
use crate::error::{DeviceError, SetupError};
use crate::frame::FrameInfo;
use crate::traits::{DisplayDevice, Painter, PlaneId};

/// Static buffer shown on a hardware overlay plane
///
/// Painted once and never flipped. Its lifecycle is independent of the
/// swap chain; the buffer itself is owned by the [`Display`].
#[derive(Debug)]
pub struct Overlay {
    plane: PlaneId,
    buffer: BufferId,
    dest: Rect,
    src: Rect,
    visible: bool,
}

impl Overlay {
    /// Probe for a plane once; allocate and paint the overlay if one exists
    ///
    /// No plane is not an error: `Ok(None)` and nothing is allocated.
    pub fn setup<D: DisplayDevice>(
        display: &mut Display<D>,
        painter: &mut dyn Painter,
    ) -> Result<Option<Self>, SetupError> {
        let Some(plane) = display.probe_overlay() else {
            info!("no overlay plane available, continuing without overlay");
            return Ok(None);
        };

        let mode = display.output().mode;
        let (width, height) = ((mode.width / 2).max(1), (mode.height / 2).max(1));
        let buffer = display.create_buffer(width, height, display.output().format)?;
        if let Err(e) = display.paint(buffer, painter, &FrameInfo::default()) {
            if let Err(release) = display.release_buffer(buffer) {
                warn!("releasing unpainted overlay buffer: {}", release);
            }
            return Err(SetupError::Allocation(e));
        }

        debug!("overlay plane {:?} with {}x{} buffer", plane, width, height);
        Ok(Some(Self {
            plane,
            buffer,
            dest: Rect::centered_in(mode, width, height),
            src: Rect::new(0, 0, width, height),
            visible: false,
        }))
    }

    pub fn plane(&self) -> PlaneId {
        self.plane
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Where the overlay lands on the output
    pub fn dest(&self) -> Rect {
        self.dest
    }

    pub fn show<D: DisplayDevice>(
        &mut self,
        display: &mut Display<D>,
    ) -> Result<(), DeviceError> {
        display.show_plane(self.plane, self.buffer, self.dest, self.src)?;
        self.visible = true;
        Ok(())
    }

    pub fn hide<D: DisplayDevice>(&mut self, display: &mut Display<D>) -> Result<(), DeviceError> {
        if !self.visible {
            return Ok(());
        }
        self.visible = false;
        display.hide_plane(self.plane)
    }

    /// Hide the plane and free the overlay buffer
    pub fn release<D: DisplayDevice>(
        mut self,
        display: &mut Display<D>,
    ) -> Result<(), DeviceError> {
        let hidden = self.hide(display);
        display.release_buffer(self.buffer)?;
        hidden
    }
}
