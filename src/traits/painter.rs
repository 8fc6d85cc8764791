use crate::frame::FrameInfo;
use crate::paint::Surface;

/// Producer side of the swap chain - fills an off-screen buffer
///
/// Must only write inside the surface and must not keep it past the call.
pub trait Painter {
    fn paint(&mut self, surface: &mut Surface<'_>, frame: &FrameInfo);
}

impl<F> Painter for F
where
    F: FnMut(&mut Surface<'_>, &FrameInfo),
{
    fn paint(&mut self, surface: &mut Surface<'_>, frame: &FrameInfo) {
        self(surface, frame)
    }
}
