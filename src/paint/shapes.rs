use glam::Vec2;

use crate::core::geometry::Rect;
use crate::frame::FrameInfo;
use crate::paint::{Color, Surface};
use crate::traits::Painter;

/// Rectangle outline and a translucent circle, laid out in unit coordinates
#[derive(Debug, Clone, Copy)]
pub struct ShapesPainter {
    pub background: Color,
    /// Circle drifts horizontally with time when set
    pub animate: bool,
}

impl Default for ShapesPainter {
    fn default() -> Self {
        Self {
            background: Color::BLACK,
            animate: true,
        }
    }
}

impl ShapesPainter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Painted once, for buffers that never flip
    pub fn still() -> Self {
        Self {
            animate: false,
            ..Self::default()
        }
    }

    fn to_pixels(size: Vec2, unit: Vec2) -> Vec2 {
        (unit * size).round()
    }
}

impl Painter for ShapesPainter {
    fn paint(&mut self, surface: &mut Surface<'_>, frame: &FrameInfo) {
        let size = Vec2::new(surface.width() as f32, surface.height() as f32);
        let short_side = size.min_element();

        surface.clear(self.background);

        let origin = Self::to_pixels(size, Vec2::new(0.1, 0.1));
        let extent = Self::to_pixels(size, Vec2::new(0.3, 0.4));
        let line_width = (0.05 * short_side).round().max(1.0) as u32;
        surface.stroke_rect(
            Rect::new(origin.x as i32, origin.y as i32, extent.x as u32, extent.y as u32),
            line_width,
            Color::WHITE,
        );

        let drift = if self.animate { 0.05 * frame.seconds().sin() } else { 0.0 };
        let center = Self::to_pixels(size, Vec2::new(0.7 + drift, 0.3));
        let radius = (0.2 * short_side).round() as u32;
        surface.fill_circle(center.x as i32, center.y as i32, radius, Color::RED, 0.5);
    }
}
