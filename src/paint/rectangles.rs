use crate::core::geometry::Rect;
use crate::frame::FrameInfo;
use crate::paint::{Color, Surface};
use crate::traits::{Painter, TouchSample, TouchSource};

const TOUCH_SQUARE: f32 = 10.0;
const TOUCH_GROWTH: f32 = 1.05;

/// Random rectangles accumulating on a private canvas
///
/// While the touch screen is pressed a square grows under the finger
/// instead.
pub struct RectanglesPainter {
    rng: fastrand::Rng,
    touch: Option<Box<dyn TouchSource>>,
    canvas: Vec<Color>,
    size: (u32, u32),
    scale: f32,
}

impl RectanglesPainter {
    pub fn new(touch: Option<Box<dyn TouchSource>>) -> Self {
        Self::with_rng(fastrand::Rng::new(), touch)
    }

    pub fn with_rng(rng: fastrand::Rng, touch: Option<Box<dyn TouchSource>>) -> Self {
        Self {
            rng,
            touch,
            canvas: Vec::new(),
            size: (0, 0),
            scale: 1.0,
        }
    }

    /// Current growth factor of the touch square
    pub fn scale(&self) -> f32 {
        self.scale
    }

    fn random_rect(&mut self, width: u32, height: u32) -> Rect {
        let x = self.rng.u32(0..width);
        let y = self.rng.u32(0..height);
        let w = self.rng.u32(0..width - x);
        let h = self.rng.u32(0..height - y);
        Rect::new(x as i32, y as i32, w, h)
    }

    fn touched(&mut self) -> Option<TouchSample> {
        let touch = self.touch.as_mut()?;
        let samples = match touch.poll() {
            Ok(samples) => samples,
            Err(e) => {
                log::warn!("touch input unavailable, disabling it: {}", e);
                self.touch = None;
                return None;
            }
        };
        let pressed = samples.iter().any(TouchSample::is_pressed);
        samples.last().copied().filter(|_| pressed)
    }

    fn next_rect(&mut self, width: u32, height: u32) -> Rect {
        let random = self.random_rect(width, height);
        match self.touched() {
            Some(sample) => {
                // The square stops growing once it covers the screen.
                let max_scale = width.max(height) as f32 / TOUCH_SQUARE;
                self.scale = (self.scale * TOUCH_GROWTH).min(max_scale.max(1.0));
                let side = TOUCH_SQUARE * self.scale;
                Rect::new(
                    sample.x - (side / 2.0) as i32,
                    sample.y - (side / 2.0) as i32,
                    side as u32,
                    side as u32,
                )
            }
            None => {
                self.scale = 1.0;
                random
            }
        }
    }

    fn draw_on_canvas(&mut self, rect: Rect, color: Color) {
        let (width, height) = self.size;
        let clip = |start: i32, len: u32, limit: u32| {
            let end = (start as i64 + len as i64).clamp(0, limit as i64) as u32;
            (start.clamp(0, limit as i32) as u32, end)
        };
        let (x0, x1) = clip(rect.x, rect.width, width);
        let (y0, y1) = clip(rect.y, rect.height, height);
        for y in y0..y1 {
            let row = (y * width) as usize;
            self.canvas[row + x0 as usize..row + x1.max(x0) as usize].fill(color);
        }
    }
}

impl Painter for RectanglesPainter {
    fn paint(&mut self, surface: &mut Surface<'_>, _frame: &FrameInfo) {
        let (width, height) = (surface.width(), surface.height());
        if width == 0 || height == 0 {
            return;
        }
        if self.size != (width, height) {
            self.size = (width, height);
            self.canvas = vec![Color::BLACK; width as usize * height as usize];
        }

        let color = Color::rgb(self.rng.u8(..), self.rng.u8(..), self.rng.u8(..));
        let rect = self.next_rect(width, height);
        self.draw_on_canvas(rect, color);

        let canvas = &self.canvas;
        surface.fill_with(|x, y| canvas[(y * width + x) as usize]);
    }
}
