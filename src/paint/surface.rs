use thiserror::Error;

use crate::core::geometry::{Layout, PixelFormat, Rect};

/// 8-bit per channel colour, converted to the surface format on write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_xrgb8888(value: u32) -> Self {
        Self::rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    pub fn to_xrgb8888(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub fn from_rgb565(value: u16) -> Self {
        let r = ((value >> 11) & 0x1f) as u8;
        let g = ((value >> 5) & 0x3f) as u8;
        let b = (value & 0x1f) as u8;
        Self::rgb(r << 3 | r >> 2, g << 2 | g >> 4, b << 3 | b >> 2)
    }

    pub fn to_rgb565(self) -> u16 {
        (self.r as u16 >> 3) << 11 | (self.g as u16 >> 2) << 5 | self.b as u16 >> 3
    }

    /// `self` drawn over `below` with the given opacity
    pub fn over(self, below: Color, alpha: f32) -> Color {
        let a = alpha.clamp(0.0, 1.0);
        let mix = |top: u8, bottom: u8| (top as f32 * a + bottom as f32 * (1.0 - a)).round() as u8;
        Color::rgb(mix(self.r, below.r), mix(self.g, below.g), mix(self.b, below.b))
    }
}

/// Mapped region is smaller than the layout claims
#[derive(Debug, Error, PartialEq, Eq)]
#[error("surface of {len} bytes cannot hold layout {layout:?}")]
pub struct LayoutMismatch {
    pub len: usize,
    pub layout: Layout,
}

/// Writable view of a mapped buffer, valid for one paint call
pub struct Surface<'a> {
    pixels: &'a mut [u8],
    layout: Layout,
}

impl<'a> Surface<'a> {
    pub fn new(pixels: &'a mut [u8], layout: Layout) -> Result<Self, LayoutMismatch> {
        if pixels.len() < layout.min_len() || !layout.is_consistent() {
            return Err(LayoutMismatch { len: pixels.len(), layout });
        }
        Ok(Self { pixels, layout })
    }

    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    pub fn stride(&self) -> u32 {
        self.layout.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.layout.format
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Visible bytes of row `y`, `None` below the last row
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.layout.height {
            return None;
        }
        let start = y as usize * self.layout.stride as usize;
        self.pixels.get_mut(start..start + self.layout.row_bytes())
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.layout.width || y as u32 >= self.layout.height {
            return None;
        }
        let bpp = self.layout.format.bytes_per_pixel() as usize;
        Some(y as usize * self.layout.stride as usize + x as usize * bpp)
    }

    /// Set single pixel, ignoring coordinates outside the surface
    pub fn put_pixel(&mut self, x: i32, y: i32, color: Color) {
        if let Some(offset) = self.offset(x, y) {
            write_color(&mut self.pixels[offset..], self.layout.format, color);
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        let offset = self.offset(x, y)?;
        Some(read_color(&self.pixels[offset..], self.layout.format))
    }

    /// Draw `color` over the existing pixel with the given opacity
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Color, alpha: f32) {
        if let Some(below) = self.pixel(x, y) {
            self.put_pixel(x, y, color.over(below, alpha));
        }
    }

    /// Fill every visible pixel from a per-pixel function
    pub fn fill_with(&mut self, mut shade: impl FnMut(u32, u32) -> Color) {
        let (width, height, format) = (self.layout.width, self.layout.height, self.layout.format);
        for y in 0..height {
            let Some(row) = self.row_mut(y) else {
                return;
            };
            match format {
                PixelFormat::Xrgb8888 => {
                    if let Ok(words) = bytemuck::try_cast_slice_mut::<u8, u32>(row) {
                        for (x, word) in words.iter_mut().enumerate() {
                            *word = shade(x as u32, y).to_xrgb8888();
                        }
                        continue;
                    }
                }
                PixelFormat::Rgb565 => {
                    if let Ok(halves) = bytemuck::try_cast_slice_mut::<u8, u16>(row) {
                        for (x, half) in halves.iter_mut().enumerate() {
                            *half = shade(x as u32, y).to_rgb565();
                        }
                        continue;
                    }
                }
            }
            let bpp = format.bytes_per_pixel() as usize;
            for x in 0..width {
                let start = x as usize * bpp;
                write_color(&mut row[start..start + bpp], format, shade(x, y));
            }
        }
    }

    pub fn clear(&mut self, color: Color) {
        self.fill_with(|_, _| color);
    }

    /// Draw filled rectangle, clipped to the surface
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                self.put_pixel(x, y, color);
            }
        }
    }

    /// Draw rectangle outline with the given line width
    pub fn stroke_rect(&mut self, rect: Rect, line_width: u32, color: Color) {
        let lw = line_width.min(rect.width).min(rect.height);
        if lw == 0 {
            return;
        }
        let bottom = rect.y + rect.height as i32 - lw as i32;
        let right = rect.x + rect.width as i32 - lw as i32;
        self.fill_rect(Rect::new(rect.x, rect.y, rect.width, lw), color);
        self.fill_rect(Rect::new(rect.x, bottom, rect.width, lw), color);
        self.fill_rect(Rect::new(rect.x, rect.y, lw, rect.height), color);
        self.fill_rect(Rect::new(right, rect.y, lw, rect.height), color);
    }

    /// Draw filled circle blended with the given opacity
    pub fn fill_circle(&mut self, cx: i32, cy: i32, radius: u32, color: Color, alpha: f32) {
        let r = radius as i32;
        let r_sq = r * r;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r_sq {
                    self.blend_pixel(cx + dx, cy + dy, color, alpha);
                }
            }
        }
    }

    fn clip(&self, rect: Rect) -> Option<(i32, i32, i32, i32)> {
        let x0 = rect.x.max(0);
        let y0 = rect.y.max(0);
        let x1 = (rect.x + rect.width as i32).min(self.layout.width as i32);
        let y1 = (rect.y + rect.height as i32).min(self.layout.height as i32);
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }
}

fn write_color(bytes: &mut [u8], format: PixelFormat, color: Color) {
    match format {
        PixelFormat::Xrgb8888 => bytes[..4].copy_from_slice(&color.to_xrgb8888().to_ne_bytes()),
        PixelFormat::Rgb565 => bytes[..2].copy_from_slice(&color.to_rgb565().to_ne_bytes()),
    }
}

fn read_color(bytes: &[u8], format: PixelFormat) -> Color {
    match format {
        PixelFormat::Xrgb8888 => {
            Color::from_xrgb8888(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        PixelFormat::Rgb565 => Color::from_rgb565(u16::from_ne_bytes([bytes[0], bytes[1]])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_bytes(layout: Layout) -> Vec<u8> {
        vec![0u8; layout.min_len()]
    }

    #[test]
    fn test_rejects_short_mapping() {
        let layout = Layout::packed(10, 10, PixelFormat::Xrgb8888);
        let mut bytes = vec![0u8; 399];
        assert!(Surface::new(&mut bytes, layout).is_err());
    }

    #[test]
    fn test_rejects_stride_smaller_than_row() {
        let layout = Layout::new(10, 2, 20, PixelFormat::Xrgb8888);
        let mut bytes = vec![0u8; 400];
        assert!(Surface::new(&mut bytes, layout).is_err());
    }

    #[test]
    fn test_put_pixel_respects_stride() {
        let layout = Layout::new(4, 3, 32, PixelFormat::Xrgb8888);
        let mut bytes = surface_bytes(layout);
        {
            let mut surface = Surface::new(&mut bytes, layout).unwrap();
            surface.put_pixel(1, 2, Color::rgb(0x11, 0x22, 0x33));
        }
        let offset = 2 * 32 + 4;
        let value = u32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap());
        assert_eq!(value, 0x00112233);
    }

    #[test]
    fn test_row_past_the_bottom_is_none() {
        let layout = Layout::new(2, 3, 12, PixelFormat::Rgb565);
        let mut bytes = surface_bytes(layout);
        let mut surface = Surface::new(&mut bytes, layout).unwrap();

        assert_eq!(surface.row_mut(2).map(|row| row.len()), Some(4));
        assert!(surface.row_mut(3).is_none());
        assert!(surface.row_mut(u32::MAX).is_none());
    }

    #[test]
    fn test_put_pixel_out_of_bounds_ignored() {
        let layout = Layout::packed(4, 4, PixelFormat::Xrgb8888);
        let mut bytes = surface_bytes(layout);
        let mut surface = Surface::new(&mut bytes, layout).unwrap();
        surface.put_pixel(-1, 0, Color::WHITE);
        surface.put_pixel(4, 0, Color::WHITE);
        surface.put_pixel(0, 4, Color::WHITE);
        drop(surface);
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fill_never_touches_row_padding() {
        let layout = Layout::new(3, 2, 16, PixelFormat::Xrgb8888);
        let mut bytes = surface_bytes(layout);
        Surface::new(&mut bytes, layout).unwrap().clear(Color::WHITE);

        for row in bytes.chunks(16) {
            for pixel in row[..12].chunks(4) {
                assert_eq!(u32::from_ne_bytes(pixel.try_into().unwrap()), 0x00ffffff);
            }
            assert!(row[12..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_rgb565_round_trip_of_primaries() {
        for color in [Color::BLACK, Color::WHITE, Color::RED, Color::rgb(0, 255, 0)] {
            assert_eq!(Color::from_rgb565(color.to_rgb565()), color);
        }
    }

    #[test]
    fn test_rgb565_surface() {
        let layout = Layout::packed(2, 2, PixelFormat::Rgb565);
        let mut bytes = surface_bytes(layout);
        let mut surface = Surface::new(&mut bytes, layout).unwrap();
        surface.put_pixel(1, 1, Color::RED);
        assert_eq!(surface.pixel(1, 1), Some(Color::RED));
        assert_eq!(surface.pixel(0, 0), Some(Color::BLACK));
    }

    #[test]
    fn test_blend_half() {
        let mixed = Color::WHITE.over(Color::BLACK, 0.5);
        assert_eq!(mixed, Color::rgb(128, 128, 128));
        assert_eq!(Color::RED.over(Color::BLACK, 1.0), Color::RED);
    }

    #[test]
    fn test_fill_rect_is_clipped() {
        let layout = Layout::packed(4, 4, PixelFormat::Xrgb8888);
        let mut bytes = surface_bytes(layout);
        let mut surface = Surface::new(&mut bytes, layout).unwrap();
        surface.fill_rect(Rect::new(-2, 2, 4, 10), Color::WHITE);

        assert_eq!(surface.pixel(0, 2), Some(Color::WHITE));
        assert_eq!(surface.pixel(1, 3), Some(Color::WHITE));
        assert_eq!(surface.pixel(2, 2), Some(Color::BLACK));
        assert_eq!(surface.pixel(0, 1), Some(Color::BLACK));
    }

    #[test]
    fn test_stroke_rect_leaves_inside_untouched() {
        let layout = Layout::packed(10, 10, PixelFormat::Xrgb8888);
        let mut bytes = surface_bytes(layout);
        let mut surface = Surface::new(&mut bytes, layout).unwrap();
        surface.stroke_rect(Rect::new(1, 1, 8, 8), 1, Color::WHITE);

        assert_eq!(surface.pixel(1, 1), Some(Color::WHITE));
        assert_eq!(surface.pixel(8, 5), Some(Color::WHITE));
        assert_eq!(surface.pixel(4, 4), Some(Color::BLACK));
        assert_eq!(surface.pixel(0, 0), Some(Color::BLACK));
    }

    #[test]
    fn test_fill_circle_center_and_outside() {
        let layout = Layout::packed(20, 20, PixelFormat::Xrgb8888);
        let mut bytes = surface_bytes(layout);
        let mut surface = Surface::new(&mut bytes, layout).unwrap();
        surface.fill_circle(10, 10, 3, Color::RED, 1.0);

        assert_eq!(surface.pixel(10, 10), Some(Color::RED));
        assert_eq!(surface.pixel(13, 10), Some(Color::RED));
        assert_eq!(surface.pixel(13, 13), Some(Color::BLACK));
    }
}
