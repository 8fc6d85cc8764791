use crate::frame::FrameInfo;
use crate::paint::{Color, Surface};
use crate::traits::Painter;

const TILE_SHIFT: u32 = 6;
const ROW_STEP: u32 = 0x0013_0502;
const COLUMN_STEP: u32 = 0x000a_1120;

/// Colored 64x64 tiles, scrolled one pixel per frame
#[derive(Debug, Clone, Copy, Default)]
pub struct TilesPainter {
    scroll: bool,
}

impl TilesPainter {
    pub fn new() -> Self {
        Self { scroll: true }
    }

    /// Tiles that stay put across frames
    pub fn fixed() -> Self {
        Self { scroll: false }
    }

    /// Tile colour for a pixel
    pub fn shade(x: u32, y: u32) -> Color {
        let value = ROW_STEP
            .wrapping_mul(y >> TILE_SHIFT)
            .wrapping_add(COLUMN_STEP.wrapping_mul(x >> TILE_SHIFT));
        Color::from_xrgb8888(value & 0x00ff_ffff)
    }
}

impl Painter for TilesPainter {
    fn paint(&mut self, surface: &mut Surface<'_>, frame: &FrameInfo) {
        let offset = if self.scroll { frame.number as u32 } else { 0 };
        surface.fill_with(|x, y| Self::shade(x.wrapping_add(offset), y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{Layout, PixelFormat};
    use std::time::Duration;

    fn frame(number: u64) -> FrameInfo {
        FrameInfo::new(number, Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_first_tile_is_black() {
        assert_eq!(TilesPainter::shade(0, 0), Color::BLACK);
        assert_eq!(TilesPainter::shade(63, 63), Color::BLACK);
    }

    #[test]
    fn test_tiles_change_every_64_pixels() {
        assert_eq!(TilesPainter::shade(64, 0), Color::from_xrgb8888(COLUMN_STEP));
        assert_eq!(TilesPainter::shade(0, 64), Color::from_xrgb8888(ROW_STEP));
        assert_eq!(TilesPainter::shade(64, 5), TilesPainter::shade(127, 60));
    }

    #[test]
    fn test_scroll_follows_frame_number() {
        let layout = Layout::packed(128, 1, PixelFormat::Xrgb8888);
        let mut bytes = vec![0u8; layout.min_len()];
        let mut surface = Surface::new(&mut bytes, layout).unwrap();

        TilesPainter::new().paint(&mut surface, &frame(10));
        assert_eq!(surface.pixel(54, 0), Some(TilesPainter::shade(64, 0)));
        assert_eq!(surface.pixel(53, 0), Some(Color::BLACK));
    }

    #[test]
    fn test_fixed_tiles_ignore_frames() {
        let layout = Layout::packed(128, 1, PixelFormat::Rgb565);
        let mut bytes = vec![0u8; layout.min_len()];
        let mut surface = Surface::new(&mut bytes, layout).unwrap();

        TilesPainter::fixed().paint(&mut surface, &frame(10));
        assert_eq!(surface.pixel(53, 0), Some(Color::BLACK));
    }
}
