use serde::Deserialize;

/// Pixel layout of a scanout buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 32-bit, padding byte then R, G, B (little endian 0x00RRGGBB)
    Xrgb8888,
    /// 16-bit, 5 bits red, 6 bits green, 5 bits blue
    Rgb565,
}

impl PixelFormat {
    /// Bytes occupied by one pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::Xrgb8888 => 4,
            PixelFormat::Rgb565 => 2,
        }
    }

    pub fn bits_per_pixel(&self) -> u32 {
        self.bytes_per_pixel() * 8
    }

    /// Colour depth as the kernel counts it (padding bits excluded)
    pub fn depth(&self) -> u32 {
        match self {
            PixelFormat::Xrgb8888 => 24,
            PixelFormat::Rgb565 => 16,
        }
    }

    /// Map a framebuffer bit depth to a supported format
    pub fn from_bits_per_pixel(bpp: u32) -> Option<Self> {
        match bpp {
            32 => Some(PixelFormat::Xrgb8888),
            16 => Some(PixelFormat::Rgb565),
            _ => None,
        }
    }
}

/// Display mode - resolution and refresh of an output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Vertical refresh in Hz, 0 when unknown
    pub refresh: u32,
}

impl DisplayMode {
    pub fn new(width: u32, height: u32, refresh: u32) -> Self {
        Self { width, height, refresh }
    }
}

/// Memory layout of a mapped buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows
    pub stride: u32,
    pub format: PixelFormat,
}

impl Layout {
    pub fn new(width: u32, height: u32, stride: u32, format: PixelFormat) -> Self {
        Self { width, height, stride, format }
    }

    /// Tightly packed layout, stride is width times pixel size
    pub fn packed(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::new(width, height, width * format.bytes_per_pixel(), format)
    }

    /// Minimum byte length of a mapping holding this layout
    pub fn min_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Bytes of visible pixels in one row
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel() as usize
    }

    /// Stride large enough for the visible row
    pub fn is_consistent(&self) -> bool {
        self.row_bytes() <= self.stride as usize
    }
}

/// Rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Rectangle of the given size centered inside `outer`
    pub fn centered_in(outer: DisplayMode, width: u32, height: u32) -> Self {
        let width = width.min(outer.width);
        let height = height.min(outer.height);
        Self {
            x: ((outer.width - width) / 2) as i32,
            y: ((outer.height - height) / 2) as i32,
            width,
            height,
        }
    }
}
