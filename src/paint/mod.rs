pub mod rectangles;
pub mod shapes;
pub mod surface;
pub mod tiles;

use clap::ValueEnum;
use serde::Deserialize;

pub use rectangles::RectanglesPainter;
pub use shapes::ShapesPainter;
pub use surface::{Color, LayoutMismatch, Surface};
pub use tiles::TilesPainter;

use crate::traits::{Painter, TouchSource};

/// Which painter feeds the swap chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PainterKind {
    /// Scrolling colour tiles
    #[default]
    Tiles,
    /// Rectangle outline and translucent circle
    Shapes,
    /// Accumulating random rectangles, touch-driven square
    Rectangles,
}

impl PainterKind {
    pub fn build(self, touch: Option<Box<dyn TouchSource>>) -> Box<dyn Painter> {
        match self {
            PainterKind::Tiles => Box::new(TilesPainter::new()),
            PainterKind::Shapes => Box::new(ShapesPainter::new()),
            PainterKind::Rectangles => Box::new(RectanglesPainter::new(touch)),
        }
    }
}
