pub mod device;
pub mod input;
pub mod painter;

pub use device::*;
pub use input::*;
pub use painter::*;
