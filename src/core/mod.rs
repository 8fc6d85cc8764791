pub mod cancel;
pub mod event_loop;
pub mod geometry;
pub mod overlay;
pub mod rate;
pub mod swap_chain;

pub use cancel::CancelToken;
pub use event_loop::{EventLoop, LoopExit, DEFAULT_TICK};
pub use geometry::{DisplayMode, Layout, PixelFormat, Rect};
pub use overlay::Overlay;
pub use rate::{FlipRate, RateWindow};
pub use swap_chain::{BufferSlot, FlipState, SwapChain, DEFAULT_REPORT_INTERVAL};
