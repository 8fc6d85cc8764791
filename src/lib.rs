pub mod cli;
pub mod config;
pub mod core;
pub mod display;
pub mod error;
pub mod fbdev;
pub mod frame;
pub mod input;
pub mod kms;
pub mod paint;
pub mod session;
pub mod traits;

pub use config::{Backend, Config};
pub use display::{BufferId, Display};
pub use error::{DeviceError, FlipError, RuntimeError, SetupError};
