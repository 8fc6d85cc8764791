pub mod console;
pub mod touch;

pub use console::{is_quit_key, Console, RawTerminal};
pub use touch::{EvdevTouch, RawInputEvent, TouchDecoder};
