use std::io;
use std::os::fd::BorrowedFd;

/// One decoded touch report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSample {
    pub x: i32,
    pub y: i32,
    /// Zero when the finger is lifted
    pub pressure: i32,
}

impl TouchSample {
    pub fn is_pressed(&self) -> bool {
        self.pressure > 0
    }
}

/// Non-blocking source of touch samples
pub trait TouchSource {
    /// Drain every sample available right now
    fn poll(&mut self) -> io::Result<Vec<TouchSample>>;
}

/// Console the event loop watches for a quit keystroke
pub trait QuitInput {
    /// Descriptor that becomes readable on keyboard input
    fn fd(&self) -> BorrowedFd<'_>;

    /// Consume pending input; true when it contained a quit key
    fn quit_requested(&mut self) -> io::Result<bool>;
}
