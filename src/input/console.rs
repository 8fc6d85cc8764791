use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use log::debug;

use crate::traits::QuitInput;

/// Byte for the escape key
const ESCAPE: u8 = 27;

pub fn is_quit_key(byte: u8) -> bool {
    byte == b'q' || byte == ESCAPE
}

/// Terminal switched to unbuffered, non-echoing input until dropped
pub struct RawTerminal {
    fd: RawFd,
    original: libc::termios,
}

impl RawTerminal {
    pub fn enable(fd: BorrowedFd<'_>) -> io::Result<Self> {
        let fd = fd.as_raw_fd();
        let mut original = MaybeUninit::<libc::termios>::uninit();
        // SAFETY: tcgetattr fills the struct on success.
        if unsafe { libc::tcgetattr(fd, original.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: initialised by the successful call above.
        let original = unsafe { original.assume_init() };

        let mut raw = original;
        raw.c_lflag &= !(libc::ICANON | libc::ECHO);
        // SAFETY: `raw` is a valid termios derived from the current one.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd, original })
    }

    fn restore(&self) {
        // SAFETY: restores the settings read in `enable`.
        if unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, &self.original) } != 0 {
            debug!("restoring terminal: {}", io::Error::last_os_error());
        }
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Standard input watched for `q` or Escape
pub struct Console {
    stdin: io::Stdin,
    _raw: RawTerminal,
}

impl Console {
    /// Raw-mode console on stdin, or `None` when stdin is not a terminal
    pub fn stdin() -> Option<Self> {
        let stdin = io::stdin();
        // SAFETY: isatty only inspects the descriptor.
        if unsafe { libc::isatty(libc::STDIN_FILENO) } != 1 {
            debug!("stdin is not a terminal, quit key disabled");
            return None;
        }
        match RawTerminal::enable(stdin.as_fd()) {
            Ok(raw) => Some(Self { stdin, _raw: raw }),
            Err(e) => {
                debug!("could not switch the terminal to raw mode: {}", e);
                None
            }
        }
    }
}

impl QuitInput for Console {
    fn fd(&self) -> BorrowedFd<'_> {
        self.stdin.as_fd()
    }

    // Reads the descriptor directly; std's buffered stdin would hide
    // leftover bytes from poll.
    fn quit_requested(&mut self) -> io::Result<bool> {
        let mut buf = [0u8; 64];
        // SAFETY: `buf` is valid for `buf.len()` bytes.
        let n = unsafe { libc::read(self.fd().as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            let e = io::Error::last_os_error();
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(e);
        }
        Ok(buf[..n as usize].iter().copied().any(is_quit_key))
    }
}
