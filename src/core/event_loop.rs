use std::io;
use std::os::fd::AsRawFd;
use std::time::Duration;

use log::{debug, info, trace, warn};

use crate::core::cancel::CancelToken;
use crate::core::swap_chain::SwapChain;
use crate::display::Display;
use crate::error::RuntimeError;
use crate::traits::{DisplayDevice, QuitInput};

/// Longest single wait before the loop ticks
pub const DEFAULT_TICK: Duration = Duration::from_secs(3);

/// Why the loop returned without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Cancelled and the chain drained to idle
    Cancelled,
    /// Cancelled, but the pending completion never arrived within a tick
    DrainTimedOut,
}

#[derive(Debug, Clone, Copy, Default)]
struct Readiness {
    device: bool,
    console: bool,
    console_closed: bool,
    interrupted: bool,
}

impl Readiness {
    fn is_timeout(&self) -> bool {
        !self.device && !self.console && !self.interrupted
    }
}

/// Single-threaded loop dispatching flip completions to a swap chain
pub struct EventLoop {
    tick: Duration,
    cancel: CancelToken,
    console: Option<Box<dyn QuitInput>>,
}

impl EventLoop {
    pub fn new(tick: Duration, cancel: CancelToken) -> Self {
        Self {
            tick,
            cancel,
            console: None,
        }
    }

    /// Also watch a console for the quit key
    pub fn with_console(mut self, console: Box<dyn QuitInput>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run until cancelled or until a flip fails
    ///
    /// Cancellation stops the chain but keeps dispatching until the
    /// outstanding flip has completed, so the caller can tear down safely.
    pub fn run<D: DisplayDevice>(
        &mut self,
        chain: &mut SwapChain<D>,
    ) -> Result<LoopExit, RuntimeError> {
        let mut draining = false;

        loop {
            if self.cancel.is_cancelled() {
                if chain.is_idle() {
                    info!("stopped after {} flips", chain.flips());
                    return Ok(LoopExit::Cancelled);
                }
                if !draining {
                    debug!("cancellation requested, waiting for the pending flip");
                    chain.stop();
                    draining = true;
                }
            }

            let ready = self.wait(chain.display())?;

            if ready.console {
                let quit = match self.console.as_mut() {
                    Some(console) => console.quit_requested().map_err(RuntimeError::Console)?,
                    None => false,
                };
                if quit {
                    info!("quit key pressed");
                    self.cancel.cancel();
                } else if ready.console_closed {
                    debug!("console closed, no longer watching it");
                    self.console = None;
                }
            }

            if ready.device {
                let events = chain.display_mut().read_events().map_err(RuntimeError::Read)?;
                for event in events {
                    trace!(
                        "flip to {:?} completed at vblank {}",
                        event.framebuffer,
                        event.sequence
                    );
                    chain.on_flip_complete(event.framebuffer)?;
                }
            }

            if ready.is_timeout() {
                if draining {
                    warn!("pending flip did not complete within {:?}, giving up", self.tick);
                    return Ok(LoopExit::DrainTimedOut);
                }
                debug!("no events for {:?}", self.tick);
            }
        }
    }

    fn wait<D: DisplayDevice>(&self, display: &Display<D>) -> Result<Readiness, RuntimeError> {
        let queued = display.has_queued_events();

        let mut fds: Vec<libc::pollfd> = Vec::with_capacity(2);
        let mut watch = |fd: i32| {
            fds.push(libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            });
            fds.len() - 1
        };
        let device = display.event_fd().map(|fd| watch(fd.as_raw_fd()));
        let console = self.console.as_ref().map(|c| watch(c.fd().as_raw_fd()));

        if queued && fds.is_empty() {
            return Ok(Readiness {
                device: true,
                ..Readiness::default()
            });
        }

        let timeout_ms = if queued {
            0
        } else {
            self.tick.as_millis().min(i32::MAX as u128) as i32
        };

        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let e = io::Error::last_os_error();
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(Readiness {
                    interrupted: true,
                    ..Readiness::default()
                });
            }
            return Err(RuntimeError::Wait(e));
        }

        let revents = |index: Option<usize>| index.map_or(0, |i| fds[i].revents);
        let readable = |index: Option<usize>| {
            revents(index) & (libc::POLLIN | libc::POLLERR | libc::POLLHUP) != 0
        };

        Ok(Readiness {
            device: queued || readable(device),
            console: readable(console),
            console_closed: revents(console) & (libc::POLLHUP | libc::POLLERR) != 0,
            interrupted: false,
        })
    }
}
