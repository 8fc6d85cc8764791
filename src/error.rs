use std::io;

use thiserror::Error;

use crate::traits::FramebufferId;

/// A device operation failed; names the operation and carries the OS error
#[derive(Debug, Error)]
#[error("{op} failed: {source}")]
pub struct DeviceError {
    pub op: &'static str,
    #[source]
    pub source: io::Error,
}

impl DeviceError {
    pub fn new(op: &'static str, source: io::Error) -> Self {
        Self { op, source }
    }

    /// Wrap `errno` of the last failed libc call
    pub fn last_os_error(op: &'static str) -> Self {
        Self::new(op, io::Error::last_os_error())
    }

    /// Error without an OS code behind it
    pub fn other(op: &'static str, kind: io::ErrorKind, message: &str) -> Self {
        Self::new(op, io::Error::new(kind, message.to_string()))
    }

    /// The device refused because a previous request is still queued
    pub fn is_busy(&self) -> bool {
        self.source.raw_os_error() == Some(libc::EBUSY)
    }
}

/// Failures while opening the device and building the swap chain
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("startup: {0}")]
    Startup(#[source] DeviceError),

    #[error("buffer allocation: {0}")]
    Allocation(#[source] DeviceError),

    #[error("mode-set: {0}")]
    ModeSet(#[source] DeviceError),

    #[error("the output has already been mode-set; later changes must flip")]
    ModeAlreadySet,

    #[error("initial flip: {0}")]
    InitialFlip(#[source] FlipError),
}

/// Failures of the flip state machine
#[derive(Debug, Error)]
pub enum FlipError {
    #[error("a flip is already pending")]
    Pending,

    #[error("flip target {0:?} is already on screen")]
    TargetOnScreen(FramebufferId),

    #[error("device busy: {0}")]
    DeviceBusy(#[source] DeviceError),

    #[error("flip submission: {0}")]
    Submit(#[source] DeviceError),

    #[error("paint: {0}")]
    Paint(#[source] DeviceError),

    #[error("completion for {completed:?} while {state}")]
    UnexpectedCompletion {
        completed: FramebufferId,
        state: String,
    },
}

impl FlipError {
    /// The caller may reissue the request at the next opportunity
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlipError::Pending | FlipError::DeviceBusy(_))
    }
}

/// Failures that end the event loop
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Flip(#[from] FlipError),

    #[error("reading completion events: {0}")]
    Read(#[source] DeviceError),

    #[error("waiting for events: {0}")]
    Wait(#[source] io::Error),

    #[error("console input: {0}")]
    Console(#[source] io::Error),
}
