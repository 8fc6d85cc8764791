use std::time::Instant;

use log::{info, trace};

use crate::core::rate::{FlipRate, RateWindow};
use crate::display::{BufferId, Display};
use crate::error::{DeviceError, FlipError, SetupError};
use crate::frame::{FrameClock, FrameInfo};
use crate::traits::{DisplayDevice, FramebufferId, Painter};

/// Completions between two flips-per-second reports
pub const DEFAULT_REPORT_INTERVAL: u32 = 60;

/// One of the two swap-chain buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    A,
    B,
}

impl BufferSlot {
    pub fn other(self) -> Self {
        match self {
            BufferSlot::A => BufferSlot::B,
            BufferSlot::B => BufferSlot::A,
        }
    }

    fn index(self) -> usize {
        match self {
            BufferSlot::A => 0,
            BufferSlot::B => 1,
        }
    }
}

/// Flip state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipState {
    /// No flip outstanding
    Idle,
    /// Flip to `target` submitted, completion not yet observed
    FlipPending { target: BufferSlot },
}

/// Double-buffered swap chain driven by flip completions
///
/// Exactly one buffer is on screen. The painter only ever receives the
/// other one, and only while no flip to it is outstanding.
pub struct SwapChain<D: DisplayDevice> {
    display: Display<D>,
    buffers: [BufferId; 2],
    framebuffers: [FramebufferId; 2],
    on_screen: BufferSlot,
    state: FlipState,
    flips: u64,
    rate: RateWindow,
    frames: FrameClock,
    painter: Box<dyn Painter>,
    chaining: bool,
}

impl<D: DisplayDevice> SwapChain<D> {
    /// Build both buffers and mode-set buffer A as the initial picture
    ///
    /// Any failure drops `display`, which releases whatever was acquired.
    pub fn new(
        mut display: Display<D>,
        mut painter: Box<dyn Painter>,
        report_every: u32,
    ) -> Result<Self, SetupError> {
        let mut frames = FrameClock::new();

        let a = display.create_screen_buffer()?;
        display
            .paint(a, painter.as_mut(), &frames.tick(Instant::now()))
            .map_err(SetupError::Allocation)?;
        display.set_mode(a)?;

        let b = display.create_screen_buffer()?;
        display
            .paint(b, painter.as_mut(), &frames.tick(Instant::now()))
            .map_err(SetupError::Allocation)?;

        let framebuffers = match (display.framebuffer(a), display.framebuffer(b)) {
            (Some(fa), Some(fb)) => [fa, fb],
            _ => {
                return Err(SetupError::Allocation(DeviceError::other(
                    "register",
                    std::io::ErrorKind::NotFound,
                    "swap-chain buffer lost its framebuffer",
                )))
            }
        };

        Ok(Self {
            display,
            buffers: [a, b],
            framebuffers,
            on_screen: BufferSlot::A,
            state: FlipState::Idle,
            flips: 0,
            rate: RateWindow::new(report_every),
            frames,
            painter,
            chaining: true,
        })
    }

    /// Start the flip chain with the first flip to buffer B
    pub fn start(&mut self) -> Result<(), FlipError> {
        self.rate.reset(Instant::now());
        self.request_flip(BufferSlot::B)
    }

    /// Submit an asynchronous flip to `target`
    ///
    /// Rejected while a flip is pending; a busy device is reported as
    /// retryable and is never retried here.
    pub fn request_flip(&mut self, target: BufferSlot) -> Result<(), FlipError> {
        if let FlipState::FlipPending { .. } = self.state {
            return Err(FlipError::Pending);
        }
        if target == self.on_screen {
            return Err(FlipError::TargetOnScreen(self.framebuffer(target)));
        }

        match self.display.page_flip(self.buffers[target.index()]) {
            Ok(()) => {
                trace!("flip to {:?} submitted", target);
                self.state = FlipState::FlipPending { target };
                Ok(())
            }
            Err(e) if e.is_busy() => Err(FlipError::DeviceBusy(e)),
            Err(e) => Err(FlipError::Submit(e)),
        }
    }

    /// Handle the hardware's completion of the pending flip
    ///
    /// Marks `completed` on screen, paints the buffer that just left the
    /// screen and flips to it. Returns the measured rate every
    /// `report_every` completions.
    pub fn on_flip_complete(
        &mut self,
        completed: FramebufferId,
    ) -> Result<Option<FlipRate>, FlipError> {
        let target = match self.state {
            FlipState::FlipPending { target } if self.framebuffer(target) == completed => target,
            state => {
                return Err(FlipError::UnexpectedCompletion {
                    completed,
                    state: format!("{:?}", state),
                })
            }
        };

        self.on_screen = target;
        self.state = FlipState::Idle;
        self.flips += 1;

        if self.chaining {
            let next = target.other();
            let frame = self.frames.tick(Instant::now());
            self.paint(next, &frame)?;
            self.request_flip(next)?;
        }

        let rate = self.rate.tick();
        if let Some(rate) = rate {
            info!("freq: {:.2}Hz", rate.hz());
        }
        Ok(rate)
    }

    /// Pictures painted so far, both initial ones included
    pub fn painted(&self) -> u64 {
        self.frames.painted()
    }

    fn paint(&mut self, slot: BufferSlot, frame: &FrameInfo) -> Result<(), FlipError> {
        debug_assert_ne!(slot, self.on_screen);
        self.display
            .paint(self.buffers[slot.index()], self.painter.as_mut(), frame)
            .map_err(FlipError::Paint)
    }

    /// Stop chaining; the outstanding flip, if any, still completes
    pub fn stop(&mut self) {
        self.chaining = false;
    }

    pub fn is_chaining(&self) -> bool {
        self.chaining
    }

    pub fn state(&self) -> FlipState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == FlipState::Idle
    }

    pub fn on_screen(&self) -> BufferSlot {
        self.on_screen
    }

    /// Buffer the producer may write into
    pub fn off_screen(&self) -> BufferSlot {
        self.on_screen.other()
    }

    pub fn framebuffer(&self, slot: BufferSlot) -> FramebufferId {
        self.framebuffers[slot.index()]
    }

    pub fn buffer(&self, slot: BufferSlot) -> BufferId {
        self.buffers[slot.index()]
    }

    /// Completed flips since the chain started
    pub fn flips(&self) -> u64 {
        self.flips
    }

    /// Completions counted toward the next rate report
    pub fn rate_count(&self) -> u32 {
        self.rate.count()
    }

    pub fn display(&self) -> &Display<D> {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut Display<D> {
        &mut self.display
    }
}
