use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::config::{Backend, Config};
use crate::core::{CancelToken, EventLoop, LoopExit, Overlay, SwapChain};
use crate::display::Display;
use crate::error::SetupError;
use crate::fbdev::FbdevDevice;
use crate::input::{Console, EvdevTouch};
use crate::kms::KmsDevice;
use crate::paint::{PainterKind, ShapesPainter};
use crate::traits::{DisplayDevice, QuitInput, TouchSource};

/// Open the configured device and flip until cancelled
pub fn run(config: &Config) -> Result<LoopExit> {
    let cancel = CancelToken::new();
    cancel
        .install_signal_handler()
        .context("installing the signal handler")?;

    let path = config.device_path();
    let console = Console::stdin().map(|c| Box::new(c) as Box<dyn QuitInput>);

    match config.backend {
        Backend::Kms => {
            let device =
                KmsDevice::open(path).with_context(|| format!("opening {}", path.display()))?;
            run_on(device, config, cancel, console)
        }
        Backend::Fbdev => {
            let device = FbdevDevice::open(path, config.vsync)
                .with_context(|| format!("opening {}", path.display()))?;
            run_on(device, config, cancel, console)
        }
    }
}

/// Drive an already opened device
///
/// Every resource is owned by the swap chain's display; returning from
/// here, on any path, tears them down in order and closes the device.
pub fn run_on<D: DisplayDevice>(
    device: D,
    config: &Config,
    cancel: CancelToken,
    console: Option<Box<dyn QuitInput>>,
) -> Result<LoopExit> {
    let display = Display::open(device)?;
    let painter = config.painter.build(open_touch(config));
    let mut chain = SwapChain::new(display, painter, config.report_every)?;

    let overlay = if config.overlay {
        setup_overlay(chain.display_mut())
    } else {
        None
    };

    let mut event_loop = EventLoop::new(config.tick(), cancel);
    if let Some(console) = console {
        event_loop = event_loop.with_console(console);
    }

    let result = chain
        .start()
        .map_err(SetupError::InitialFlip)
        .map_err(anyhow::Error::from)
        .and_then(|()| {
            info!("flipping; press q or Esc to quit");
            event_loop.run(&mut chain).map_err(anyhow::Error::from)
        });

    if let Some(overlay) = overlay {
        if let Err(e) = overlay.release(chain.display_mut()) {
            warn!("releasing the overlay: {}", e);
        }
    }

    let exit = result?;
    debug!("session ended: {:?}", exit);
    Ok(exit)
}

fn open_touch(config: &Config) -> Option<Box<dyn TouchSource>> {
    let path = config.touch.as_deref()?;
    if config.painter != PainterKind::Rectangles {
        debug!("{} ignored, the {:?} painter takes no touch input", path.display(), config.painter);
        return None;
    }
    match EvdevTouch::open(path) {
        Ok(touch) => Some(Box::new(touch)),
        Err(e) => {
            warn!("touch screen {} unavailable: {}", path.display(), e);
            None
        }
    }
}

/// Overlay problems never end the session
fn setup_overlay<D: DisplayDevice>(display: &mut Display<D>) -> Option<Overlay> {
    let mut painter = ShapesPainter::still();
    let mut overlay = match Overlay::setup(display, &mut painter) {
        Ok(overlay) => overlay?,
        Err(e) => {
            warn!("overlay setup failed, continuing without it: {}", e);
            return None;
        }
    };

    if let Err(e) = overlay.show(display) {
        warn!("could not show the overlay: {}", e);
        if let Err(e) = overlay.release(display) {
            warn!("releasing the overlay: {}", e);
        }
        return None;
    }
    Some(overlay)
}
