// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::Parser;

use crate::config::Backend;
use crate::paint::PainterKind;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "vsync-flip")]
#[command(about = "Double-buffered vsync page flipping on KMS or fbdev", long_about = None)]
pub struct Cli {
    /// Display device node (default /dev/dri/card0 for kms, /dev/fb0 for fbdev)
    pub device: Option<PathBuf>,

    /// Display backend
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// What to paint into each frame
    #[arg(long, value_enum)]
    pub painter: Option<PainterKind>,

    /// Do not look for an overlay plane
    #[arg(long = "no-overlay", default_value = "false")]
    pub no_overlay: bool,

    /// Evdev touch screen node (falls back to $TSLIB_TSDEVICE)
    #[arg(long, value_name = "DEVICE")]
    pub touch: Option<PathBuf>,

    /// Completions between two rate reports
    #[arg(long = "report-every", value_name = "FLIPS")]
    pub report_every: Option<u32>,

    /// Seconds to wait for a device event before ticking
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Flip without waiting for vertical blank (fbdev only)
    #[arg(long = "no-vsync", default_value = "false")]
    pub no_vsync: bool,
}
