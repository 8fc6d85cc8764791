use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

use crate::cli::Cli;
use crate::core::{DEFAULT_REPORT_INTERVAL, DEFAULT_TICK};
use crate::paint::PainterKind;

/// Environment variable naming the touch screen device
pub const TOUCH_DEVICE_ENV: &str = "TSLIB_TSDEVICE";

/// Display subsystem the swap chain runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Kernel mode-setting with event-driven page flips
    #[default]
    Kms,
    /// Legacy framebuffer, panning between two halves of video memory
    Fbdev,
}

impl Backend {
    pub fn default_device(self) -> &'static Path {
        match self {
            Backend::Kms => Path::new("/dev/dri/card0"),
            Backend::Fbdev => Path::new("/dev/fb0"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Runtime settings: defaults, then the JSON file, then flags
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: Backend,
    /// Device node; the backend's default when unset
    pub device: Option<PathBuf>,
    pub painter: PainterKind,
    pub overlay: bool,
    pub touch: Option<PathBuf>,
    pub report_every: u32,
    /// Longest wait for a device event, in seconds
    pub timeout_secs: u64,
    pub vsync: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            device: None,
            painter: PainterKind::default(),
            overlay: true,
            touch: None,
            report_every: DEFAULT_REPORT_INTERVAL,
            timeout_secs: DEFAULT_TICK.as_secs(),
            vsync: true,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the configuration for this process
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        Self::resolve_with_env(cli, std::env::var_os(TOUCH_DEVICE_ENV))
    }

    pub fn resolve_with_env(cli: &Cli, touch_env: Option<OsString>) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);

        if config.touch.is_none() {
            config.touch = touch_env.filter(|v| !v.is_empty()).map(PathBuf::from);
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(backend) = cli.backend {
            self.backend = backend;
        }
        if let Some(device) = &cli.device {
            self.device = Some(device.clone());
        }
        if let Some(painter) = cli.painter {
            self.painter = painter;
        }
        if cli.no_overlay {
            self.overlay = false;
        }
        if let Some(touch) = &cli.touch {
            self.touch = Some(touch.clone());
        }
        if let Some(report_every) = cli.report_every {
            self.report_every = report_every;
        }
        if let Some(timeout) = cli.timeout {
            self.timeout_secs = timeout;
        }
        if cli.no_vsync {
            self.vsync = false;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.report_every == 0 {
            return Err(ConfigError::Invalid("report_every must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout must be at least one second"));
        }
        Ok(())
    }

    pub fn device_path(&self) -> &Path {
        self.device
            .as_deref()
            .unwrap_or_else(|| self.backend.default_device())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
