use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use vsync_flip::cli::Cli;
use vsync_flip::core::LoopExit;
use vsync_flip::{session, Config};

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(&cli)?;
    info!(
        "{:?} on {} with the {:?} painter",
        config.backend,
        config.device_path().display(),
        config.painter
    );

    match session::run(&config)? {
        LoopExit::Cancelled => info!("bye"),
        LoopExit::DrainTimedOut => info!("exited with a flip still outstanding"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
