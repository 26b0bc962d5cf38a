mod config;
mod lifecycle;

use clap::Parser;
use log::{info, warn};

use config::Args;
use lifecycle::Launcher;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    // The child receives terminal signals itself; the launcher stays to report its status.
    if let Err(e) = ctrlc::set_handler(|| {}) {
        warn!("Failed to install interrupt handler: {}", e);
    }

    let launcher = Launcher::new(args.preload.clone())?;
    info!("Using preload library {}", launcher.preload().display());

    let code = launcher.run(&args)?;
    info!("Child exited with status {}", code);
    std::process::exit(code);
}
