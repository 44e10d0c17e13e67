//! bluefire command line
//!
//! Bridges a Bluetooth HID remote to a log or to Kodi.

use clap::Parser;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(&cli)?;

    let level = if cli.debug {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    commands::init_logging(level);

    match cli.command.unwrap_or(Commands::Log) {
        Commands::Log => commands::log::run(&config, cli.monitor)?,
        Commands::Kodi { host, port } => commands::kodi::run(&config, host, port, cli.monitor)?,
        Commands::Keys => commands::keys::run(&config)?,
    }

    Ok(())
}
