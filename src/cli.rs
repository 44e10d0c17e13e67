// CLI definitions using clap

use bluefire_transport::BdAddr;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bluefire")]
#[command(author, version, about = "Bluetooth HID remote bridge")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: <config dir>/bluefire/bluefire.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Remote address (connect mode) or local adapter address (listen mode)
    #[arg(short, long, global = true, value_name = "ADDR")]
    pub address: Option<BdAddr>,

    /// Dial out to the remote instead of waiting for it to connect
    #[arg(short, long, global = true)]
    pub connect: bool,

    /// Idle duration after which the remote is disconnected
    #[arg(short, long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Device profile (see `bluefire keys`)
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Log every frame received from the remote
    #[arg(long, global = true)]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log key presses and releases until the remote disconnects (default)
    #[command(visible_alias = "l")]
    Log,

    /// Relay key presses to Kodi, reconnecting until interrupted
    #[command(visible_alias = "k")]
    Kodi {
        /// Host that runs Kodi (default: relay.host from the config file)
        host: Option<String>,

        /// EventServer port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show the active profile's key table and all known profiles
    Keys,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_kodi() {
        let cli = Cli::try_parse_from([
            "bluefire", "--connect", "-a", "54:4A:16:4D:AC:32", "kodi", "10.0.0.2", "--port", "9778",
        ])
        .unwrap();
        assert!(cli.connect);
        assert_eq!(cli.address.unwrap().to_string(), "54:4A:16:4D:AC:32");
        match cli.command {
            Some(Commands::Kodi { host, port }) => {
                assert_eq!(host.as_deref(), Some("10.0.0.2"));
                assert_eq!(port, Some(9778));
            }
            _ => panic!("expected kodi command"),
        }
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(Cli::try_parse_from(["bluefire", "-a", "nope", "log"]).is_err());
    }
}
