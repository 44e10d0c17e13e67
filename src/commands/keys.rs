//! Show profile key tables

use super::CommandResult;
use bluefire::config::BridgeConfig;

pub fn run(config: &BridgeConfig) -> CommandResult {
    let registry = config.registry()?;
    let profile = registry.get(&config.profile)?;

    println!("{} ({})", profile.display_name(), profile.name());
    for key in profile.keys() {
        println!("  0x{:06X}  {}", key.mask, key.name);
    }

    println!("\nAvailable profiles:");
    for name in registry.names() {
        let marker = if name == profile.name() { "*" } else { " " };
        println!("  {marker} {name}");
    }
    Ok(())
}
