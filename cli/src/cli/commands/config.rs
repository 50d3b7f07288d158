use std::path::PathBuf;

use crate::cli::ConfigCommands;
use wnrake_core::config::Config;

pub fn run(
    config: anyhow::Result<Config>,
    config_path: Option<PathBuf>,
    command: ConfigCommands,
) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Check => {
            let config = config?;
            let source = config_path
                .map(|p| format!("{:?}", p))
                .unwrap_or_else(|| "no config file, defaults".to_string());
            println!("Configuration OK ({})", source);
            println!("  Solver: {}", config.solver);
            println!("  Proxies: {}", config.proxies.len());
            println!("  Default proxy: {}", config.proxy.as_deref().unwrap_or("-"));
        }
        ConfigCommands::Show => {
            print!("{}", config?.to_toml()?);
        }
        ConfigCommands::Sample { count } => {
            print!("{}", Config::sample(count).to_toml()?);
        }
    }
    Ok(())
}
