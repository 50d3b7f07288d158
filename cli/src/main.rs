use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};
use wnrake_core::config::{load_located, locate_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Loaded before logging so `[logging] level` applies; errors surface in the command
    let located = locate_config(cli.config.clone());
    let config = match &located {
        Ok(path) => load_located(path.clone()).and_then(|config| Ok(config.apply(cli.overrides())?)),
        Err(e) => Err(anyhow::anyhow!("{}", e)),
    };
    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("wnrake={0},wnrake_core={0}", level))
            .add_directive("tower_http=debug".parse()?),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &located {
        Ok(Some(path)) => tracing::info!("Loaded config from {:?}", path),
        Ok(None) => tracing::info!("No config file found, using defaults"),
        Err(_) => {}
    }

    match cli.command {
        Commands::Serve { port, host } => {
            cli::commands::serve::run(config?, host, port).await?;
        }
        Commands::Fetch {
            url,
            form,
            wait_selector,
            output,
        } => {
            cli::commands::fetch::run(config?, &url, &form, wait_selector, output).await?;
        }
        Commands::Proxies { command } => {
            cli::commands::proxies::run(config?, command).await?;
        }
        Commands::Config { command } => {
            cli::commands::config::run(config, located.ok().flatten(), command)?;
        }
        Commands::Session => {
            cli::commands::session::run(config?).await?;
        }
        Commands::Status => {
            cli::commands::status::run(config?, located.ok().flatten()).await?;
        }
    }

    Ok(())
}
