pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use wnrake_core::config::Overrides;

#[derive(Parser)]
#[command(name = "wnrake")]
#[command(author, version, about = "Fetch gateway - routes page requests through a challenge solver and rotating VPN proxies")]
pub struct Cli {
    /// Path to config file (checked in order: ./wnrake.toml, ~/.config/wnrake/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Solver endpoint (overrides config)
    #[arg(long, global = true)]
    pub solver: Option<String>,

    /// Cache directory (overrides config)
    #[arg(long, global = true, conflicts_with = "no_cache")]
    pub cache: Option<PathBuf>,

    /// Disable the disk cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Proxy to start with (overrides config)
    #[arg(short, long, global = true)]
    pub proxy: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            solver: self.solver.clone(),
            cache: self.cache.clone(),
            no_cache: self.no_cache,
            proxy: self.proxy.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the fetch gateway
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
    },

    /// Fetch one page and print it
    Fetch {
        url: String,

        /// Form field sent as POST data, repeatable
        #[arg(short, long, value_name = "KEY=VALUE")]
        form: Vec<String>,

        /// CSS selector the solver waits for
        #[arg(long, value_name = "CSS")]
        wait_selector: Option<String>,

        /// Write the page to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect and control the VPN proxies
    Proxies {
        #[command(subcommand)]
        command: ProxyCommands,
    },

    /// Validate or generate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Open a solver session and keep it until Enter is pressed
    Session,

    /// Show configuration summary and gateway status
    Status,
}

#[derive(Subcommand)]
pub enum ProxyCommands {
    /// List configured proxies
    List,

    /// Query VPN status and public IP of every proxy
    Status,

    /// Show the public IP of a proxy
    Ip { name: String },

    /// Reconnect the VPN behind a proxy
    Restart { name: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load and validate the configuration
    Check,

    /// Print the effective configuration
    Show,

    /// Print a sample configuration for N gluetun containers
    Sample {
        #[arg(short = 'n', long, default_value_t = 4)]
        count: usize,
    },
}
