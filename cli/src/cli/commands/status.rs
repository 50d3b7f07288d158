use std::path::PathBuf;
use std::time::Duration;

use wnrake_core::config::Config;
use wnrake_core::solver::SolverClient;

pub async fn run(config: Config, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    println!("wnrake Status");
    println!("=============");
    println!();
    println!("Configuration:");
    match config_path {
        Some(path) => println!("  Config file: {:?}", path),
        None => println!("  Config file: none (defaults)"),
    }
    println!("  Solver: {}", config.solver);
    match config.cache_dir() {
        Some(dir) => println!("  Cache dir: {:?}", dir),
        None => println!("  Cache dir: disabled"),
    }
    println!("  Recovery: {:?} ({} attempts)", config.retry.recovery, config.retry.attempts);
    println!();

    println!("Proxies:");
    println!("  Total: {}", config.proxies.len());
    println!(
        "  With control API: {}",
        config.proxies.values().filter(|p| p.api.is_some()).count()
    );
    println!("  Default: {}", config.proxy.as_deref().unwrap_or("-"));
    println!();

    let solver = SolverClient::new(&config.solver, Duration::from_secs(config.timeout))?;
    match solver.list_sessions().await {
        Ok(sessions) => println!("Solver: RUNNING ({} session(s))", sessions.len()),
        Err(e) => println!("Solver: NOT REACHABLE ({})", e),
    }

    let url = format!("http://{}:{}/healthz", config.server.host, config.server.port);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            println!("Gateway: RUNNING");
        }
        _ => {
            println!("Gateway: NOT RUNNING");
        }
    }

    Ok(())
}
