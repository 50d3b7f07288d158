use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use wnrake_core::config::Config;
use wnrake_core::proxy::ProxyPool;
use wnrake_core::solver::SolverClient;

/// Keeps a solver session open for manual use of the solver's browser
pub async fn run(config: Config) -> anyhow::Result<()> {
    let solver = SolverClient::new(&config.solver, Duration::from_secs(config.timeout))?;
    let pool = ProxyPool::from_config(&config).await?;
    let proxy = pool.current().await;

    let session = solver.create_session(proxy.as_deref()).await?;
    println!("Session: {}", session);
    match &proxy {
        Some(proxy) => println!("Proxy: {}", proxy),
        None => println!("Proxy: direct"),
    }
    println!("Press Enter to close the session");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;

    solver.destroy_session(&session).await?;
    println!("Session closed.");
    Ok(())
}
