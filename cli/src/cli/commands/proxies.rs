use std::time::Duration;

use crate::cli::ProxyCommands;
use wnrake_core::config::Config;
use wnrake_core::proxy::{ProxyPool, ProxyStatus};

pub async fn run(config: Config, command: ProxyCommands) -> anyhow::Result<()> {
    match command {
        ProxyCommands::List => {
            list(&config);
        }
        ProxyCommands::Status => {
            status(&config).await?;
        }
        ProxyCommands::Ip { name } => {
            ip(&config, &name).await?;
        }
        ProxyCommands::Restart { name } => {
            restart(&config, &name).await?;
        }
    }
    Ok(())
}

fn list(config: &Config) {
    if config.proxies.is_empty() {
        println!("No proxies configured.");
        return;
    }

    println!("{:<12} {:<30} {:<30} {:<6}", "NAME", "PROXY", "API", "ACTIVE");
    println!("{}", "-".repeat(80));

    for (name, entry) in &config.proxies {
        let active = if config.proxy.as_deref() == Some(name.as_str()) { "*" } else { "" };
        println!(
            "{:<12} {:<30} {:<30} {:<6}",
            name,
            entry.url,
            entry.api.as_deref().unwrap_or("-"),
            active
        );
    }
}

async fn status(config: &Config) -> anyhow::Result<()> {
    let pool = ProxyPool::from_config(config).await?;
    if pool.is_empty() {
        println!("No proxies configured.");
        return Ok(());
    }

    let rows = query_rows(&pool).await;

    println!("{:<12} {:<30} {:<10} {:<18}", "NAME", "PROXY", "STATUS", "PUBLIC IP");
    println!("{}", "-".repeat(72));
    for (name, url, status, ip) in rows {
        println!("{:<12} {:<30} {:<10} {:<18}", name, url, status, ip);
    }
    Ok(())
}

/// Queries every control API concurrently
async fn query_rows(pool: &ProxyPool) -> Vec<(String, String, ProxyStatus, String)> {
    let mut handles = Vec::new();
    for name in pool.names() {
        if let Some(endpoint) = pool.get(&name) {
            handles.push(tokio::spawn(async move {
                let status = endpoint.status().await.unwrap_or(ProxyStatus::Unknown);
                let ip = match endpoint.public_ip().await {
                    Ok(Some(ip)) => ip,
                    Ok(None) => "-".to_string(),
                    Err(e) => format!("error: {}", e),
                };
                (endpoint.name().to_string(), endpoint.url().to_string(), status, ip)
            }));
        }
    }

    let mut rows = Vec::new();
    for handle in handles {
        if let Ok(row) = handle.await {
            rows.push(row);
        }
    }
    rows
}

async fn ip(config: &Config, name: &str) -> anyhow::Result<()> {
    let pool = ProxyPool::from_config(config).await?;
    let endpoint = pool
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("Unknown proxy: {}", name))?;

    match endpoint.public_ip().await? {
        Some(ip) => println!("{}", ip),
        None => anyhow::bail!("Proxy {} has no control API configured", name),
    }
    Ok(())
}

async fn restart(config: &Config, name: &str) -> anyhow::Result<()> {
    let pool = ProxyPool::from_config(config).await?;
    let endpoint = pool
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("Unknown proxy: {}", name))?;
    let api = endpoint
        .api()
        .ok_or_else(|| anyhow::anyhow!("Proxy {} has no control API configured", name))?;

    println!("Restarting {}...", endpoint);
    api.restart(Duration::from_secs(config.retry.restart_timeout)).await?;

    match api.public_ip().await {
        Ok(ip) => println!("{} is running, public IP {}", name, ip),
        Err(_) => println!("{} is running", name),
    }
    Ok(())
}
