use std::path::PathBuf;

use wnrake_core::config::Config;
use wnrake_core::fetcher::Fetcher;
use wnrake_core::solver::{SolverRequest, WaitFor};

fn parse_form(fields: &[String]) -> anyhow::Result<Vec<(&str, &str)>> {
    fields
        .iter()
        .map(|field| {
            field
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Form field must be KEY=VALUE: {}", field))
        })
        .collect()
}

pub async fn run(
    config: Config,
    url: &str,
    form: &[String],
    wait_selector: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut builder = if form.is_empty() {
        SolverRequest::get(url)
    } else {
        SolverRequest::post(url).form(&parse_form(form)?)
    };
    if let Some(selector) = wait_selector {
        builder = builder.wait_for(WaitFor::Selector(selector));
    }
    let request = builder.build();

    let fetcher = Fetcher::from_config(&config).await?;
    let result = fetcher.fetch(&request).await;
    fetcher.close().await;
    let page = result?;

    match output {
        Some(path) => {
            std::fs::write(&path, &page)?;
            tracing::info!("Saved {} bytes to {:?}", page.len(), path);
        }
        None => println!("{}", page),
    }

    Ok(())
}
