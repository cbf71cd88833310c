use crate::{commands::Execute, context::Context};
use anyhow::{Context as _, Result, anyhow, bail};
use clap::Args;
use colored::Colorize;
use log::{debug, info};
use reqwest::Url;
use serde::Deserialize;
use std::cmp::Ordering;

const LATEST_RELEASE: &str = "https://api.github.com/repos/crunchy-labs/crunchy-cli/releases/latest";

/// Check if a newer version of crunchy-cli is available.
#[derive(Debug, Clone, Args)]
pub struct Update {
    /// Release api endpoint.
    #[arg(long, hide = true, default_value = LATEST_RELEASE)]
    pub api_url: Url,
}

#[derive(Deserialize)]
struct Release {
    tag_name: String,
    html_url: String,
}

impl Execute for Update {
    async fn execute(self, ctx: &Context<'_>) -> Result<()> {
        debug!("Fetching latest release from {}", self.api_url);

        let response = ctx
            .client
            .get(self.api_url.clone())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!("could not fetch latest release (HTTP {}).", status);
        }

        let release = serde_json::from_str::<Release>(&response.text().await?)
            .context("could not deserialize latest release")?;
        let current = env!("CARGO_PKG_VERSION");

        match compare_versions(&release.tag_name, current)? {
            Ordering::Greater => info!(
                "{} a new release of crunchy-cli is available {} -> {}\n  {}",
                "Notice".bold().cyan(),
                current.bold().red(),
                release.tag_name.trim_start_matches('v').bold().green(),
                release.html_url
            ),
            _ => info!("crunchy-cli is up to date ({})", current),
        }

        Ok(())
    }
}

fn parse_version(s: &str) -> Option<Vec<u64>> {
    let s = s.trim().trim_start_matches('v');
    // pre-release and build suffixes don't take part in the comparison
    let s = s.split(['-', '+']).next()?;

    s.split('.').map(|x| x.parse::<u64>().ok()).collect()
}

fn compare_versions(latest: &str, current: &str) -> Result<Ordering> {
    let latest_parts =
        parse_version(latest).ok_or_else(|| anyhow!("could not parse release version '{}'.", latest))?;
    let current_parts =
        parse_version(current).ok_or_else(|| anyhow!("could not parse version '{}'.", current))?;
    let len = latest_parts.len().max(current_parts.len());

    for i in 0..len {
        let a = latest_parts.get(i).copied().unwrap_or(0);
        let b = current_parts.get(i).copied().unwrap_or(0);

        match a.cmp(&b) {
            Ordering::Equal => continue,
            x => return Ok(x),
        }
    }

    Ok(Ordering::Equal)
}
