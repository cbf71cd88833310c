use crate::{
    commands::{Execute, url_parser},
    context::Context,
    downloader::Downloader,
    error::is_cancellation,
    progress::human_bytes,
    utils,
};
use anyhow::{Context as _, Result, bail};
use clap::Args;
use log::{error, info};
use reqwest::Url;
use std::path::PathBuf;

/// Download multiple urls into one directory, keeping what is already there.
#[derive(Debug, Clone, Args)]
pub struct Archive {
    /// Url(s) of the files to archive.
    #[arg(required = true, value_parser = url_parser)]
    pub urls: Vec<Url>,

    /// Directory which holds the archive.
    #[arg(short, long, required = true)]
    pub directory: PathBuf,

    /// Name of the archived files.
    /// `{name}` is replaced by the last path segment of the url and `{index}` by the position of the url (starting at 1).
    #[arg(short, long, default_value = "{name}")]
    pub output: String,

    /// Maximum number of attempts to download a file when the connection fails.
    #[arg(long, help_heading = "Download Options", default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..))]
    pub retry_count: u8,
}

impl Execute for Archive {
    fn pre_check(&mut self) -> Result<()> {
        if self.output.trim().is_empty() || self.output == "-" {
            bail!("archive needs a file name as output, `{}` is not one.", self.output);
        }

        if self.urls.len() > 1 && !utils::is_per_url_template(&self.output) {
            bail!(
                "`{}` names every url the same, use `{{name}}` or `{{index}}` in the output when archiving {} urls.",
                self.output,
                self.urls.len()
            );
        }

        Ok(())
    }

    async fn execute(self, ctx: &Context<'_>) -> Result<()> {
        let downloader = Downloader::new(&ctx.client, self.retry_count, ctx.logger.is_info());

        tokio::fs::create_dir_all(&self.directory)
            .await
            .with_context(|| format!("could not create {}", self.directory.display()))?;

        let mut failed = 0;

        for (i, url) in self.urls.iter().enumerate() {
            let path = self
                .directory
                .join(utils::format_output(&self.output, url, i + 1));

            if path.exists() {
                info!("Skipping {} (already archived as '{}')", url, path.display());
                continue;
            }

            info!("Archiving {} to '{}'", url, path.display());

            match downloader.save(url, &path).await {
                Ok(bytes) => info!("Archived '{}' ({})", path.display(), human_bytes(bytes)),
                Err(e) if is_cancellation(&e) => return Err(e),
                Err(e) => {
                    error!("{} could not be archived: {:#}", url, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            bail!("{} of {} url(s) could not be archived", failed, self.urls.len());
        }

        Ok(())
    }
}
