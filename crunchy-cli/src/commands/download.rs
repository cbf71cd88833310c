use crate::{
    commands::{Execute, url_parser},
    context::Context,
    downloader::Downloader,
    progress::human_bytes,
    utils,
};
use anyhow::{Context as _, Result, bail};
use clap::Args;
use log::{debug, info};
use reqwest::Url;
use std::path::PathBuf;

/// Download a video.
#[derive(Debug, Clone, Args)]
pub struct Download {
    /// Url(s) of the files to download.
    #[arg(required = true, value_parser = url_parser)]
    pub urls: Vec<Url>,

    /// Name of the output file.
    /// `{name}` is replaced by the last path segment of the url and `{index}` by the position of the url (starting at 1).
    /// Use `-` to write to stdout.
    #[arg(short, long, default_value = "{name}")]
    pub output: String,

    /// Directory where the downloaded files are saved.
    /// By default current working directory is used.
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Skip files which are already existing.
    #[arg(long)]
    pub skip_existing: bool,

    /// Maximum number of attempts to download a file when the connection fails.
    #[arg(long, help_heading = "Download Options", default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..))]
    pub retry_count: u8,
}

impl Execute for Download {
    fn pre_check(&mut self) -> Result<()> {
        if self.output.trim().is_empty() {
            bail!("output file name cannot be empty.");
        } else if self.output == "-" && self.urls.len() > 1 {
            bail!("output `-` can only be used with a single url.");
        } else if self.output == "-" && self.directory.is_some() {
            bail!("--directory cannot be used when writing to stdout.");
        }

        Ok(())
    }

    async fn execute(self, ctx: &Context<'_>) -> Result<()> {
        let downloader = Downloader::new(&ctx.client, self.retry_count, ctx.logger.is_info());

        if self.output == "-" {
            debug!("Writing {} to stdout", self.urls[0]);
            downloader
                .save_to_stdout(&self.urls[0])
                .await
                .with_context(|| format!("url {} could not be downloaded", self.urls[0]))?;
            return Ok(());
        }

        if let Some(directory) = &self.directory {
            tokio::fs::create_dir_all(directory)
                .await
                .with_context(|| format!("could not create {}", directory.display()))?;
        }

        for (i, url) in self.urls.iter().enumerate() {
            let name = utils::format_output(&self.output, url, i + 1);
            let target = match &self.directory {
                Some(directory) => directory.join(name),
                None => PathBuf::from(name),
            };
            let (path, changed) = utils::free_file(target.clone());

            if changed && self.skip_existing {
                debug!("Skipping already existing file '{}'", target.display());
                continue;
            }

            info!("Downloading {} to '{}'", url, path.display());
            let bytes = downloader
                .save(url, &path)
                .await
                .with_context(|| format!("url {} could not be downloaded", url))?;
            info!("Downloaded '{}' ({})", path.display(), human_bytes(bytes));
        }

        Ok(())
    }
}
