use crate::progress::Progress;
use anyhow::{Result, bail};
use log::debug;
use reqwest::{Client, Response, StatusCode, Url};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::{self, AsyncWrite, AsyncWriteExt},
    time,
};

/// Plain http(s) file fetching on top of the shared client.
pub struct Downloader<'a> {
    client: &'a Client,
    retries: u8,
    progress: bool,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a Client, retries: u8, progress: bool) -> Self {
        Self {
            client,
            retries: retries.max(1),
            progress,
        }
    }

    /// Downloads `url` into `path` and returns the number of written bytes.
    ///
    /// Data goes into `<path>.part` first, `path` only appears once complete.
    /// Every attempt starts the part file over.
    pub async fn save(&self, url: &Url, path: &Path) -> Result<u64> {
        let mut part = PartFile::new(path);

        for attempt in 1..=self.retries {
            let result = async {
                let response = self.response(url).await?;
                let mut file = File::create(&part.path).await?;
                let written = self.write(response, &mut file, path).await?;
                file.flush().await?;
                Ok::<_, anyhow::Error>(written)
            }
            .await;

            match result {
                Ok(written) => {
                    fs::rename(&part.path, path).await?;
                    part.committed = true;
                    return Ok(written);
                }
                Err(e) => self.retry_or_fail(e, url, attempt).await?,
            }
        }

        bail!("reached max retries to download {}.", url);
    }

    /// Only failures before the first byte are retried, written output can't be taken back.
    pub async fn save_to_stdout(&self, url: &Url) -> Result<u64> {
        let mut stdout = io::stdout();

        for attempt in 1..=self.retries {
            let response = match self.response(url).await {
                Ok(response) => response,
                Err(e) => {
                    self.retry_or_fail(e, url, attempt).await?;
                    continue;
                }
            };

            let written = self.write(response, &mut stdout, Path::new("-")).await?;
            stdout.flush().await?;
            return Ok(written);
        }

        bail!("reached max retries to download {}.", url);
    }

    async fn write<W: AsyncWrite + Unpin>(
        &self,
        mut response: Response,
        writer: &mut W,
        path: &Path,
    ) -> Result<u64> {
        let mut pb = if self.progress {
            let label = path
                .file_name()
                .map(|x| x.to_string_lossy().to_string())
                .unwrap_or_else(|| "-".to_owned());
            Some(Progress::new(&label, response.content_length()))
        } else {
            None
        };

        let mut written = 0;

        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if let Some(pb) = &mut pb {
                pb.update(written);
            }
        }

        Ok(written)
    }

    async fn response(&self, url: &Url) -> Result<Response> {
        Ok(self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?)
    }

    /// Returns once it is worth trying `url` again, errors otherwise.
    async fn retry_or_fail(&self, error: anyhow::Error, url: &Url, attempt: u8) -> Result<()> {
        let error = match error.downcast::<reqwest::Error>() {
            Ok(error) => error,
            // local i/o
            Err(error) => return Err(error),
        };

        let Some(reason) = retry_reason(&error) else {
            match error.status() {
                Some(status) => bail!("download failed {} (HTTP {})", url, status),
                None => bail!("download failed {} ({})", url, error),
            }
        };

        debug!(
            "attempt {}/{} failed: {} ({})",
            attempt, self.retries, url, reason
        );

        if attempt < self.retries {
            time::sleep(RETRY_DELAY * attempt as u32).await;
        }

        Ok(())
    }
}

const RETRY_DELAY: Duration = Duration::from_millis(200);

/// `<path>.part`, removed again unless the download was committed.
///
/// Dropping the `save` future (Ctrl+C) cleans up through [`Drop`] as well.
struct PartFile {
    path: PathBuf,
    committed: bool,
}

impl PartFile {
    fn new(target: &Path) -> Self {
        Self {
            path: part_path(target),
            committed: false,
        }
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Transient failures, `None` for everything that would fail again.
fn retry_reason(error: &reqwest::Error) -> Option<&'static str> {
    if error.is_connect() {
        return Some("connection error");
    } else if error.is_timeout() {
        return Some("timeout");
    } else if error.is_body() || error.is_decode() {
        // connection dropped while streaming
        return Some("incomplete body");
    }

    match error.status()? {
        StatusCode::GATEWAY_TIMEOUT => Some("gateway timeout"),
        StatusCode::REQUEST_TIMEOUT => Some("request timeout"),
        StatusCode::SERVICE_UNAVAILABLE => Some("service unavailable"),
        StatusCode::TOO_MANY_REQUESTS => Some("too many requests"),
        _ => None,
    }
}
