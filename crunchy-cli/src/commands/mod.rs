mod archive;
mod completion;
mod download;
mod info;
mod login;
mod update;

pub use archive::Archive;
pub use completion::Completion;
pub use download::Download;
pub use info::Info;
pub use login::Login;
pub use update::Update;

use crate::{context::Context, logger::Logger};
use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("crunchy-cli/", env!("CARGO_PKG_VERSION"));

/// Download crunchyroll videos with ease. See the wiki for details about the cli and library: https://github.com/crunchy-labs/crunchy-cli/wiki
#[derive(Debug, Clone, Parser)]
#[command(name = "crunchy-cli", version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOptions,
}

#[derive(Debug, Clone, clap::Args)]
pub struct GlobalOptions {
    /// Disable all output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Adds debug messages to the normal output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Proxy to use.
    #[arg(short, long, global = true)]
    pub proxy: Option<String>,

    /// Useragent to do all request with.
    #[arg(long, global = true, default_value = DEFAULT_USER_AGENT)]
    pub useragent: String,
}

impl GlobalOptions {
    pub fn logger(&self) -> Logger {
        Logger::from_flags(self.quiet, self.verbose)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Archive(Archive),
    Download(Download),
    Info(Info),
    Login(Login),
    Update(Update),
    #[command(hide = true)]
    Completion(Completion),
}

/// Contract every subcommand implements.
#[allow(async_fn_in_trait)]
pub trait Execute {
    /// Cheap argument validation, runs before any network work.
    fn pre_check(&mut self) -> Result<()> {
        Ok(())
    }

    async fn execute(self, ctx: &Context<'_>) -> Result<()>;
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Archive(_) => "archive",
            Self::Download(_) => "download",
            Self::Info(_) => "info",
            Self::Login(_) => "login",
            Self::Update(_) => "update",
            Self::Completion(_) => "completion",
        }
    }

    /// Number of positional arguments the command was given.
    pub fn arg_count(&self) -> usize {
        match self {
            Self::Archive(x) => x.urls.len(),
            Self::Download(x) => x.urls.len(),
            Self::Completion(_) => 1,
            Self::Info(_) | Self::Login(_) | Self::Update(_) => 0,
        }
    }

    pub async fn execute(self, ctx: &Context<'_>) -> Result<()> {
        match self {
            Self::Archive(x) => run(x, ctx).await,
            Self::Download(x) => run(x, ctx).await,
            Self::Info(x) => run(x, ctx).await,
            Self::Login(x) => run(x, ctx).await,
            Self::Update(x) => run(x, ctx).await,
            Self::Completion(x) => run(x, ctx).await,
        }
    }
}

async fn run<T: Execute>(mut command: T, ctx: &Context<'_>) -> Result<()> {
    command.pre_check()?;
    command.execute(ctx).await
}

fn url_parser(s: &str) -> Result<Url, String> {
    let url = s.parse::<Url>().map_err(|x| format!("invalid url ({}).", x))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported url scheme '{}'.", url.scheme()));
    }

    Ok(url)
}
