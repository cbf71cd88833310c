use crate::{commands::Execute, context::Context, session::SessionStore};
use anyhow::Result;
use clap::Args;
use log::info;

/// Print information about the local setup and the stored login session.
#[derive(Debug, Clone, Args)]
pub struct Info {}

impl Execute for Info {
    async fn execute(self, ctx: &Context<'_>) -> Result<()> {
        let store = SessionStore::locate()?;

        info!("Version:    {}", env!("CARGO_PKG_VERSION"));
        info!("User agent: {}", ctx.options.useragent);

        if let Some(proxy) = ctx.options.proxy.as_deref().filter(|x| !x.is_empty()) {
            info!("Proxy:      {}", proxy);
        }

        info!("Config:     {}", store.dir().display());
        info!(
            "Session:    {}",
            store
                .load()?
                .map_or_else(|| "not logged in".to_owned(), |x| x.describe())
        );

        Ok(())
    }
}
