use crate::{
    commands::Execute,
    context::Context,
    session::{Session, SessionStore},
};
use anyhow::Result;
use clap::{ArgGroup, Args};
use log::{debug, info};

/// Save your login session so other commands can use it.
#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("mode").required(true).args(["credentials", "etp_rt", "remove"])))]
pub struct Login {
    /// Login with credentials (username or email and password).
    #[arg(long, value_name = "USER:PASSWORD")]
    pub credentials: Option<String>,

    /// Login with the refresh token (`etp_rt` cookie) of a browser session.
    #[arg(long, value_name = "TOKEN")]
    pub etp_rt: Option<String>,

    /// Delete the stored login session.
    #[arg(long)]
    pub remove: bool,
}

impl Login {
    fn session(&self) -> Result<Option<Session>> {
        if let Some(credentials) = &self.credentials {
            Ok(Some(Session::from_credentials(credentials)?))
        } else if let Some(etp_rt) = &self.etp_rt {
            Ok(Some(Session::from_refresh_token(etp_rt)?))
        } else {
            Ok(None)
        }
    }
}

impl Execute for Login {
    fn pre_check(&mut self) -> Result<()> {
        self.session().map(|_| ())
    }

    async fn execute(self, _: &Context<'_>) -> Result<()> {
        let store = SessionStore::locate()?;
        debug!("Using session file {}", store.path().display());

        match self.session()? {
            Some(session) => {
                store.save(&session)?;
                info!("Stored login session for {}", session.describe());
            }
            None => {
                if store.remove()? {
                    info!("Removed stored login session");
                } else {
                    info!("No login session stored");
                }
            }
        }

        Ok(())
    }
}
