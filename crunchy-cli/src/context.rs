use crate::{commands::GlobalOptions, logger::Logger};
use reqwest::Client;

/// Process-wide state, built once before a subcommand runs and only read afterwards.
pub struct Context<'a> {
    pub client: Client,
    pub logger: &'a Logger,
    pub options: GlobalOptions,
}
