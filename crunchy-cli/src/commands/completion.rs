use crate::{
    commands::{Args, Execute},
    context::Context,
};
use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io;

/// Generate shell completion scripts.
#[derive(Debug, Clone, clap::Args)]
pub struct Completion {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: Shell,
}

impl Execute for Completion {
    async fn execute(self, _: &Context<'_>) -> Result<()> {
        let mut cmd = Args::command();
        generate(self.shell, &mut cmd, "crunchy-cli", &mut io::stdout());
        Ok(())
    }
}
