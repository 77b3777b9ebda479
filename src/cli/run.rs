//! CLI entry-point running fetch and summarize back to back.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{cli, config::Settings};

/// Args for the `run` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    #[command(flatten)]
    pub fetch: cli::fetch::Args,
    #[command(flatten)]
    pub models: cli::summarize::Args,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, mut settings: Settings) -> Result<()> {
    args.fetch.apply(&mut settings);
    args.models.apply(&mut settings);
    let submissions = cli::fetch::fetch_and_store(&settings).await?;
    cli::summarize::summarize_and_store(&settings, &submissions).await
}
