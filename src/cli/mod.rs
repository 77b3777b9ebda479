//! Command-line interface wiring for reddit-analytics.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Settings;

pub mod fetch;
pub mod run;
pub mod summarize;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(author, version, about = "Subreddit summarizer and hashtag generator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Fetch(args) => fetch::run(args, settings).await,
            Commands::Summarize(args) => summarize::run(args, settings).await,
            Commands::Run(args) => run::run(args, settings).await,
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch the newest posts of a subreddit into the raw dataset.
    Fetch(fetch::Args),
    /// Summarize the raw dataset and derive hashtags.
    Summarize(summarize::Args),
    /// Fetch, then summarize.
    Run(run::Args),
}
