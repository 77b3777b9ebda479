//! CLI entry-point for fetching subreddit submissions.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    config::{RedditCredentials, Settings},
    data::{dataset, RedditFetcher, Submission},
};

/// Args for the `fetch` sub-command.
#[derive(Debug, Clone, ClapArgs)]
#[group(id = "fetch_args")]
pub struct Args {
    /// Subreddit to read, `r/` prefix optional.
    #[arg(long)]
    pub subreddit: Option<String>,
    /// Maximum number of newest posts to fetch.
    #[arg(long)]
    pub limit: Option<usize>,
}

impl Args {
    pub(crate) fn apply(&self, settings: &mut Settings) {
        if let Some(subreddit) = &self.subreddit {
            settings.subreddit_name = subreddit.clone();
        }
        if let Some(limit) = self.limit {
            settings.submission_limit = limit;
        }
    }
}

#[instrument(skip(settings))]
pub async fn run(args: Args, mut settings: Settings) -> Result<()> {
    args.apply(&mut settings);
    let submissions = fetch_and_store(&settings).await?;
    println!(
        "fetched {} submissions into {}",
        submissions.len(),
        settings.submissions_path().display()
    );
    Ok(())
}

/// Fetch stage followed by persisting the raw dataset.
pub(crate) async fn fetch_and_store(settings: &Settings) -> Result<Vec<Submission>> {
    let credentials = RedditCredentials::from_env().context("reading reddit credentials")?;
    let fetcher = RedditFetcher::new(credentials)?;
    info!(
        subreddit = %settings.subreddit_name,
        limit = settings.submission_limit,
        "fetching submissions"
    );
    let submissions = fetcher
        .fetch(&settings.subreddit_name, settings.submission_limit)
        .await
        .with_context(|| format!("fetch {}", settings.subreddit_name))?;

    let mut df = dataset::submissions_to_frame(&submissions)?;
    dataset::write_parquet(&mut df, &settings.submissions_path())
        .context("save raw submissions")?;
    Ok(submissions)
}
