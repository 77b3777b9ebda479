//! CLI entry-point for summarizing fetched submissions.

use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    config::Settings,
    data::{dataset, Submission},
    nlp::{self, huggingface::HuggingFaceProvider},
};

/// Args for the `summarize` command.
#[derive(Debug, Clone, ClapArgs)]
#[group(id = "model_args")]
pub struct Args {
    /// Summarization model id.
    #[arg(long)]
    pub summarizer: Option<String>,
    /// Fill-mask model id used for hashtags.
    #[arg(long)]
    pub mask_filler: Option<String>,
}

impl Args {
    pub(crate) fn apply(&self, settings: &mut Settings) {
        if let Some(model) = &self.summarizer {
            settings.models.summarizer = model.clone();
        }
        if let Some(model) = &self.mask_filler {
            settings.models.mask_filler = model.clone();
        }
    }
}

#[instrument(skip(settings))]
pub async fn run(args: Args, mut settings: Settings) -> Result<()> {
    args.apply(&mut settings);
    let path = settings.submissions_path();
    if !path.exists() {
        bail!("{} missing; run fetch first", path.display());
    }
    let df = dataset::read_parquet(&path)?;
    let submissions = dataset::frame_to_submissions(&df).context("load raw submissions")?;
    summarize_and_store(&settings, &submissions).await
}

/// Summarize stage followed by persisting the enriched dataset.
pub(crate) async fn summarize_and_store(
    settings: &Settings,
    submissions: &[Submission],
) -> Result<()> {
    let provider = HuggingFaceProvider::new(settings)?;
    let records = nlp::summarize(&provider, submissions, &settings.models)
        .await
        .context("summarize submissions")?;

    let mut df = dataset::summaries_to_frame(&records)?;
    let out_path = settings.summaries_path();
    dataset::write_parquet(&mut df, &out_path).context("save summaries")?;
    info!(path = %out_path.display(), rows = records.len(), "summaries ready");
    println!("{df}");
    Ok(())
}
