//! Summarize stage: per-row summary, hashtags and compression ratio.

use indexmap::IndexSet;
use tracing::{debug, info, instrument};

use crate::{
    data::schema::{Submission, SummaryRecord},
    error::{ModelError, PipelineError, Result},
    nlp::{MaskFiller, ModelProvider, ModelSpec, Summarizer},
};

/// Load both models once, then summarize every row in order.
#[instrument(
    skip_all,
    fields(
        rows = submissions.len(),
        summarizer = %models.summarizer,
        mask_filler = %models.mask_filler,
    )
)]
pub async fn summarize(
    provider: &dyn ModelProvider,
    submissions: &[Submission],
    models: &ModelSpec,
) -> Result<Vec<SummaryRecord>> {
    let summarizer = provider.load_summarizer(&models.summarizer).await?;
    let mask_filler = provider.load_mask_filler(&models.mask_filler).await?;
    summarize_submissions(submissions, summarizer.as_ref(), mask_filler.as_ref()).await
}

/// Enrich each submission. The first failing row aborts the batch.
pub async fn summarize_submissions(
    submissions: &[Submission],
    summarizer: &dyn Summarizer,
    mask_filler: &dyn MaskFiller,
) -> Result<Vec<SummaryRecord>> {
    let mut records = Vec::with_capacity(submissions.len());
    for (row, submission) in submissions.iter().enumerate() {
        let body = submission
            .selftext
            .as_deref()
            .filter(|text| !text.trim().is_empty());

        let (summary, hashtags) = match body {
            Some(text) => {
                let summary = get_summary(text, summarizer).await.map_err(|source| {
                    PipelineError::Inference {
                        task: "summarization",
                        model: summarizer.model_id().to_string(),
                        row,
                        permalink: submission.permalink.clone(),
                        source,
                    }
                })?;
                let hashtags = get_hashtags(&summary, mask_filler).await.map_err(|source| {
                    PipelineError::Inference {
                        task: "fill-mask",
                        model: mask_filler.model_id().to_string(),
                        row,
                        permalink: submission.permalink.clone(),
                        source,
                    }
                })?;
                (summary, hashtags)
            }
            None => {
                debug!(row, permalink = %submission.permalink, "no body text; skipping models");
                (String::new(), Vec::new())
            }
        };

        let summarization_pct = summarization_pct(&summary, submission.selftext.as_deref());
        records.push(SummaryRecord {
            author_name: submission.author_name.clone(),
            creation_datetime: submission.creation_datetime,
            permalink: submission.permalink.clone(),
            title: submission.title.clone(),
            selftext: submission.selftext.clone(),
            summary,
            hashtags,
            summarization_pct,
        });
    }
    info!(rows = records.len(), "summarized submissions");
    Ok(records)
}

/// First candidate of the summarization model, trimmed.
pub async fn get_summary(
    text: &str,
    summarizer: &dyn Summarizer,
) -> std::result::Result<String, ModelError> {
    let candidates = summarizer.summarize(text).await?;
    let first = candidates.into_iter().next().ok_or(ModelError::Empty)?;
    Ok(first.trim().to_string())
}

/// Ask the mask filler to complete `"<summary> #<mask>"` and keep its fills.
pub async fn get_hashtags(
    text: &str,
    mask_filler: &dyn MaskFiller,
) -> std::result::Result<Vec<String>, ModelError> {
    let prompt = format!("{} #{}", text.trim(), mask_filler.mask_token());
    let candidates = mask_filler.fill_mask(&prompt).await?;
    Ok(filter_hashtags(candidates.into_iter().map(|c| c.token_str)))
}

/// Deduplicate fills in rank order. When the longest fill is one character
/// long the whole set is noise and nothing is kept.
pub fn filter_hashtags<I>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let unique: IndexSet<String> = candidates.into_iter().collect();
    match unique.iter().map(|tag| tag.chars().count()).max() {
        None | Some(1) => Vec::new(),
        Some(_) => unique.into_iter().collect(),
    }
}

/// Summary length over body length, in characters. `NaN` without a body.
pub fn summarization_pct(summary: &str, selftext: Option<&str>) -> f64 {
    let body_len = selftext.map_or(0, |text| text.chars().count());
    if body_len == 0 {
        return f64::NAN;
    }
    summary.chars().count() as f64 / body_len as f64
}
