//! Row types flowing between the fetch and summarize stages.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Column order of the fetched dataset.
pub const SUBMISSION_COLUMNS: [&str; 12] = [
    "title",
    "author_name",
    "creation_datetime",
    "subreddit_name",
    "num_comments",
    "sfw",
    "score",
    "upvote_ratio",
    "is_self",
    "permalink",
    "selftext",
    "flair_text",
];

/// Column order of the summarized dataset.
pub const SUMMARY_COLUMNS: [&str; 8] = [
    "author_name",
    "creation_datetime",
    "permalink",
    "title",
    "selftext",
    "summary",
    "hashtags",
    "summarization_pct",
];

/// One validated forum post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub title: String,
    pub author_name: String,
    pub creation_datetime: DateTime<Utc>,
    pub subreddit_name: String,
    pub num_comments: i64,
    pub sfw: bool,
    pub score: i64,
    pub upvote_ratio: f64,
    pub is_self: bool,
    pub permalink: String,
    pub selftext: Option<String>,
    pub flair_text: Option<String>,
}

/// A submission projected down and enriched with model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub author_name: String,
    pub creation_datetime: DateTime<Utc>,
    pub permalink: String,
    pub title: String,
    pub selftext: Option<String>,
    pub summary: String,
    pub hashtags: Vec<String>,
    /// `NaN` when the post has no body text.
    pub summarization_pct: f64,
}

static SUBREDDIT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_]{1,20}(\+[A-Za-z0-9][A-Za-z0-9_]{1,20})*$")
        .expect("valid regex")
});

/// Strip a leading `r/` and check the remainder is a usable subreddit name.
pub fn normalize_forum_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let name = trimmed.strip_prefix("r/").unwrap_or(trimmed);
    if !SUBREDDIT_NAME.is_match(name) {
        return Err(PipelineError::config(
            "subreddit_name",
            format!("{raw:?} is not a valid subreddit name"),
        ));
    }
    Ok(name.to_string())
}
