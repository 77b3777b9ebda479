//! Error taxonomy shared by the fetch and summarize stages.

use std::fmt;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every way a pipeline run can abort. No variant is recovered locally.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing credential or invalid pipeline parameter.
    #[error("configuration error for {key}: {reason}")]
    Configuration { key: String, reason: String },

    /// Reddit rejected the application credentials.
    #[error("reddit authentication failed (HTTP {status}): {detail}")]
    Authentication { status: u16, detail: String },

    /// Transport failure, rate limiting or an unexpected status while fetching.
    #[error("fetching r/{subreddit} failed: {reason}")]
    TransientFetch { subreddit: String, reason: String },

    /// At least one fetched record did not match the submission schema.
    #[error("{0}")]
    Validation(ValidationReport),

    /// A model identifier could not be resolved.
    #[error("failed to load model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    /// A model call failed while processing a row.
    #[error("{task} with {model} failed on row {row} ({permalink}): {source}")]
    Inference {
        task: &'static str,
        model: String,
        row: usize,
        permalink: String,
        #[source]
        source: ModelError,
    },

    /// Building, reading or writing a tabular dataset failed.
    #[error("dataset error: {0}")]
    Dataset(#[from] polars::prelude::PolarsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by a model backend for a single call.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("model returned no candidates")]
    Empty,
}

/// Collected schema violations for one fetch call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub subreddit: String,
    pub total: usize,
    pub issues: Vec<RecordIssue>,
}

/// A single offending record, and the field at fault when it is known.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordIssue {
    pub index: Option<usize>,
    pub permalink: Option<String>,
    pub field: Option<String>,
    pub message: String,
}

impl ValidationReport {
    pub fn new(subreddit: impl Into<String>, total: usize) -> Self {
        Self {
            subreddit: subreddit.into(),
            total,
            issues: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        index: Option<usize>,
        permalink: Option<String>,
        field: Option<&str>,
        message: impl Into<String>,
    ) {
        self.issues.push(RecordIssue {
            index,
            permalink,
            field: field.map(str::to_string),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Names of the offending fields, in report order and without repeats.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for field in self.issues.iter().filter_map(|i| i.field.as_deref()) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "validation failed for r/{}: {} issue(s) across {} record(s)",
            self.subreddit,
            self.issues.len(),
            self.total
        )?;
        for issue in &self.issues {
            f.write_str("\n  - ")?;
            if let Some(index) = issue.index {
                write!(f, "#{index} ")?;
            }
            if let Some(permalink) = &issue.permalink {
                write!(f, "{permalink} ")?;
            }
            if let Some(field) = &issue.field {
                write!(f, "[{field}] ")?;
            }
            f.write_str(&issue.message)?;
        }
        Ok(())
    }
}
