//! Runtime configuration for reddit-analytics.

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::nlp::ModelSpec;

/// Name sent in the Reddit user agent.
pub const APP_NAME: &str = "social summarizer";

const DEFAULT_SUBREDDIT: &str = "r/MachineLearning";
const DEFAULT_SUBMISSION_LIMIT: usize = 10;
const DEFAULT_SUMMARIZER: &str = "facebook/bart-large-cnn";
const DEFAULT_MASK_FILLER: &str = "distilroberta-base";

/// Pipeline parameters and service endpoints resolved from `.env` and defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Forum to fetch, with or without the `r/` prefix.
    pub subreddit_name: String,
    /// Upper bound on the number of newest posts fetched.
    pub submission_limit: usize,
    /// Summarization and mask-filling model identifiers.
    pub models: ModelSpec,
    /// Bearer token for the inference provider.
    pub hf_token: Option<String>,
    /// Hub endpoint used to resolve model identifiers.
    pub hf_hub_url: String,
    /// Inference endpoint; model ids are appended as path segments.
    pub hf_inference_url: String,
    /// Root folder for persisted datasets.
    pub data_dir: PathBuf,
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let subreddit_name =
            env::var("SUBREDDIT_NAME").unwrap_or_else(|_| DEFAULT_SUBREDDIT.to_string());
        let submission_limit = match env::var("SUBMISSION_LIMIT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("SUBMISSION_LIMIT is not a number: {raw}"))?,
            Err(_) => DEFAULT_SUBMISSION_LIMIT,
        };
        let models = ModelSpec {
            summarizer: env::var("SUMMARIZER_MODEL")
                .unwrap_or_else(|_| DEFAULT_SUMMARIZER.to_string()),
            mask_filler: env::var("MASK_FILLER_MODEL")
                .unwrap_or_else(|_| DEFAULT_MASK_FILLER.to_string()),
        };
        let hf_token = non_blank(env::var("HF_TOKEN").ok());
        let hf_hub_url =
            env::var("HF_HUB_URL").unwrap_or_else(|_| "https://huggingface.co".to_string());
        let hf_inference_url = env::var("HF_INFERENCE_URL")
            .unwrap_or_else(|_| "https://router.huggingface.co/hf-inference/models".to_string());
        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        std::fs::create_dir_all(&data_dir).context("creating data dir")?;

        Ok(Self {
            subreddit_name,
            submission_limit,
            models,
            hf_token,
            hf_hub_url,
            hf_inference_url,
            data_dir,
        })
    }

    /// Convenience helper for derived path segments.
    pub fn join_data<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.data_dir.join(path)
    }

    /// Location of the fetch stage output.
    pub fn submissions_path(&self) -> PathBuf {
        self.join_data("raw/submissions.parquet")
    }

    /// Location of the summarize stage output.
    pub fn summaries_path(&self) -> PathBuf {
        self.join_data("clean/submission_summaries.parquet")
    }
}

/// Reddit application credentials.
///
/// Built once and handed to the fetcher; presence of all three values is
/// checked here so nothing downstream reads the environment.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
}

impl RedditCredentials {
    /// Validate that every value is present and non-blank.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<Self> {
        let client_id = require("REDDIT_CLIENT_ID", Some(client_id.into()))?;
        let client_secret = require("REDDIT_SECRET", Some(client_secret.into()))?;
        let username = require("REDDIT_USERNAME", Some(username.into()))?;
        Ok(Self {
            client_id,
            client_secret,
            username,
        })
    }

    /// Read `REDDIT_CLIENT_ID`, `REDDIT_SECRET` and `REDDIT_USERNAME`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            client_id: require("REDDIT_CLIENT_ID", env::var("REDDIT_CLIENT_ID").ok())?,
            client_secret: require("REDDIT_SECRET", env::var("REDDIT_SECRET").ok())?,
            username: require("REDDIT_USERNAME", env::var("REDDIT_USERNAME").ok())?,
        })
    }

    /// Identifying string Reddit requires on every request.
    pub fn user_agent(&self) -> String {
        format!("{APP_NAME} by u/{}", self.username)
    }
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

fn require(key: &str, value: Option<String>) -> Result<String> {
    non_blank(value).ok_or_else(|| PipelineError::config(key, "missing or blank"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
