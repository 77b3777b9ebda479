//! Model seams for the summarize stage.

pub mod huggingface;
pub mod summarize;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

pub use summarize::{
    filter_hashtags, get_hashtags, get_summary, summarization_pct, summarize, summarize_submissions,
};

/// Identifiers of the two pretrained models a run uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub summarizer: String,
    pub mask_filler: String,
}

/// One ranked fill for the masked position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskCandidate {
    pub token_str: String,
    #[serde(default)]
    pub score: f64,
}

/// Sequence-to-sequence summarization.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Identifier used in error reports.
    fn model_id(&self) -> &str;

    /// Candidate summaries, best first.
    async fn summarize(&self, text: &str) -> std::result::Result<Vec<String>, ModelError>;
}

/// Masked-token filling.
#[async_trait]
pub trait MaskFiller: Send + Sync {
    fn model_id(&self) -> &str;

    /// Placeholder the model expects in its input.
    fn mask_token(&self) -> &str;

    /// Ranked fills for the single mask in `text`.
    async fn fill_mask(&self, text: &str) -> std::result::Result<Vec<MaskCandidate>, ModelError>;
}

/// Resolves model identifiers to ready-to-call models.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn load_summarizer(&self, model: &str) -> Result<Arc<dyn Summarizer>>;

    async fn load_mask_filler(&self, model: &str) -> Result<Arc<dyn MaskFiller>>;
}
