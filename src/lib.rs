//! Fetch the newest posts of a subreddit, summarize them with a pretrained
//! model and derive hashtags with a mask-filling model.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod nlp;

pub use error::{PipelineError, Result};
