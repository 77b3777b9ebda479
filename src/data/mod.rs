//! Fetching, schema and dataset layer.

pub mod dataset;
pub mod reddit;
pub mod schema;

pub use reddit::RedditFetcher;
pub use schema::{normalize_forum_name, Submission, SummaryRecord};
