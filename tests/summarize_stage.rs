use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use reddit_analytics::{
    data::{
        dataset,
        schema::{Submission, SUMMARY_COLUMNS},
    },
    error::ModelError,
    nlp::{
        filter_hashtags, get_hashtags, summarization_pct, summarize, summarize_submissions,
        MaskCandidate, MaskFiller, ModelProvider, ModelSpec, Summarizer,
    },
    PipelineError, Result,
};

/// Summarizer double answering from a lookup table.
struct CannedSummarizer {
    answers: HashMap<String, String>,
    calls: AtomicUsize,
}

impl CannedSummarizer {
    fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            answers: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Summarizer for CannedSummarizer {
    fn model_id(&self) -> &str {
        "test/summarizer"
    }

    async fn summarize(&self, text: &str) -> std::result::Result<Vec<String>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.get(text) {
            Some(summary) => Ok(vec![format!("  {summary}\n"), "runner-up".to_string()]),
            None => Err(ModelError::Status {
                status: 500,
                body: "no canned answer".to_string(),
            }),
        }
    }
}

/// Mask filler double returning fixed candidates and recording prompts.
struct FixedFills {
    tokens: Vec<&'static str>,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl FixedFills {
    fn new(tokens: Vec<&'static str>) -> Self {
        Self {
            tokens,
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MaskFiller for FixedFills {
    fn model_id(&self) -> &str {
        "test/mask-filler"
    }

    fn mask_token(&self) -> &str {
        "<mask>"
    }

    async fn fill_mask(&self, text: &str) -> std::result::Result<Vec<MaskCandidate>, ModelError> {
        self.prompts.lock().unwrap().push(text.to_string());
        Ok(self
            .tokens
            .iter()
            .enumerate()
            .map(|(rank, token)| MaskCandidate {
                token_str: token.to_string(),
                score: 1.0 / (rank + 1) as f64,
            })
            .collect())
    }
}

struct StaticProvider {
    summarizer: Arc<CannedSummarizer>,
    mask_filler: Arc<FixedFills>,
    loads: AtomicUsize,
}

#[async_trait]
impl ModelProvider for StaticProvider {
    async fn load_summarizer(&self, model: &str) -> Result<Arc<dyn Summarizer>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if model != "test/summarizer" {
            return Err(PipelineError::ModelLoad {
                model: model.to_string(),
                reason: "unknown".to_string(),
            });
        }
        Ok(self.summarizer.clone())
    }

    async fn load_mask_filler(&self, _model: &str) -> Result<Arc<dyn MaskFiller>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.mask_filler.clone())
    }
}

const FOX: &str = "The quick brown fox jumps over the lazy dog.";

fn submission(permalink: &str, selftext: Option<&str>) -> Submission {
    Submission {
        title: format!("post {permalink}"),
        author_name: "someone".to_string(),
        creation_datetime: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        subreddit_name: "r/test".to_string(),
        num_comments: 1,
        sfw: true,
        score: 5,
        upvote_ratio: 1.0,
        is_self: true,
        permalink: permalink.to_string(),
        selftext: selftext.map(str::to_string),
        flair_text: None,
    }
}

fn specs() -> ModelSpec {
    ModelSpec {
        summarizer: "test/summarizer".to_string(),
        mask_filler: "test/mask-filler".to_string(),
    }
}

fn provider(fills: Vec<&'static str>) -> StaticProvider {
    StaticProvider {
        summarizer: Arc::new(CannedSummarizer::new(&[(FOX, "Quick fox jumps over dog.")])),
        mask_filler: Arc::new(FixedFills::new(fills)),
        loads: AtomicUsize::new(0),
    }
}

#[test]
fn single_character_fills_are_discarded() {
    let tags = filter_hashtags(["a", "b", "c"].map(String::from));
    assert!(tags.is_empty());
}

#[test]
fn mixed_length_fills_are_kept_and_deduplicated() {
    let tags = filter_hashtags(["sunset", "a", "sunset"].map(String::from));
    let set: HashSet<_> = tags.iter().map(String::as_str).collect();
    assert_eq!(tags.len(), 2);
    assert_eq!(set, HashSet::from(["sunset", "a"]));
}

#[test]
fn no_fills_means_no_hashtags() {
    assert!(filter_hashtags(Vec::<String>::new()).is_empty());
}

#[test]
fn ratio_counts_characters_not_bytes() {
    assert_eq!(summarization_pct("héllo", Some("héllo wörld")), 5.0 / 11.0);
    assert!(summarization_pct("", Some("")).is_nan());
    assert!(summarization_pct("", None).is_nan());
}

#[tokio::test]
async fn hashtag_prompt_appends_mask_to_trimmed_summary() {
    let fills = FixedFills::new(vec!["ai", "ml"]);
    let tags = get_hashtags("  Models drift. ", &fills).await.unwrap();
    assert_eq!(tags, vec!["ai", "ml"]);
    assert_eq!(fills.prompts.lock().unwrap()[0], "Models drift. #<mask>");
}

#[tokio::test]
async fn fox_post_is_summarized_end_to_end() {
    let provider = provider(vec!["fox", "dog", "fox", "a"]);
    let rows = vec![submission("/r/test/1", Some(FOX))];

    let records = summarize(&provider, &rows, &specs()).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.summary, "Quick fox jumps over dog.");
    assert_eq!(record.hashtags, vec!["fox", "dog", "a"]);

    let expected = 25.0 / FOX.chars().count() as f64;
    assert_eq!(record.summarization_pct, expected);
    assert!((record.summarization_pct - 0.568).abs() < 1e-3);
    assert_eq!(record.selftext.as_deref(), Some(FOX));
    assert_eq!(
        provider.mask_filler.prompts.lock().unwrap()[0],
        "Quick fox jumps over dog. #<mask>"
    );
}

#[tokio::test]
async fn models_load_once_per_call() {
    let provider = provider(vec!["fox"]);
    let rows = vec![
        submission("/r/test/1", Some(FOX)),
        submission("/r/test/2", Some(FOX)),
        submission("/r/test/3", Some(FOX)),
    ];
    summarize(&provider, &rows, &specs()).await.unwrap();
    assert_eq!(provider.loads.load(Ordering::SeqCst), 2);
    assert_eq!(provider.summarizer.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn empty_or_missing_body_skips_the_models() {
    let provider = provider(vec!["fox"]);
    let rows = vec![
        submission("/r/test/link", None),
        submission("/r/test/blank", Some("   ")),
    ];
    let records = summarize(&provider, &rows, &specs()).await.unwrap();

    assert_eq!(provider.summarizer.calls.load(Ordering::SeqCst), 0);
    for record in &records {
        assert_eq!(record.summary, "");
        assert!(record.hashtags.is_empty());
    }
    assert!(records[0].summarization_pct.is_nan());
    assert_eq!(records[1].summarization_pct, 0.0);
}

#[tokio::test]
async fn unknown_model_fails_before_any_row() {
    let provider = provider(vec!["fox"]);
    let models = ModelSpec {
        summarizer: "missing/model".to_string(),
        ..specs()
    };
    let err = summarize(&provider, &[submission("/r/test/1", Some(FOX))], &models)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ModelLoad { ref model, .. } if model == "missing/model"));
    assert_eq!(provider.summarizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn one_failing_row_aborts_the_batch() {
    let provider = provider(vec!["fox"]);
    let rows = vec![
        submission("/r/test/ok", Some(FOX)),
        submission("/r/test/bad", Some("Nobody prepared an answer for this one.")),
        submission("/r/test/never", Some(FOX)),
    ];
    let err = summarize_submissions(
        &rows,
        provider.summarizer.as_ref(),
        provider.mask_filler.as_ref(),
    )
    .await
    .unwrap_err();

    match err {
        PipelineError::Inference {
            task,
            row,
            permalink,
            ..
        } => {
            assert_eq!(task, "summarization");
            assert_eq!(row, 1);
            assert_eq!(permalink, "/r/test/bad");
        }
        other => panic!("expected inference error, got {other:?}"),
    }
    assert_eq!(provider.summarizer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let provider = provider(vec!["dog", "fox", "dog"]);
    let rows = vec![
        submission("/r/test/1", Some(FOX)),
        submission("/r/test/2", None),
    ];
    let first = summarize(&provider, &rows, &specs()).await.unwrap();
    let second = summarize(&provider, &rows, &specs()).await.unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.hashtags, b.hashtags);
        assert_eq!(a.permalink, b.permalink);
        assert!(
            a.summarization_pct == b.summarization_pct
                || (a.summarization_pct.is_nan() && b.summarization_pct.is_nan())
        );
    }
}

#[tokio::test]
async fn summary_frame_has_output_column_order() {
    let provider = provider(vec!["fox", "dog"]);
    let rows = vec![
        submission("/r/test/1", Some(FOX)),
        submission("/r/test/2", None),
    ];
    let records = summarize(&provider, &rows, &specs()).await.unwrap();
    let df = dataset::summaries_to_frame(&records).unwrap();

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(names, SUMMARY_COLUMNS);
    assert_eq!(df.height(), 2);
    assert_eq!(df.column("selftext").unwrap().null_count(), 1);
}

proptest! {
    #[test]
    fn ratio_is_plain_character_division(summary in "\\PC{0,40}", body in "\\PC{1,80}") {
        let expected = summary.chars().count() as f64 / body.chars().count() as f64;
        prop_assert_eq!(summarization_pct(&summary, Some(&body)), expected);
    }

    #[test]
    fn degenerate_rule_tracks_longest_fill(
        tokens in proptest::collection::vec("[a-z]{1,6}", 1..8)
    ) {
        let tags = filter_hashtags(tokens.clone());
        let longest = tokens.iter().map(|t| t.chars().count()).max().unwrap_or(0);
        if longest == 1 {
            prop_assert!(tags.is_empty());
        } else {
            let expected: HashSet<_> = tokens.iter().cloned().collect();
            let actual: HashSet<_> = tags.iter().cloned().collect();
            prop_assert_eq!(actual, expected);
            prop_assert_eq!(tags.len(), tags.iter().collect::<HashSet<_>>().len());
        }
    }
}
