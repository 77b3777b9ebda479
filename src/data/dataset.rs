//! Tabular boundary: typed rows to and from polars frames, Parquet on disk.

use std::{fs::File, path::Path};

use chrono::{DateTime, Utc};
use polars::prelude::{
    DataFrame, DataType, NamedFrom, ParquetReader, ParquetWriter, SerReader, Series, TimeUnit,
};
use tracing::info;

use crate::{
    data::schema::{Submission, SummaryRecord, SUBMISSION_COLUMNS, SUMMARY_COLUMNS},
    error::{PipelineError, Result, ValidationReport},
};

/// Build the fetch stage frame, columns in schema order.
pub fn submissions_to_frame(rows: &[Submission]) -> Result<DataFrame> {
    let [
        title,
        author,
        created,
        subreddit,
        comments,
        sfw,
        score,
        ratio,
        is_self,
        permalink,
        selftext,
        flair,
    ] = SUBMISSION_COLUMNS;
    let df = DataFrame::new(vec![
        Series::new(title.into(), rows.iter().map(|r| r.title.clone()).collect::<Vec<_>>()),
        Series::new(
            author.into(),
            rows.iter().map(|r| r.author_name.clone()).collect::<Vec<_>>(),
        ),
        datetime_series(created, rows.iter().map(|r| r.creation_datetime))?,
        Series::new(
            subreddit.into(),
            rows.iter().map(|r| r.subreddit_name.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            comments.into(),
            rows.iter().map(|r| r.num_comments).collect::<Vec<_>>(),
        ),
        Series::new(sfw.into(), rows.iter().map(|r| r.sfw).collect::<Vec<_>>()),
        Series::new(score.into(), rows.iter().map(|r| r.score).collect::<Vec<_>>()),
        Series::new(
            ratio.into(),
            rows.iter().map(|r| r.upvote_ratio).collect::<Vec<_>>(),
        ),
        Series::new(is_self.into(), rows.iter().map(|r| r.is_self).collect::<Vec<_>>()),
        Series::new(
            permalink.into(),
            rows.iter().map(|r| r.permalink.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            selftext.into(),
            rows.iter().map(|r| r.selftext.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            flair.into(),
            rows.iter().map(|r| r.flair_text.clone()).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

/// Build the summarize stage frame, columns in output order.
pub fn summaries_to_frame(rows: &[SummaryRecord]) -> Result<DataFrame> {
    let [author, created, permalink, title, selftext, summary, hashtags, pct] = SUMMARY_COLUMNS;
    let tag_lists: Vec<Series> = rows
        .iter()
        .map(|r| Series::new("".into(), r.hashtags.clone()))
        .collect();
    let hashtags_series = if tag_lists.is_empty() {
        Series::new_empty(
            hashtags.into(),
            &DataType::List(Box::new(DataType::String)),
        )
    } else {
        Series::new(hashtags.into(), tag_lists)
    };

    let df = DataFrame::new(vec![
        Series::new(
            author.into(),
            rows.iter().map(|r| r.author_name.clone()).collect::<Vec<_>>(),
        ),
        datetime_series(created, rows.iter().map(|r| r.creation_datetime))?,
        Series::new(
            permalink.into(),
            rows.iter().map(|r| r.permalink.clone()).collect::<Vec<_>>(),
        ),
        Series::new(title.into(), rows.iter().map(|r| r.title.clone()).collect::<Vec<_>>()),
        Series::new(
            selftext.into(),
            rows.iter().map(|r| r.selftext.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            summary.into(),
            rows.iter().map(|r| r.summary.clone()).collect::<Vec<_>>(),
        ),
        hashtags_series,
        Series::new(
            pct.into(),
            rows.iter().map(|r| r.summarization_pct).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

/// Read typed submissions back out of a fetch stage frame.
///
/// Nulls in required columns are reported the same way a bad fetch is.
pub fn frame_to_submissions(df: &DataFrame) -> Result<Vec<Submission>> {
    let title = df.column("title")?.str()?;
    let author = df.column("author_name")?.str()?;
    let created = df.column("creation_datetime")?.cast(&DataType::Int64)?;
    let created = created.i64()?;
    let subreddit = df.column("subreddit_name")?.str()?;
    let comments = df.column("num_comments")?.i64()?;
    let sfw = df.column("sfw")?.bool()?;
    let score = df.column("score")?.i64()?;
    let ratio = df.column("upvote_ratio")?.f64()?;
    let is_self = df.column("is_self")?.bool()?;
    let permalink = df.column("permalink")?.str()?;
    let selftext = df.column("selftext")?.str()?;
    let flair = df.column("flair_text")?.str()?;

    let mut report = ValidationReport::new("<dataset>", df.height());
    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let link = permalink.get(idx).map(str::to_string);
        let mut missing = |field: &str| {
            report.push(Some(idx), link.clone(), Some(field), "null in required column");
        };
        let (
            Some(title),
            Some(author),
            Some(nanos),
            Some(subreddit),
            Some(comments),
            Some(sfw),
            Some(score),
            Some(ratio),
            Some(is_self),
            Some(permalink),
        ) = (
            title.get(idx),
            author.get(idx),
            created.get(idx),
            subreddit.get(idx),
            comments.get(idx),
            sfw.get(idx),
            score.get(idx),
            ratio.get(idx),
            is_self.get(idx),
            permalink.get(idx),
        )
        else {
            for (name, present) in [
                ("title", title.get(idx).is_some()),
                ("author_name", author.get(idx).is_some()),
                ("creation_datetime", created.get(idx).is_some()),
                ("subreddit_name", subreddit.get(idx).is_some()),
                ("num_comments", comments.get(idx).is_some()),
                ("sfw", sfw.get(idx).is_some()),
                ("score", score.get(idx).is_some()),
                ("upvote_ratio", ratio.get(idx).is_some()),
                ("is_self", is_self.get(idx).is_some()),
                ("permalink", permalink.get(idx).is_some()),
            ] {
                if !present {
                    missing(name);
                }
            }
            continue;
        };
        let creation_datetime = DateTime::<Utc>::from_timestamp_nanos(nanos);
        rows.push(Submission {
            title: title.to_string(),
            author_name: author.to_string(),
            creation_datetime,
            subreddit_name: subreddit.to_string(),
            num_comments: comments,
            sfw,
            score,
            upvote_ratio: ratio,
            is_self,
            permalink: permalink.to_string(),
            selftext: selftext.get(idx).map(str::to_string),
            flair_text: flair.get(idx).map(str::to_string),
        });
    }

    if !report.is_empty() {
        return Err(PipelineError::Validation(report));
    }
    Ok(rows)
}

/// Write a frame to Parquet, creating parent folders as needed.
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    ParquetWriter::new(file).finish(df)?;
    info!(path = %path.display(), rows = df.height(), "wrote parquet");
    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let df = ParquetReader::new(File::open(path)?).finish()?;
    Ok(df)
}

/// Nanosecond column, so fractional epoch seconds survive a round trip.
fn datetime_series<I>(name: &str, values: I) -> Result<Series>
where
    I: Iterator<Item = DateTime<Utc>>,
{
    let mut report = ValidationReport::new("<dataset>", 0);
    let mut nanos = Vec::new();
    for (idx, ts) in values.enumerate() {
        report.total += 1;
        match ts.timestamp_nanos_opt() {
            Some(value) => nanos.push(value),
            None => report.push(Some(idx), None, Some(name), format!("{ts} is out of range")),
        }
    }
    if !report.is_empty() {
        return Err(PipelineError::Validation(report));
    }
    let series =
        Series::new(name.into(), nanos).cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?;
    Ok(series)
}
