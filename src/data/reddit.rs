//! Reddit ingestion: application-only OAuth and a single bounded `/new` fetch.

use chrono::{DateTime, Utc};
use reqwest::{header::CONTENT_TYPE, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, TimestampSecondsWithFrac};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::RedditCredentials,
    data::schema::{normalize_forum_name, Submission},
    error::{PipelineError, Result, ValidationReport},
};

/// Largest page Reddit serves for a listing.
pub const MAX_LISTING_LIMIT: usize = 100;

/// Base URLs of the two Reddit services the fetcher talks to.
#[derive(Debug, Clone)]
pub struct RedditEndpoints {
    pub auth_url: String,
    pub api_url: String,
}

impl Default for RedditEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            api_url: "https://oauth.reddit.com".to_string(),
        }
    }
}

/// Read-only Reddit client for the fetch stage.
pub struct RedditFetcher {
    client: Client,
    credentials: RedditCredentials,
    endpoints: RedditEndpoints,
}

impl RedditFetcher {
    pub fn new(credentials: RedditCredentials) -> Result<Self> {
        Self::with_endpoints(credentials, RedditEndpoints::default())
    }

    pub fn with_endpoints(
        credentials: RedditCredentials,
        endpoints: RedditEndpoints,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(credentials.user_agent())
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|err| PipelineError::config("http_client", err.to_string()))?;
        Ok(Self {
            client,
            credentials,
            endpoints,
        })
    }

    /// Fetch up to `limit` of the newest posts of `forum_name`, newest first.
    #[instrument(skip(self))]
    pub async fn fetch(&self, forum_name: &str, limit: usize) -> Result<Vec<Submission>> {
        let subreddit = normalize_forum_name(forum_name)?;
        if limit == 0 {
            return Err(PipelineError::config("submission_limit", "must be at least 1"));
        }
        let limit = if limit > MAX_LISTING_LIMIT {
            warn!(
                requested = limit,
                max = MAX_LISTING_LIMIT,
                "limit exceeds a single listing page; clamping"
            );
            MAX_LISTING_LIMIT
        } else {
            limit
        };

        let token = self.access_token(&subreddit).await?;
        let body = self.newest(&subreddit, &token, limit).await?;
        let submissions = parse_listing(&subreddit, &body)?;
        info!(%subreddit, count = submissions.len(), "fetched submissions");
        Ok(submissions)
    }

    async fn access_token(&self, subreddit: &str) -> Result<String> {
        let resp = self
            .client
            .post(&self.endpoints.auth_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|err| transient(subreddit, err))?;
        let status = resp.status();
        let resp = check_status(Service::Token, subreddit, resp).await?;

        let token: TokenResponse = resp.json().await.map_err(|err| transient(subreddit, err))?;
        if let Some(error) = token.error {
            return Err(PipelineError::Authentication {
                status: status.as_u16(),
                detail: error.to_string(),
            });
        }
        debug!("obtained application-only token");
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PipelineError::Authentication {
                status: status.as_u16(),
                detail: "token endpoint returned no access_token".to_string(),
            })
    }

    async fn newest(&self, subreddit: &str, token: &str, limit: usize) -> Result<String> {
        let url = format!("{}/r/{subreddit}/new", self.endpoints.api_url);
        debug!(%url, limit, "requesting listing");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("limit", limit.to_string()), ("raw_json", "1".to_string())])
            .send()
            .await
            .map_err(|err| transient(subreddit, err))?;
        let resp = check_status(Service::Listing, subreddit, resp).await?;
        resp.text().await.map_err(|err| transient(subreddit, err))
    }
}

/// Which Reddit service answered; the same status means different things.
#[derive(Debug, Clone, Copy)]
enum Service {
    Token,
    Listing,
}

async fn check_status(service: Service, subreddit: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let reason = match (service, status) {
        (Service::Token, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        | (Service::Listing, StatusCode::UNAUTHORIZED) => {
            return Err(PipelineError::Authentication {
                status: status.as_u16(),
                detail: body,
            });
        }
        // The token was accepted, so the forum itself is off limits.
        (Service::Listing, StatusCode::FORBIDDEN) => {
            format!("r/{subreddit} is private, quarantined or banned (HTTP {status}): {body}")
        }
        (Service::Listing, StatusCode::NOT_FOUND) => {
            format!("r/{subreddit} does not exist (HTTP {status}): {body}")
        }
        _ => format!("HTTP {status}: {body}"),
    };
    Err(PipelineError::TransientFetch {
        subreddit: subreddit.to_string(),
        reason,
    })
}

fn transient(subreddit: &str, err: reqwest::Error) -> PipelineError {
    PipelineError::TransientFetch {
        subreddit: subreddit.to_string(),
        reason: err.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    // Reddit answers with a string or a numeric code here.
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    #[serde(default)]
    kind: String,
    data: Value,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawPost {
    title: String,
    author: String,
    #[serde_as(as = "TimestampSecondsWithFrac<f64>")]
    created_utc: DateTime<Utc>,
    subreddit_name_prefixed: String,
    num_comments: i64,
    over_18: bool,
    score: i64,
    upvote_ratio: f64,
    is_self: bool,
    permalink: String,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    link_flair_text: Option<String>,
}

impl From<RawPost> for Submission {
    fn from(raw: RawPost) -> Self {
        Self {
            title: raw.title,
            author_name: raw.author,
            creation_datetime: raw.created_utc,
            subreddit_name: raw.subreddit_name_prefixed,
            num_comments: raw.num_comments,
            sfw: !raw.over_18,
            score: raw.score,
            upvote_ratio: raw.upvote_ratio,
            is_self: raw.is_self,
            permalink: raw.permalink,
            selftext: raw.selftext,
            flair_text: raw.link_flair_text,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Text,
    Integer,
    Number,
    Flag,
    OptionalText,
}

impl Kind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Kind::Text => value.is_string(),
            Kind::Integer => value.is_i64(),
            Kind::Number => value.is_number(),
            Kind::Flag => value.is_boolean(),
            Kind::OptionalText => value.is_null() || value.is_string(),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Kind::Text => "a string",
            Kind::Integer => "an integer",
            Kind::Number => "a number",
            Kind::Flag => "a boolean",
            Kind::OptionalText => "a string or null",
        }
    }
}

/// Raw key, schema column and expected JSON kind.
const FIELDS: &[(&str, &str, Kind)] = &[
    ("title", "title", Kind::Text),
    ("author", "author_name", Kind::Text),
    ("created_utc", "creation_datetime", Kind::Number),
    ("subreddit_name_prefixed", "subreddit_name", Kind::Text),
    ("num_comments", "num_comments", Kind::Integer),
    ("over_18", "sfw", Kind::Flag),
    ("score", "score", Kind::Integer),
    ("upvote_ratio", "upvote_ratio", Kind::Number),
    ("is_self", "is_self", Kind::Flag),
    ("permalink", "permalink", Kind::Text),
    ("selftext", "selftext", Kind::OptionalText),
    ("link_flair_text", "flair_text", Kind::OptionalText),
];

/// Validate a raw `/new` listing body. Any bad record fails the whole batch.
pub fn parse_listing(subreddit: &str, body: &str) -> Result<Vec<Submission>> {
    let listing: Listing = serde_json::from_str(body).map_err(|err| {
        let mut report = ValidationReport::new(subreddit, 0);
        report.push(None, None, None, format!("malformed listing: {err}"));
        PipelineError::Validation(report)
    })?;

    let children = listing.data.children;
    let mut report = ValidationReport::new(subreddit, children.len());
    let mut submissions = Vec::with_capacity(children.len());
    for (index, thing) in children.iter().enumerate() {
        if !thing.kind.is_empty() && thing.kind != "t3" {
            report.push(
                Some(index),
                None,
                None,
                format!("expected a link (t3), got {}", thing.kind),
            );
            continue;
        }
        if let Some(submission) = validate_post(index, &thing.data, &mut report) {
            submissions.push(submission);
        }
    }

    if !report.is_empty() {
        warn!(
            %subreddit,
            issues = report.issues.len(),
            fields = ?report.fields(),
            "rejecting batch"
        );
        return Err(PipelineError::Validation(report));
    }
    Ok(submissions)
}

fn validate_post(index: usize, value: &Value, report: &mut ValidationReport) -> Option<Submission> {
    let Some(object) = value.as_object() else {
        report.push(Some(index), None, None, "record is not a JSON object");
        return None;
    };
    let permalink = object
        .get("permalink")
        .and_then(Value::as_str)
        .map(str::to_string);

    let before = report.issues.len();
    for &(key, column, kind) in FIELDS {
        match object.get(key) {
            None | Some(Value::Null) if !matches!(kind, Kind::OptionalText) => {
                report.push(
                    Some(index),
                    permalink.clone(),
                    Some(column),
                    format!("required field `{key}` is missing"),
                );
            }
            Some(found) if !kind.accepts(found) => {
                report.push(
                    Some(index),
                    permalink.clone(),
                    Some(column),
                    format!("`{key}` should be {}, got {found}", kind.expected()),
                );
            }
            _ => {}
        }
    }
    if report.issues.len() > before {
        return None;
    }

    let raw = match RawPost::deserialize(value) {
        Ok(raw) => raw,
        Err(err) => {
            report.push(Some(index), permalink, None, err.to_string());
            return None;
        }
    };
    if raw.num_comments < 0 {
        report.push(
            Some(index),
            permalink.clone(),
            Some("num_comments"),
            format!("must be >= 0, got {}", raw.num_comments),
        );
    }
    if !(0.0..=1.0).contains(&raw.upvote_ratio) {
        report.push(
            Some(index),
            permalink,
            Some("upvote_ratio"),
            format!("must be within [0, 1], got {}", raw.upvote_ratio),
        );
    }
    if report.issues.len() > before {
        return None;
    }
    Some(raw.into())
}
