// src/ingest/types.rs
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ingest::error::{ErrorKind, IngestError, Result};

/// One submission exactly as the archival search API returned it.
pub type RawSubmission = serde_json::Map<String, serde_json::Value>;

/// Relative window understood by the archival search API.
///
/// Deserializes through [`FromStr`], so config values are case-insensitive too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TimeFilter {
    #[default]
    All,
    Year,
    Month,
    Week,
    Day,
    Hour,
}

impl TimeFilter {
    fn window(self) -> Option<chrono::Duration> {
        match self {
            TimeFilter::All => None,
            TimeFilter::Year => Some(chrono::Duration::days(365)),
            TimeFilter::Month => Some(chrono::Duration::days(30)),
            TimeFilter::Week => Some(chrono::Duration::weeks(1)),
            TimeFilter::Day => Some(chrono::Duration::days(1)),
            TimeFilter::Hour => Some(chrono::Duration::hours(1)),
        }
    }

    /// Unix seconds of the oldest submission the filter admits, relative to `now`.
    pub fn lower_bound(self, now: DateTime<Utc>) -> Option<i64> {
        self.window().map(|w| (now - w).timestamp())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeFilter::All => "all",
            TimeFilter::Year => "year",
            TimeFilter::Month => "month",
            TimeFilter::Week => "week",
            TimeFilter::Day => "day",
            TimeFilter::Hour => "hour",
        }
    }
}

impl FromStr for TimeFilter {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TimeFilter::All),
            "year" => Ok(TimeFilter::Year),
            "month" => Ok(TimeFilter::Month),
            "week" => Ok(TimeFilter::Week),
            "day" => Ok(TimeFilter::Day),
            "hour" => Ok(TimeFilter::Hour),
            other => Err(IngestError::validation(format!(
                "unknown time filter `{other}` (expected all|year|month|week|day|hour)"
            ))),
        }
    }
}

impl TryFrom<String> for TimeFilter {
    type Error = IngestError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn subreddit_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]{2,21}$").unwrap())
}

fn author_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{3,20}$").unwrap())
}

/// Blank counts as unset; a leading `r/`, `/r/` or `R/` style prefix is dropped.
fn clean_name(value: Option<String>, prefix: char) -> Option<String> {
    let v = value?;
    let t = v.trim();
    let t = t.strip_prefix('/').unwrap_or(t);
    let mut chars = t.chars();
    let t = match (chars.next(), chars.next()) {
        (Some(c), Some('/')) if c.eq_ignore_ascii_case(&prefix) => chars.as_str(),
        _ => t,
    };
    let t = t.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// What to fetch. Built once per run; at least one of subreddit/author is always set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    subreddit: Option<String>,
    author: Option<String>,
    time_filter: TimeFilter,
    limit: Option<usize>,
}

impl SourceQuery {
    pub fn new(
        subreddit: Option<String>,
        author: Option<String>,
        time_filter: TimeFilter,
        limit: Option<usize>,
    ) -> Result<Self> {
        let subreddit = clean_name(subreddit, 'r');
        let author = clean_name(author, 'u');

        if subreddit.is_none() && author.is_none() {
            return Err(IngestError::validation(
                "at least one of subreddit or author must be provided",
            ));
        }
        if let Some(s) = &subreddit {
            if !subreddit_re().is_match(s) {
                return Err(IngestError::validation(format!("invalid subreddit name `{s}`")));
            }
        }
        if let Some(a) = &author {
            if !author_re().is_match(a) {
                return Err(IngestError::validation(format!("invalid author name `{a}`")));
            }
        }
        if limit == Some(0) {
            return Err(IngestError::validation("limit must be positive"));
        }

        Ok(Self {
            subreddit,
            author,
            time_filter,
            limit,
        })
    }

    pub fn subreddit(&self) -> Option<&str> {
        self.subreddit.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn time_filter(&self) -> TimeFilter {
        self.time_filter
    }

    /// `None` means fetch until the upstream is exhausted.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// Opaque pagination position handed back to the search API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One bounded archival search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub subreddit: Option<String>,
    pub author: Option<String>,
    pub size: usize,
    pub before: Option<Cursor>,
    pub after: Option<i64>,
}

impl SearchRequest {
    pub fn first_page(query: &SourceQuery, size: usize, now: DateTime<Utc>) -> Self {
        Self {
            subreddit: query.subreddit.clone(),
            author: query.author.clone(),
            size,
            before: None,
            after: query.time_filter.lower_bound(now),
        }
    }

    /// Query string pairs; unset filters are omitted rather than sent empty.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(7);
        if let Some(s) = &self.subreddit {
            pairs.push(("subreddit", s.clone()));
        }
        if let Some(a) = &self.author {
            pairs.push(("author", a.clone()));
        }
        pairs.push(("size", self.size.to_string()));
        pairs.push(("sort", "desc".to_string()));
        pairs.push(("sort_type", "created_utc".to_string()));
        if let Some(c) = &self.before {
            pairs.push(("before", c.as_str().to_string()));
        }
        if let Some(a) = self.after {
            pairs.push(("after", a.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub records: Vec<RawSubmission>,
    /// Where the next page starts; `None` when the backend cannot tell.
    pub next_cursor: Option<Cursor>,
}

/// Failure of a single page request, split by whether a retry can help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },
    Fatal(String),
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::Transient { reason, .. } => write!(f, "transient: {reason}"),
            PageError::Fatal(reason) => f.write_str(reason),
        }
    }
}

/// Live read API (credential check) plus archival search API behind one seam.
#[async_trait::async_trait]
pub trait SubmissionApi: Send + Sync {
    async fn verify_credentials(&self) -> Result<()>;
    async fn search_page(&self, req: &SearchRequest) -> std::result::Result<SearchPage, PageError>;
    fn name(&self) -> &'static str;
}

/// Fixed 14-field output row. Field order here is the on-disk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: String,
    pub title: String,
    pub selftext: String,
    pub score: i64,
    pub num_comments: i64,
    pub author: String,
    pub created_utc: DateTime<Utc>,
    pub url: String,
    pub upvote_ratio: f64,
    pub over_18: bool,
    pub edited: bool,
    pub spoiler: bool,
    pub stickied: bool,
    pub subreddit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Connect,
    Fetch,
    Project,
    Normalize,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validate => "validate",
            Stage::Connect => "connect",
            Stage::Fetch => "fetch",
            Stage::Project => "project",
            Stage::Normalize => "normalize",
            Stage::Write => "write",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionResult {
    pub status: RunStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl IngestionResult {
    pub fn succeeded(records: usize, output: PathBuf) -> Self {
        Self {
            status: RunStatus::Succeeded,
            message: "Data extracted successfully".to_string(),
            records: Some(records),
            output: Some(output),
            failed_stage: None,
            error_kind: None,
        }
    }

    pub fn failed(stage: Stage, err: &IngestError) -> Self {
        Self {
            status: RunStatus::Failed,
            message: err.to_string(),
            records: None,
            output: None,
            failed_stage: Some(stage),
            error_kind: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn time_filter_parses_case_insensitively() {
        assert_eq!("Year".parse::<TimeFilter>().unwrap(), TimeFilter::Year);
        assert_eq!(" all ".parse::<TimeFilter>().unwrap(), TimeFilter::All);
        assert!("decade".parse::<TimeFilter>().is_err());
    }

    #[test]
    fn lower_bound_is_relative_to_now() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(TimeFilter::All.lower_bound(now), None);
        assert_eq!(TimeFilter::Day.lower_bound(now), Some(1_700_000_000 - 86_400));
        assert_eq!(TimeFilter::Hour.lower_bound(now), Some(1_700_000_000 - 3_600));
    }

    #[test]
    fn prefixes_and_blanks_are_cleaned() {
        let q = SourceQuery::new(Some(" r/nba ".into()), Some("  ".into()), TimeFilter::All, None)
            .unwrap();
        assert_eq!(q.subreddit(), Some("nba"));
        assert_eq!(q.author(), None);

        for raw in ["/r/nba", "R/nba", "r/nba"] {
            let q = SourceQuery::new(Some(raw.into()), None, TimeFilter::All, None).unwrap();
            assert_eq!(q.subreddit(), Some("nba"), "{raw}");
        }
        let q = SourceQuery::new(None, Some("/U/spez".into()), TimeFilter::All, None).unwrap();
        assert_eq!(q.author(), Some("spez"));
    }

    #[test]
    fn zero_limit_rejected() {
        let e = SourceQuery::new(Some("nba".into()), None, TimeFilter::All, Some(0)).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Validation);
    }

    #[test]
    fn malformed_names_rejected() {
        assert!(SourceQuery::new(Some("n b a".into()), None, TimeFilter::All, None).is_err());
        assert!(SourceQuery::new(None, Some("x".into()), TimeFilter::All, None).is_err());
    }

    #[test]
    fn failed_result_serializes_stage_and_kind() {
        let r = IngestionResult::failed(Stage::Fetch, &IngestError::Fetch("boom".into()));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "Failed");
        assert_eq!(v["failed_stage"], "fetch");
        assert_eq!(v["error_kind"], "fetch");
        assert!(v.get("records").is_none());
    }
}
