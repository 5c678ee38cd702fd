// src/ingest/project.rs
//! Narrows an open-schema raw submission to the fixed output fields.

use serde_json::Value;

use crate::ingest::error::{IngestError, Result};
use crate::ingest::types::RawSubmission;

/// Output columns, in on-disk order.
pub const POST_FIELDS: [&str; 14] = [
    "id",
    "title",
    "selftext",
    "score",
    "num_comments",
    "author",
    "created_utc",
    "url",
    "upvote_ratio",
    "over_18",
    "edited",
    "spoiler",
    "stickied",
    "subreddit",
];

/// The 14 projected fields, still in their wire representation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedSubmission {
    pub id: Value,
    pub title: Value,
    pub selftext: Value,
    pub score: Value,
    pub num_comments: Value,
    pub author: Value,
    pub created_utc: Value,
    pub url: Value,
    pub upvote_ratio: Value,
    pub over_18: Value,
    pub edited: Value,
    pub spoiler: Value,
    pub stickied: Value,
    pub subreddit: Value,
}

/// Project one raw submission. Any absent field is a `SchemaError`; extras are dropped.
pub fn project(raw: &RawSubmission) -> Result<ProjectedSubmission> {
    let take = |field: &'static str| -> Result<Value> {
        raw.get(field).cloned().ok_or_else(|| IngestError::Schema {
            field,
            id: record_label(raw),
        })
    };

    Ok(ProjectedSubmission {
        id: take("id")?,
        title: take("title")?,
        selftext: take("selftext")?,
        score: take("score")?,
        num_comments: take("num_comments")?,
        author: take("author")?,
        created_utc: take("created_utc")?,
        url: take("url")?,
        upvote_ratio: take("upvote_ratio")?,
        over_18: take("over_18")?,
        edited: take("edited")?,
        spoiler: take("spoiler")?,
        stickied: take("stickied")?,
        subreddit: take("subreddit")?,
    })
}

/// Project a whole batch; the first failure aborts.
pub fn project_all(raw: &[RawSubmission]) -> Result<Vec<ProjectedSubmission>> {
    raw.iter().map(project).collect()
}

fn record_label(raw: &RawSubmission) -> String {
    match raw.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "<unknown>".to_string(),
        Some(other) => other.to_string(),
    }
}
