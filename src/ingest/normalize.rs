// src/ingest/normalize.rs
//! Per-field coercion from wire representations to canonical types.
//!
//! Every function here is pure and idempotent: feeding the serialized canonical
//! value back in yields the same canonical value.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::ingest::error::{IngestError, Result};
use crate::ingest::project::ProjectedSubmission;
use crate::ingest::types::NormalizedRecord;

/// `false` only for boolean false or the exact string `"False"`; anything else is `true`.
///
/// Upstream flags arrive as booleans, as stringified booleans, and for `edited`
/// as the epoch of the last edit. The edit timestamp collapses to `true`.
pub fn normalize_flag(v: &Value) -> bool {
    !matches!(v, Value::Bool(false)) && !matches!(v, Value::String(s) if s == "False")
}

/// Epoch seconds (integer, float or numeric string) or RFC 3339 text to a UTC timestamp.
pub fn normalize_timestamp(field: &'static str, v: &Value) -> Result<DateTime<Utc>> {
    let secs = match v {
        Value::Number(n) => epoch_from_number(field, n)?,
        Value::String(s) => {
            let t = s.trim();
            if let Ok(i) = t.parse::<i64>() {
                i
            } else if let Ok(f) = t.parse::<f64>() {
                epoch_from_f64(field, f)?
            } else {
                DateTime::parse_from_rfc3339(t)
                    .map_err(|e| {
                        IngestError::format(field, format!("unparseable timestamp `{t}`: {e}"))
                    })?
                    .timestamp()
            }
        }
        other => {
            return Err(IngestError::format(
                field,
                format!("expected epoch seconds, got {other}"),
            ))
        }
    };

    if secs < 0 {
        return Err(IngestError::format(field, format!("negative epoch {secs}")));
    }
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| IngestError::format(field, format!("epoch {secs} out of range")))
}

fn epoch_from_number(field: &'static str, n: &serde_json::Number) -> Result<i64> {
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    if n.is_u64() {
        return Err(IngestError::format(field, format!("epoch {n} out of range")));
    }
    match n.as_f64() {
        Some(f) => epoch_from_f64(field, f),
        None => Err(IngestError::format(field, format!("not a number: {n}"))),
    }
}

fn epoch_from_f64(field: &'static str, f: f64) -> Result<i64> {
    if !f.is_finite() || f < 0.0 || f > i64::MAX as f64 {
        return Err(IngestError::format(field, format!("epoch {f} out of range")));
    }
    Ok(f.trunc() as i64)
}

/// Strings pass through; numbers and booleans take their JSON rendering.
pub fn normalize_text(field: &'static str, v: &Value) -> Result<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(IngestError::format(field, "null cannot be coerced to text")),
        Value::Array(_) | Value::Object(_) => Err(IngestError::format(
            field,
            "structured value cannot be coerced to text",
        )),
    }
}

pub fn normalize_count(field: &'static str, v: &Value) -> Result<i64> {
    match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= i64::MAX as f64 => {
                    Ok(f as i64)
                }
                _ => Err(IngestError::format(field, format!("expected integer, got {n}"))),
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| IngestError::format(field, format!("expected integer, got `{s}`"))),
        other => Err(IngestError::format(
            field,
            format!("expected integer, got {other}"),
        )),
    }
}

pub fn normalize_ratio(field: &'static str, v: &Value) -> Result<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match f {
        Some(f) if f.is_finite() => Ok(f),
        _ => Err(IngestError::format(field, format!("expected number, got {v}"))),
    }
}

pub fn normalize(p: &ProjectedSubmission) -> Result<NormalizedRecord> {
    Ok(NormalizedRecord {
        id: normalize_text("id", &p.id)?,
        title: normalize_text("title", &p.title)?,
        selftext: normalize_text("selftext", &p.selftext)?,
        score: normalize_count("score", &p.score)?,
        num_comments: normalize_count("num_comments", &p.num_comments)?,
        author: normalize_text("author", &p.author)?,
        created_utc: normalize_timestamp("created_utc", &p.created_utc)?,
        url: normalize_text("url", &p.url)?,
        upvote_ratio: normalize_ratio("upvote_ratio", &p.upvote_ratio)?,
        over_18: normalize_flag(&p.over_18),
        edited: normalize_flag(&p.edited),
        spoiler: normalize_flag(&p.spoiler),
        stickied: normalize_flag(&p.stickied),
        subreddit: normalize_text("subreddit", &p.subreddit)?,
    })
}

pub fn normalize_all(projected: &[ProjectedSubmission]) -> Result<Vec<NormalizedRecord>> {
    projected.iter().map(normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn float_epoch_truncates() {
        let dt = normalize_timestamp("created_utc", &json!(1_699_999_999.75)).unwrap();
        assert_eq!(dt.timestamp(), 1_699_999_999);
    }

    #[test]
    fn rfc3339_drops_subseconds() {
        let dt = normalize_timestamp("created_utc", &json!("2023-11-14T22:13:19.900Z")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-11-14T22:13:19+00:00");
    }

    #[test]
    fn count_accepts_integral_float_only() {
        assert_eq!(normalize_count("score", &json!(12.0)).unwrap(), 12);
        assert!(normalize_count("score", &json!(12.5)).is_err());
        assert!(normalize_count("score", &json!(true)).is_err());
    }

    #[test]
    fn ratio_rejects_non_numeric() {
        assert_eq!(normalize_ratio("upvote_ratio", &json!("0.5")).unwrap(), 0.5);
        assert!(normalize_ratio("upvote_ratio", &json!(null)).is_err());
    }

    #[test]
    fn text_rejects_structures() {
        assert!(normalize_text("title", &json!(["a"])).is_err());
        assert!(normalize_text("title", &json!({"a": 1})).is_err());
        assert_eq!(normalize_text("id", &json!(42)).unwrap(), "42");
    }
}
