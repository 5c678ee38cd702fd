// tests/ingest_project.rs
use reddit_corpus_ingest::ingest::project::{project, project_all, POST_FIELDS};
use reddit_corpus_ingest::{ErrorKind, RawSubmission};
use serde_json::{json, Value};

fn full() -> RawSubmission {
    json!({
        "id": "17v2abc",
        "title": "Game thread",
        "selftext": "body",
        "score": 10,
        "num_comments": 3,
        "author": "someone",
        "created_utc": 1699999999,
        "url": "https://example.test/a",
        "upvote_ratio": 0.9,
        "over_18": false,
        "edited": false,
        "spoiler": false,
        "stickied": false,
        "subreddit": "nba",
        "gilded": 1,
        "all_awardings": [],
        "media": {"type": "video"}
    })
    .as_object()
    .cloned()
    .unwrap()
}

#[test]
fn keeps_exactly_the_fixed_fields() {
    let raw = full();
    let p = project(&raw).unwrap();

    assert_eq!(p.id, json!("17v2abc"));
    assert_eq!(p.score, json!(10));
    assert_eq!(p.upvote_ratio, json!(0.9));
    assert_eq!(p.subreddit, json!("nba"));

    // Normalized output has the same 14 keys, in order, and nothing else.
    let rec = reddit_corpus_ingest::ingest::normalize::normalize(&p).unwrap();
    let line = serde_json::to_string(&rec).unwrap();
    let v: Value = serde_json::from_str(&line).unwrap();
    let keys: Vec<&str> = v.as_object().unwrap().keys().map(String::as_str).collect();
    let mut expected = POST_FIELDS.to_vec();
    let mut got = keys.clone();
    expected.sort_unstable();
    got.sort_unstable();
    assert_eq!(got, expected);
    assert!(!line.contains("gilded"));

    // Field order on the wire follows POST_FIELDS.
    let positions: Vec<usize> = POST_FIELDS
        .iter()
        .map(|f| line.find(&format!("\"{f}\":")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn every_missing_field_is_a_schema_error() {
    for field in POST_FIELDS {
        let mut raw = full();
        raw.remove(field);
        let e = project(&raw).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Schema, "field {field}");
        assert!(e.to_string().contains(&format!("`{field}`")));
    }
}

#[test]
fn batch_stops_at_first_bad_record() {
    let mut bad = full();
    bad.remove("score");
    let batch = vec![full(), bad, full()];
    let e = project_all(&batch).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Schema);
}
