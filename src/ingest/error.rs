// src/ingest/error.rs
use serde::Serialize;
use std::path::PathBuf;

/// Coarse classification of a failed run, reported back in `IngestionResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Auth,
    Fetch,
    Schema,
    Format,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Query parameters rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// Credential check against the read API failed (bad credentials or unreachable).
    #[error("auth error: {0}")]
    Auth(String),

    /// A search page could not be retrieved (retries exhausted or non-retryable status).
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("schema error: missing field `{field}` in submission {id}")]
    Schema { field: &'static str, id: String },

    #[error("format error: field `{field}`: {reason}")]
    Format { field: &'static str, reason: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Validation(_) => ErrorKind::Validation,
            IngestError::Auth(_) => ErrorKind::Auth,
            IngestError::Fetch(_) => ErrorKind::Fetch,
            IngestError::Schema { .. } => ErrorKind::Schema,
            IngestError::Format { .. } => ErrorKind::Format,
            IngestError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn format(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Format {
            field,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_message_names_field_and_id() {
        let e = IngestError::Schema {
            field: "score",
            id: "abc123".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Schema);
        assert_eq!(
            e.to_string(),
            "schema error: missing field `score` in submission abc123"
        );
    }
}
