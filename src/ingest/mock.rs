// src/ingest/mock.rs
//! In-memory `SubmissionApi` for tests and offline dry runs.

use std::sync::Mutex;

use crate::ingest::error::{IngestError, Result};
use crate::ingest::types::{
    Cursor, PageError, RawSubmission, SearchPage, SearchRequest, SubmissionApi,
};

/// Pages through a fixed corpus; the cursor is the offset of the next record.
pub struct MockSubmissionApi {
    corpus: Vec<RawSubmission>,
    max_page: Option<usize>,
    reject_credentials: bool,
    transient_failures: Mutex<u32>,
    fatal_failure: Option<String>,
    stuck_cursor: Option<Cursor>,
    pub requests: Mutex<Vec<SearchRequest>>,
}

impl MockSubmissionApi {
    pub fn new(corpus: Vec<RawSubmission>) -> Self {
        Self {
            corpus,
            max_page: None,
            reject_credentials: false,
            transient_failures: Mutex::new(0),
            fatal_failure: None,
            stuck_cursor: None,
            requests: Mutex::new(vec![]),
        }
    }

    /// Build from a saved search response (`{"data": [...]}`), e.g. for offline replays.
    pub fn from_search_dump(json: &str) -> serde_json::Result<Self> {
        #[derive(serde::Deserialize)]
        struct Dump {
            data: Vec<RawSubmission>,
        }
        let dump: Dump = serde_json::from_str(json)?;
        Ok(Self::new(dump.data))
    }

    /// Serve at most `n` records per page regardless of the requested size.
    pub fn with_max_page(mut self, n: usize) -> Self {
        self.max_page = Some(n);
        self
    }

    pub fn rejecting_credentials(mut self) -> Self {
        self.reject_credentials = true;
        self
    }

    /// The next `n` search calls fail as if rate limited.
    pub fn with_transient_failures(self, n: u32) -> Self {
        *self.transient_failures.lock().unwrap() = n;
        self
    }

    pub fn with_fatal_failure(mut self, reason: &str) -> Self {
        self.fatal_failure = Some(reason.to_string());
        self
    }

    /// Every page reports the same next cursor, as a backend that ignores `before` would.
    pub fn with_stuck_cursor(mut self, cursor: &str) -> Self {
        self.stuck_cursor = Some(Cursor::new(cursor));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl SubmissionApi for MockSubmissionApi {
    async fn verify_credentials(&self) -> Result<()> {
        if self.reject_credentials {
            return Err(IngestError::Auth("mock: invalid client credentials".into()));
        }
        Ok(())
    }

    async fn search_page(&self, req: &SearchRequest) -> std::result::Result<SearchPage, PageError> {
        self.requests.lock().unwrap().push(req.clone());

        {
            let mut left = self.transient_failures.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(PageError::Transient {
                    reason: "mock: 429 Too Many Requests".into(),
                    retry_after: None,
                });
            }
        }
        if let Some(reason) = &self.fatal_failure {
            return Err(PageError::Fatal(reason.clone()));
        }

        let start = req
            .before
            .as_ref()
            .and_then(|c| c.as_str().parse::<usize>().ok())
            .unwrap_or(0)
            .min(self.corpus.len());
        let size = self.max_page.map_or(req.size, |m| m.min(req.size));
        let end = (start + size).min(self.corpus.len());

        Ok(SearchPage {
            records: self.corpus[start..end].to_vec(),
            next_cursor: Some(
                self.stuck_cursor
                    .clone()
                    .unwrap_or_else(|| Cursor::new(end.to_string())),
            ),
        })
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}
