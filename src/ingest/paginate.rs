// src/ingest/paginate.rs
//! Lazy, cursor-driven paging over a `SubmissionApi` with bounded retries.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;

use crate::ingest::error::{IngestError, Result};
use crate::ingest::types::{
    PageError, RawSubmission, SearchPage, SearchRequest, SourceQuery, SubmissionApi,
};

/// Longest wait honoured from an upstream `Retry-After`.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries per page, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Wait before retry number `attempt`. An upstream `Retry-After` replaces the
    /// backoff but never exceeds [`MAX_RETRY_AFTER`].
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after
            .map(|d| d.min(MAX_RETRY_AFTER))
            .unwrap_or_else(|| self.backoff(attempt))
    }
}

/// Lazy sequence of raw submissions for one query.
///
/// A page is requested only once the previous one has been drained; paging stops
/// at `limit` or at the first empty page. After an error the stream is fused and
/// keeps returning that error.
pub struct SubmissionStream<'a> {
    api: &'a dyn SubmissionApi,
    retry: RetryPolicy,
    page_size: usize,
    next_req: Option<SearchRequest>,
    buffer: VecDeque<RawSubmission>,
    remaining: Option<usize>,
    cursor_lost: bool,
    failed: Option<String>,
    pages: usize,
}

impl<'a> SubmissionStream<'a> {
    pub fn new(
        api: &'a dyn SubmissionApi,
        query: &SourceQuery,
        page_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        let page_size = page_size.max(1);
        let remaining = query.limit();
        let first = SearchRequest::first_page(query, page_len(page_size, remaining), Utc::now());
        Self {
            api,
            retry,
            page_size,
            next_req: Some(first),
            buffer: VecDeque::new(),
            remaining,
            cursor_lost: false,
            failed: None,
            pages: 0,
        }
    }

    /// Pages fetched so far (empty terminal page included).
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    pub async fn next(&mut self) -> Option<Result<RawSubmission>> {
        loop {
            if let Some(reason) = &self.failed {
                return Some(Err(IngestError::Fetch(reason.clone())));
            }
            if self.remaining == Some(0) {
                return None;
            }
            if let Some(rec) = self.buffer.pop_front() {
                if let Some(r) = self.remaining.as_mut() {
                    *r -= 1;
                }
                return Some(Ok(rec));
            }

            let Some(mut req) = self.next_req.take() else {
                if self.cursor_lost {
                    return self.fail(format!(
                        "page {}: last record has no usable created_utc, cannot advance cursor",
                        self.pages
                    ));
                }
                return None;
            };
            req.size = page_len(self.page_size, self.remaining);

            let page = match self.fetch_with_retry(&req).await {
                Ok(p) => p,
                Err(reason) => return self.fail(reason),
            };
            self.pages += 1;

            if page.records.is_empty() {
                tracing::debug!(target: "ingest", pages = self.pages, "search exhausted");
                return None;
            }
            tracing::debug!(
                target: "ingest",
                page = self.pages,
                records = page.records.len(),
                "page fetched"
            );
            counter!("ingest_pages_total").increment(1);

            match page.next_cursor {
                Some(c) if req.before.as_ref() == Some(&c) => {
                    return self.fail(format!(
                        "page {}: cursor did not advance past {}",
                        self.pages,
                        c.as_str()
                    ));
                }
                Some(c) => {
                    req.before = Some(c);
                    self.next_req = Some(req);
                }
                None => self.cursor_lost = true,
            }
            self.buffer.extend(page.records);
        }
    }

    /// Drain the whole sequence; the first error aborts.
    pub async fn collect_all(mut self) -> Result<Vec<RawSubmission>> {
        let mut out = Vec::with_capacity(page_len(self.page_size, self.remaining));
        while let Some(rec) = self.next().await {
            out.push(rec?);
        }
        Ok(out)
    }

    fn fail(&mut self, reason: String) -> Option<Result<RawSubmission>> {
        self.buffer.clear();
        self.next_req = None;
        self.failed = Some(reason.clone());
        Some(Err(IngestError::Fetch(reason)))
    }

    /// Fetch one page, retrying transient failures. `Err` carries the reason.
    async fn fetch_with_retry(&self, req: &SearchRequest) -> std::result::Result<SearchPage, String> {
        let page_no = self.pages + 1;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.api.search_page(req).await {
                Ok(page) => return Ok(page),
                Err(PageError::Fatal(reason)) => {
                    return Err(format!("page {page_no}: {reason}"));
                }
                Err(PageError::Transient {
                    reason,
                    retry_after,
                }) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(format!(
                            "page {page_no}: giving up after {attempt} attempts: {reason}"
                        ));
                    }
                    let delay = self.retry.delay(attempt, retry_after);
                    tracing::warn!(
                        target: "ingest",
                        provider = self.api.name(),
                        page = page_no,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "transient page failure, retrying"
                    );
                    counter!("ingest_page_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn page_len(page_size: usize, remaining: Option<usize>) -> usize {
    remaining.map_or(page_size, |r| r.min(page_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1000));
        assert_eq!(p.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_saturates() {
        let p = RetryPolicy::new(3, Duration::from_secs(1));
        assert!(p.backoff(64) >= Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn retry_after_overrides_backoff_up_to_cap() {
        let p = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(p.delay(2, None), Duration::from_millis(1000));
        assert_eq!(p.delay(2, Some(Duration::from_secs(7))), Duration::from_secs(7));
        assert_eq!(p.delay(1, Some(Duration::from_secs(3600))), MAX_RETRY_AFTER);
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn page_len_caps_by_remaining() {
        assert_eq!(page_len(100, None), 100);
        assert_eq!(page_len(100, Some(3)), 3);
        assert_eq!(page_len(10, Some(25)), 10);
    }
}
