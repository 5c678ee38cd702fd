// src/ingest/mod.rs
pub mod error;
pub mod mock;
pub mod normalize;
pub mod paginate;
pub mod project;
pub mod providers;
pub mod sink;
pub mod types;

use crate::ingest::error::IngestError;
use crate::ingest::paginate::{RetryPolicy, SubmissionStream};
use crate::ingest::sink::RecordSink;
use crate::ingest::types::{IngestionResult, SourceQuery, Stage, SubmissionApi, TimeFilter};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One-time metrics registration (so series show up in the exposition).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Pipeline runs by terminal status.");
        describe_counter!("ingest_pages_total", "Non-empty search pages fetched.");
        describe_counter!(
            "ingest_page_retries_total",
            "Search page retries after transient failures."
        );
        describe_counter!("ingest_records_total", "Records written to the sink.");
        describe_histogram!("ingest_fetch_ms", "Search page round trip in milliseconds.");
        describe_histogram!("ingest_run_ms", "Whole pipeline run in milliseconds.");
    });
}

/// Sequences connect → fetch → project → normalize → write for one query.
///
/// Holds no per-run state; each stage completes fully before the next starts and
/// the sink is only touched once every record has been normalized.
pub struct IngestPipeline<'a> {
    api: &'a dyn SubmissionApi,
    sink: &'a dyn RecordSink,
    page_size: usize,
    retry: RetryPolicy,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(api: &'a dyn SubmissionApi, sink: &'a dyn RecordSink) -> Self {
        Self {
            api,
            sink,
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate raw parameters and run. A rejected query fails without touching the network.
    pub async fn run_with(
        &self,
        subreddit: Option<String>,
        author: Option<String>,
        time_filter: TimeFilter,
        limit: Option<usize>,
    ) -> IngestionResult {
        match SourceQuery::new(subreddit, author, time_filter, limit) {
            Ok(q) => self.run(&q).await,
            Err(e) => {
                ensure_metrics_described();
                tracing::error!(target: "ingest", stage = %Stage::Validate, error = %e, "ingest run failed");
                counter!("ingest_runs_total", "status" => "failed").increment(1);
                IngestionResult::failed(Stage::Validate, &e)
            }
        }
    }

    /// Run once. Never returns a raw stage error; failures come back as `Failed`.
    pub async fn run(&self, query: &SourceQuery) -> IngestionResult {
        ensure_metrics_described();
        let t0 = std::time::Instant::now();

        tracing::info!(
            target: "ingest",
            provider = self.api.name(),
            subreddit = query.subreddit().unwrap_or("-"),
            author = query.author().unwrap_or("-"),
            time_filter = %query.time_filter(),
            limit = ?query.limit(),
            "ingest run started"
        );

        let result = match self.execute(query).await {
            Ok(n) => {
                counter!("ingest_runs_total", "status" => "succeeded").increment(1);
                counter!("ingest_records_total").increment(n as u64);
                tracing::info!(target: "ingest", records = n, "ingest run succeeded");
                IngestionResult::succeeded(n, self.sink.destination().to_path_buf())
            }
            Err((stage, e)) => {
                counter!("ingest_runs_total", "status" => "failed").increment(1);
                tracing::error!(
                    target: "ingest",
                    stage = %stage,
                    kind = ?e.kind(),
                    error = %e,
                    detail = ?e,
                    "ingest run failed"
                );
                IngestionResult::failed(stage, &e)
            }
        };

        histogram!("ingest_run_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        result
    }

    async fn execute(&self, query: &SourceQuery) -> std::result::Result<usize, (Stage, IngestError)> {
        let at = |stage: Stage| move |e: IngestError| (stage, e);

        self.api.verify_credentials().await.map_err(at(Stage::Connect))?;

        let raw = SubmissionStream::new(self.api, query, self.page_size, self.retry)
            .collect_all()
            .await
            .map_err(at(Stage::Fetch))?;
        tracing::info!(target: "ingest", records = raw.len(), "fetch complete");

        let projected = project::project_all(&raw).map_err(at(Stage::Project))?;
        let records = normalize::normalize_all(&projected).map_err(at(Stage::Normalize))?;

        self.sink.write_all(&records).map_err(at(Stage::Write))
    }
}

/// Convenience wrapper: run one query with default paging against the given collaborators.
pub async fn run_once(
    api: &dyn SubmissionApi,
    sink: &dyn RecordSink,
    query: &SourceQuery,
) -> IngestionResult {
    IngestPipeline::new(api, sink).run(query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::error::Result;
    use crate::ingest::mock::MockSubmissionApi;
    use crate::ingest::types::{NormalizedRecord, RunStatus};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    struct CountingSink {
        calls: Mutex<usize>,
        path: PathBuf,
    }

    impl RecordSink for CountingSink {
        fn write_all(&self, records: &[NormalizedRecord]) -> Result<usize> {
            *self.calls.lock().unwrap() += 1;
            Ok(records.len())
        }
        fn destination(&self) -> &Path {
            &self.path
        }
    }

    #[tokio::test]
    async fn auth_failure_skips_fetch_and_write() {
        let api = MockSubmissionApi::new(vec![]).rejecting_credentials();
        let sink = CountingSink {
            calls: Mutex::new(0),
            path: PathBuf::from("unused.json"),
        };
        let q = SourceQuery::new(Some("nba".into()), None, TimeFilter::All, Some(3)).unwrap();

        let r = run_once(&api, &sink, &q).await;
        assert_eq!(r.status, RunStatus::Failed);
        assert_eq!(r.failed_stage, Some(Stage::Connect));
        assert_eq!(api.request_count(), 0);
        assert_eq!(*sink.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_corpus_still_writes() {
        let api = MockSubmissionApi::new(vec![]);
        let sink = CountingSink {
            calls: Mutex::new(0),
            path: PathBuf::from("empty.json"),
        };
        let q = SourceQuery::new(None, Some("spez".into()), TimeFilter::All, None).unwrap();

        let r = run_once(&api, &sink, &q).await;
        assert!(r.is_success());
        assert_eq!(r.records, Some(0));
        assert_eq!(*sink.calls.lock().unwrap(), 1);
    }
}
