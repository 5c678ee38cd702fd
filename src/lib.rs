// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod ingest;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::config::ingest::{Credentials, IngestConfig};
pub use crate::ingest::error::{ErrorKind, IngestError};
pub use crate::ingest::types::{
    IngestionResult, NormalizedRecord, RawSubmission, RunStatus, SourceQuery, Stage,
    SubmissionApi, TimeFilter,
};
pub use crate::ingest::{run_once, IngestPipeline};
