// src/ingest/sink.rs
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::ingest::error::{IngestError, Result};
use crate::ingest::types::NormalizedRecord;

/// Fixed suffix appended to the caller's output name.
pub const OUTPUT_SUFFIX: &str = ".json";

pub trait RecordSink: Send + Sync {
    /// Replace the destination with exactly `records`. Returns the number written.
    fn write_all(&self, records: &[NormalizedRecord]) -> Result<usize>;
    fn destination(&self) -> &Path;
}

/// Newline-delimited JSON file, replaced atomically via a sibling temp file.
#[derive(Debug, Clone)]
pub struct NdjsonFileSink {
    path: PathBuf,
}

impl NdjsonFileSink {
    /// `{dir}/{name}.json`
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{name}{OUTPUT_SUFFIX}")),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }
}

impl RecordSink for NdjsonFileSink {
    fn write_all(&self, records: &[NormalizedRecord]) -> Result<usize> {
        let io_err = |e: std::io::Error| IngestError::io(&self.path, e);

        let mut tmp = tempfile::Builder::new()
            .prefix(".ingest-")
            .suffix(".tmp")
            .tempfile_in(self.parent_dir())
            .map_err(io_err)?;

        {
            let mut w = BufWriter::new(&mut tmp);
            for rec in records {
                serde_json::to_writer(&mut w, rec).map_err(|e| io_err(e.into()))?;
                w.write_all(b"\n").map_err(io_err)?;
            }
            w.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        tracing::info!(
            target: "ingest",
            path = %self.path.display(),
            records = records.len(),
            "output written"
        );
        Ok(records.len())
    }

    fn destination(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_gets_fixed_suffix() {
        let s = NdjsonFileSink::new("/tmp/out", "reddit_data");
        assert_eq!(s.destination(), Path::new("/tmp/out/reddit_data.json"));
    }

    #[test]
    fn bare_file_name_uses_cwd_for_temp() {
        let s = NdjsonFileSink::at("data.json");
        assert_eq!(s.parent_dir(), Path::new("."));
    }
}
