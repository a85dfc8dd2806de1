//! Result Sink
//!
//! Persists a finished [`BenchmarkRun`] as a timestamped table. Writes go to
//! a temporary file in the destination directory which is then renamed into
//! place, so a failed write never leaves a half-written result file and an
//! existing result file is never replaced.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{SinkError, SinkResult};
use crate::result::BenchmarkRun;

/// Default result file prefix
pub const DEFAULT_FILE_PREFIX: &str = "crud_performance_results";

/// Timestamp format embedded in result file names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Upper bound on `_N` suffixes tried when a same-second file exists
const MAX_NAME_ATTEMPTS: usize = 100;

/// Destination for finished runs
pub trait ResultSink {
    /// Write the run, returning where it ended up
    fn persist(&self, run: &BenchmarkRun) -> SinkResult<PathBuf>;

    fn name(&self) -> &'static str;
}

/// Writes `<directory>/<prefix>_<timestamp>.csv`
#[derive(Debug, Clone)]
pub struct CsvResultSink {
    directory: PathBuf,
    file_prefix: String,
}

impl CsvResultSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }

    /// Builder-style: override the file name prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_name(&self, run: &BenchmarkRun, attempt: usize) -> String {
        let stamp = run.started_at.format(TIMESTAMP_FORMAT);
        if attempt == 0 {
            format!("{}_{}.csv", self.file_prefix, stamp)
        } else {
            format!("{}_{}_{}.csv", self.file_prefix, stamp, attempt)
        }
    }

    fn unwritable(&self, source: std::io::Error) -> SinkError {
        SinkError::Unwritable {
            path: self.directory.clone(),
            source,
        }
    }
}

/// Render the run as CSV bytes
pub fn render_csv(run: &BenchmarkRun) -> SinkResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(run.headers())
        .map_err(|e| SinkError::Encoding(e.to_string()))?;
    for row in run.rows() {
        let record = std::iter::once(row.size.to_string()).chain(
            row.cells
                .iter()
                .map(|cell| cell.map(|secs| secs.to_string()).unwrap_or_default()),
        );
        writer
            .write_record(record)
            .map_err(|e| SinkError::Encoding(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| SinkError::Encoding(e.to_string()))
}

impl ResultSink for CsvResultSink {
    fn persist(&self, run: &BenchmarkRun) -> SinkResult<PathBuf> {
        let bytes = render_csv(run)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".crudbench-")
            .suffix(".tmp")
            .tempfile_in(&self.directory)
            .map_err(|e| self.unwritable(e))?;
        tmp.write_all(&bytes).map_err(|e| self.unwritable(e))?;
        tmp.as_file().sync_all().map_err(|e| self.unwritable(e))?;
        debug!(tmp = %tmp.path().display(), bytes = bytes.len(), "Staged result file");

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let target = self.directory.join(self.file_name(run, attempt));
            match tmp.persist_noclobber(&target) {
                Ok(_) => {
                    info!(path = %target.display(), rows = run.sizes.len(), "Persisted benchmark results");
                    return Ok(target);
                }
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(path = %target.display(), "Result file exists, trying next name");
                    tmp = e.file;
                }
                Err(e) => return Err(self.unwritable(e.error)),
            }
        }

        Err(SinkError::AlreadyExists(
            self.directory.join(self.file_name(run, 0)),
        ))
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}
