//! Report persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;

use super::Report;

/// Sink error types.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("permission denied writing {}", .path.display())]
    PermissionDenied { path: PathBuf },
    #[error("failed to write report file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SinkError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            SinkError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            SinkError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Receiver of finished reports.
pub trait ReportSink {
    /// Store `report` and return where it went.
    fn persist(&self, report: &Report) -> Result<PathBuf, SinkError>;
}

/// Writes each report as pretty-printed JSON into its own timestamped file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `report-YYYYMMDDHHMMSS.json`, in local time.
    pub fn file_name(report: &Report) -> String {
        let stamp = report.generated_at().with_timezone(&Local);
        format!("report-{}.json", stamp.format("%Y%m%d%H%M%S"))
    }
}

impl ReportSink for JsonFileSink {
    fn persist(&self, report: &Report) -> Result<PathBuf, SinkError> {
        fs::create_dir_all(&self.dir).map_err(|e| SinkError::from_io(&self.dir, e))?;

        let path = self.dir.join(Self::file_name(report));
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json).map_err(|e| SinkError::from_io(&path, e))?;

        Ok(path)
    }
}
