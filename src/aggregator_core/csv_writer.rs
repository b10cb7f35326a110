//! CSV file sink for the minute-averages report

use super::writer_backend::{ReportSink, ReportWriteError};
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct CsvReportWriter {
    path: PathBuf,
}

impl CsvReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file's contents with `report`
    ///
    /// The file handle is scoped to this call: it is flushed and synced on
    /// success and closed on every path out of the function.
    pub fn write_file(&self, report: &str) -> Result<(), ReportWriteError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        writer.write_all(report.as_bytes())?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        log::info!("📝 Report written to: {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl ReportSink for CsvReportWriter {
    async fn write_report(&mut self, report: &str) -> Result<(), ReportWriteError> {
        self.write_file(report)
    }

    fn backend_type(&self) -> &'static str {
        "CSV"
    }
}
