use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use miette::{Context, IntoDiagnostic, Result};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::tabular::write_record;

pub const AUDIT_COLUMNS: [&str; 7] = [
    "id",
    "url",
    "original_filename",
    "output_path",
    "status",
    "error_message",
    "timestamp",
];

/// Bound stored diagnostics so one giant tool dump cannot bloat the log.
const MAX_ERROR_LEN: usize = 500;

/// Terminal outcome of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    SkippedExisting,
    InvalidData,
    FailedDownload,
    FailedCut,
    FailedPostprocess,
    Success,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SkippedExisting => "SKIPPED_EXISTING",
            Self::InvalidData => "INVALID_DATA",
            Self::FailedDownload => "FAILED_DOWNLOAD",
            Self::FailedCut => "FAILED_CUT",
            Self::FailedPostprocess => "FAILED_POSTPROCESS",
            Self::Success => "SUCCESS",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit entry, appended per row per attempt.
///
/// The `id` is kept as the raw manifest string so rows that failed numeric
/// coercion are still traceable.
#[derive(Debug, Clone)]
pub struct StatusRecord {
    pub id: String,
    pub url: String,
    pub original_filename: String,
    pub output_path: String,
    pub status: Status,
    pub error_message: String,
    pub timestamp: String,
}

impl StatusRecord {
    pub fn new(
        id: &str,
        url: &str,
        original_filename: &str,
        output_path: &str,
        status: Status,
        error_message: &str,
    ) -> Self {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        Self {
            id: id.to_owned(),
            url: url.to_owned(),
            original_filename: original_filename.to_owned(),
            output_path: output_path.to_owned(),
            status,
            error_message: clean_message(error_message),
            timestamp,
        }
    }
}

/// The log is read back line by line, so stored diagnostics are flattened
/// onto one line before truncation.
fn clean_message(message: &str) -> String {
    let message = message.replace(['\r', '\n'], " ");
    let message = message.trim();
    if message.len() <= MAX_ERROR_LEN {
        return message.to_owned();
    }
    let mut end = MAX_ERROR_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_owned()
}

/// The append-only audit log, the sole persisted state of the pipeline.
///
/// Records are never mutated. A single writer owns the handle, so appends
/// need no locking.
pub struct AuditLog {
    file: File,
}

impl AuditLog {
    /// Open or create the log, writing the header once if the file is new
    /// or empty.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .wrap_err("Could not create audit log parent directories")?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not open audit log {}", path.display()))?;

        let is_empty = file.metadata().into_diagnostic()?.len() == 0;
        if is_empty {
            writeln!(file, "{}", write_record(&AUDIT_COLUMNS))
                .into_diagnostic()
                .wrap_err("Could not write audit log header")?;
        }

        Ok(Self { file })
    }

    pub fn append(&mut self, record: &StatusRecord) -> Result<()> {
        let line = write_record(&[
            &record.id,
            &record.url,
            &record.original_filename,
            &record.output_path,
            record.status.as_str(),
            &record.error_message,
            &record.timestamp,
        ]);
        writeln!(self.file, "{line}")
            .into_diagnostic()
            .wrap_err("Could not append to the audit log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tabular::split_record;

    #[test]
    fn status_strings_are_stable() {
        assert_eq!(Status::SkippedExisting.as_str(), "SKIPPED_EXISTING");
        assert_eq!(Status::InvalidData.as_str(), "INVALID_DATA");
        assert_eq!(Status::FailedDownload.as_str(), "FAILED_DOWNLOAD");
        assert_eq!(Status::FailedCut.as_str(), "FAILED_CUT");
        assert_eq!(Status::FailedPostprocess.as_str(), "FAILED_POSTPROCESS");
        assert_eq!(Status::Success.as_str(), "SUCCESS");
    }

    #[test]
    fn long_diagnostics_are_truncated_on_a_char_boundary() {
        let message = "é".repeat(400); // 800 bytes
        let record = StatusRecord::new("1", "u", "", "", Status::FailedCut, &message);
        assert!(record.error_message.len() <= MAX_ERROR_LEN);
        assert!(record.error_message.chars().all(|c| c == 'é'));
    }

    #[test]
    fn header_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        let mut log = AuditLog::open(&path).unwrap();
        log.append(&StatusRecord::new("1", "u", "", "out", Status::Success, ""))
            .unwrap();
        drop(log);

        // Reopening an existing non-empty log must not duplicate the header
        let mut log = AuditLog::open(&path).unwrap();
        log.append(&StatusRecord::new(
            "2",
            "u",
            "",
            "out",
            Status::FailedDownload,
            "err, with comma",
        ))
        .unwrap();
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(split_record(lines[0]), AUDIT_COLUMNS);
        assert_eq!(split_record(lines[2])[5], "err, with comma");
    }

    #[test]
    fn multi_line_diagnostics_stay_on_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        let mut log = AuditLog::open(&path).unwrap();
        log.append(&StatusRecord::new(
            "1",
            "u",
            "",
            "",
            Status::FailedDownload,
            "ERROR: first reason\nERROR: second reason\n",
        ))
        .unwrap();
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            split_record(lines[1])[5],
            "ERROR: first reason ERROR: second reason"
        );
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let record = StatusRecord::new("1", "u", "", "", Status::Success, "");
        assert!(OffsetDateTime::parse(&record.timestamp, &Rfc3339).is_ok());
    }
}
