use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::io::{is_non_empty_file, remove_file_quietly};
use crate::outside::{MediaInspector, MediaTranscoder, ProbeError, TranscodeError};

#[derive(Debug, Error)]
pub enum TrimError {
    /// Trimming never proceeds without a measured source duration
    #[error("could not measure source duration: {0}")]
    DurationUnknown(#[from] ProbeError),

    #[error("invalid window: start {start}s, end {end:?}s")]
    InvalidWindow { start: f64, end: Option<f64> },

    #[error("start {start}s is at or beyond the source duration {duration}s")]
    StartBeyondDuration { start: f64, duration: f64 },

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("transcoder produced a missing or empty output")]
    EmptyOutput,
}

/// Extracts one duration-clamped time window out of a source file.
///
/// Stateless and idempotent: re-running with the same inputs overwrites
/// the same output.
pub struct Trimmer<'a> {
    inspector: &'a dyn MediaInspector,
    transcoder: &'a dyn MediaTranscoder,
}

impl<'a> Trimmer<'a> {
    pub fn new(inspector: &'a dyn MediaInspector, transcoder: &'a dyn MediaTranscoder) -> Self {
        Self {
            inspector,
            transcoder,
        }
    }

    /// Extract `[start, end)` of `source` into `destination`.
    ///
    /// An end beyond the measured duration is clamped, not rejected: source
    /// metadata drifts and an overrunning request is served through the
    /// end. A start at or beyond the duration is an error. On any failure
    /// a partially written destination is removed.
    pub fn trim(
        &self,
        source: &Path,
        destination: &Path,
        start: f64,
        end: Option<f64>,
    ) -> Result<(), TrimError> {
        let duration = self.inspector.duration_secs(source)?;

        if start < 0.0 || end.is_some_and(|end| end <= start) {
            return Err(TrimError::InvalidWindow { start, end });
        }
        if start >= duration {
            return Err(TrimError::StartBeyondDuration { start, duration });
        }

        let effective_end = end.map(|end| {
            if end > duration {
                debug!("Clamping requested end {end}s to the measured duration {duration}s");
                duration
            } else {
                end
            }
        });

        if let Err(err) = self
            .transcoder
            .extract_segment(source, destination, start, effective_end)
        {
            remove_file_quietly(destination);
            return Err(err.into());
        }

        if is_non_empty_file(destination) {
            Ok(())
        } else {
            remove_file_quietly(destination);
            Err(TrimError::EmptyOutput)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FixedDuration(f64);

    impl MediaInspector for FixedDuration {
        fn duration_secs(&self, _path: &Path) -> Result<f64, ProbeError> {
            Ok(self.0)
        }
    }

    struct NoDuration;

    impl MediaInspector for NoDuration {
        fn duration_secs(&self, path: &Path) -> Result<f64, ProbeError> {
            Err(ProbeError::Unparsable(path.to_owned()))
        }
    }

    /// Records every requested window and writes a small output file.
    #[derive(Debug, Default)]
    struct RecordingTranscoder {
        calls: Mutex<Vec<(f64, Option<f64>)>>,
        fail: bool,
    }

    impl MediaTranscoder for RecordingTranscoder {
        fn extract_segment(
            &self,
            _input: &Path,
            output: &Path,
            start: f64,
            end: Option<f64>,
        ) -> Result<(), TranscodeError> {
            self.calls.lock().unwrap().push((start, end));
            if self.fail {
                std::fs::write(output, b"partial").unwrap();
                return Err(TranscodeError::Failed("boom".to_owned()));
            }
            std::fs::write(output, b"clip").unwrap();
            Ok(())
        }
    }

    fn paths(dir: &tempfile::TempDir) -> (PathBuf, PathBuf) {
        let source = dir.path().join("src.mp4");
        std::fs::write(&source, b"full").unwrap();
        (source, dir.path().join("out.mp4"))
    }

    #[test]
    fn end_is_clamped_to_the_source_duration() {
        let dir = tempfile::tempdir().unwrap();
        let (source, out) = paths(&dir);
        let transcoder = RecordingTranscoder::default();
        let trimmer = Trimmer::new(&FixedDuration(5.0), &transcoder);

        trimmer.trim(&source, &out, 1.0, Some(9.0)).unwrap();
        assert_eq!(*transcoder.calls.lock().unwrap(), vec![(1.0, Some(5.0))]);
    }

    #[test]
    fn in_range_end_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let (source, out) = paths(&dir);
        let transcoder = RecordingTranscoder::default();
        let trimmer = Trimmer::new(&FixedDuration(10.0), &transcoder);

        trimmer.trim(&source, &out, 1.0, Some(3.0)).unwrap();
        assert_eq!(*transcoder.calls.lock().unwrap(), vec![(1.0, Some(3.0))]);
    }

    #[test]
    fn start_beyond_duration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (source, out) = paths(&dir);
        let transcoder = RecordingTranscoder::default();
        let trimmer = Trimmer::new(&FixedDuration(5.0), &transcoder);

        let err = trimmer.trim(&source, &out, 5.0, Some(9.0)).unwrap_err();
        assert!(matches!(err, TrimError::StartBeyondDuration { .. }));
        assert!(transcoder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn never_trims_blind() {
        let dir = tempfile::tempdir().unwrap();
        let (source, out) = paths(&dir);
        let transcoder = RecordingTranscoder::default();
        let trimmer = Trimmer::new(&NoDuration, &transcoder);

        let err = trimmer.trim(&source, &out, 0.0, Some(1.0)).unwrap_err();
        assert!(matches!(err, TrimError::DurationUnknown(_)));
        assert!(transcoder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn partial_output_is_removed_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (source, out) = paths(&dir);
        let transcoder = RecordingTranscoder {
            fail: true,
            ..Default::default()
        };
        let trimmer = Trimmer::new(&FixedDuration(5.0), &transcoder);

        let err = trimmer.trim(&source, &out, 0.0, Some(1.0)).unwrap_err();
        assert!(matches!(err, TrimError::Transcode(_)));
        assert!(!out.exists());
    }

    #[test]
    fn empty_window_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (source, out) = paths(&dir);
        let transcoder = RecordingTranscoder::default();
        let trimmer = Trimmer::new(&FixedDuration(5.0), &transcoder);

        let err = trimmer.trim(&source, &out, 2.0, Some(2.0)).unwrap_err();
        assert!(matches!(err, TrimError::InvalidWindow { .. }));
    }
}
