use std::ffi::OsStr;
use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use super::command::{
    binary_available, run_command, Capture, CommandError, FFMPEG, FFXXX_DEFAULT_ARGS,
};

/// Fixed encoding parameters for accurate cutting. Re-encoding is required
/// so the window lands on exact frames instead of the nearest keyframe.
const ENCODE_ARGS: [&str; 10] = [
    "-c:v", "libx264", "-preset", "fast", "-crf", "23", "-c:a", "aac", "-b:a", "128k",
];

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("`{FFMPEG}` not found on PATH")]
    ToolMissing,

    #[error("transcode failed: {0}")]
    Failed(String),
}

/// Interface for extracting an exact time window out of a media file
pub trait MediaTranscoder: Sync + Debug {
    /// Re-encode the `[start, end)` window (in seconds) of `input` into
    /// `output`, rebasing timestamps so the output starts at time zero.
    /// Any pre-existing file at `output` is overwritten.
    ///
    /// If `end` is not specified, the segment continues until the end of
    /// the stream.
    fn extract_segment(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        end: Option<f64>,
    ) -> Result<(), TranscodeError>;
}

/// Interface for the [ffmpeg](https://ffmpeg.org) program
#[derive(Debug)]
pub struct Ffmpeg {
    timeout: Duration,
}

impl Ffmpeg {
    /// Verify that the `ffmpeg` binary is reachable
    pub fn new(timeout: Duration) -> Result<Self, CommandError> {
        if binary_available(FFMPEG) {
            Ok(Self { timeout })
        } else {
            Err(CommandError::Missing(FFMPEG.to_owned()))
        }
    }
}

impl MediaTranscoder for Ffmpeg {
    fn extract_segment(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        end: Option<f64>,
    ) -> Result<(), TranscodeError> {
        let res = run_command(
            FFMPEG,
            |cmd| {
                let mut cmd = cmd
                    .args(FFXXX_DEFAULT_ARGS)
                    .arg("-y")
                    // Input first, then seek, for frame-accurate seeking
                    .args([OsStr::new("-i"), input.as_os_str()])
                    .args(["-ss", &start.to_string()]);

                if let Some(end) = end {
                    cmd = cmd.args(["-to", &end.to_string()]);
                }

                cmd.arg("-copyts")
                    .args(["-avoid_negative_ts", "make_zero"])
                    .args(ENCODE_ARGS)
                    .arg(output)
            },
            Capture::STDERR,
            self.timeout,
        )
        .map_err(|err| match err {
            CommandError::Missing(_) => TranscodeError::ToolMissing,
            err => TranscodeError::Failed(err.to_string()),
        })?;

        if res.status.success() {
            Ok(())
        } else {
            Err(TranscodeError::Failed(
                String::from_utf8_lossy(&res.stderr).trim().to_owned(),
            ))
        }
    }
}
