use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::command::{binary_available, run_command, Capture, CommandError, FFPROBE};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("media file not found: {0}")]
    NotFound(PathBuf),

    #[error("`{FFPROBE}` not found on PATH")]
    ToolMissing,

    #[error("`{FFPROBE}` timed out probing {0}")]
    TimedOut(PathBuf),

    #[error("no parsable duration for {0}")]
    Unparsable(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Interface for measuring the duration of a media artifact
pub trait MediaInspector: Sync {
    fn duration_secs(&self, path: &Path) -> Result<f64, ProbeError>;
}

/// Interface for the [ffprobe](https://ffmpeg.org) program
pub struct Ffprobe {
    timeout: Duration,
}

impl Ffprobe {
    /// Verify that the `ffprobe` binary is reachable
    pub fn new(timeout: Duration) -> Result<Self, CommandError> {
        if binary_available(FFPROBE) {
            Ok(Self { timeout })
        } else {
            Err(CommandError::Missing(FFPROBE.to_owned()))
        }
    }

    fn run_probe(&self, args: &[&str], path: &Path) -> Result<String, ProbeError> {
        let res = run_command(
            FFPROBE,
            |cmd| cmd.args(["-v", "error"]).args(args).arg(path.as_os_str()),
            Capture::STDOUT,
            self.timeout,
        )
        .map_err(|err| match err {
            CommandError::Missing(_) => ProbeError::ToolMissing,
            CommandError::Io(err) => ProbeError::Io(err),
            CommandError::TimedOut { .. } => ProbeError::TimedOut(path.to_owned()),
        })?;

        Ok(String::from_utf8_lossy(&res.stdout).into_owned())
    }
}

impl MediaInspector for Ffprobe {
    fn duration_secs(&self, path: &Path) -> Result<f64, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::NotFound(path.to_owned()));
        }

        // Fast path: ask for the container duration alone
        let out = self.run_probe(
            &[
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
            path,
        )?;
        if let Ok(secs) = out.trim().parse::<f64>() {
            return Ok(secs);
        }

        debug!("Direct duration query yielded {out:?}, querying the full format section");

        // Some containers only expose the duration through the format section
        let out = self.run_probe(&["-of", "json", "-show_format"], path)?;
        serde_json::from_str::<serde_json::Value>(&out)
            .ok()
            .and_then(|json| {
                json.get("format")?
                    .get("duration")?
                    .as_str()?
                    .parse::<f64>()
                    .ok()
            })
            .ok_or_else(|| ProbeError::Unparsable(path.to_owned()))
    }
}
