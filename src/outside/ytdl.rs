use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::command::{binary_available, run_command, Capture, CommandError, YT_DL, YT_DLP};

/// Prefer mp4 streams so most downloads land in the canonical container
/// without a remux.
const FORMAT_SPEC: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/mp4/best";

#[derive(Debug, Error)]
pub enum DownloadError {
    /// The tool ran and reported a download failure
    #[error("downloader error: {0}")]
    Download(String),

    /// The tool could not be run, or failed without reporting a
    /// download error
    #[error("downloader failed unexpectedly: {0}")]
    Unexpected(String),
}

/// Interface for resolving a URL to a local media file
pub trait MediaDownloader: Sync {
    /// Download the media at `url` to the given output template.
    ///
    /// The tool chooses the file extension, so the produced file must be
    /// located afterwards by matching the template stem.
    fn download(&self, url: &str, template: &Path) -> Result<(), DownloadError>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp)
/// (or youtube-dl) program
pub struct Ytdl {
    program: &'static str,
    timeout: Duration,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new(timeout: Duration) -> Result<Self, CommandError> {
        if binary_available(YT_DLP) {
            Ok(Self {
                program: YT_DLP,
                timeout,
            })
        } else if binary_available(YT_DL) {
            Ok(Self {
                program: YT_DL,
                timeout,
            })
        } else {
            Err(CommandError::Missing(format!("{YT_DLP} or {YT_DL}")))
        }
    }
}

impl MediaDownloader for Ytdl {
    fn download(&self, url: &str, template: &Path) -> Result<(), DownloadError> {
        let res = run_command(
            self.program,
            |cmd| {
                cmd.arg("-q")
                    .arg("--no-warnings")
                    .arg("--no-progress")
                    .arg("--no-playlist")
                    .arg("--no-continue") // or else fails when an empty file is already there
                    .args(["-f", FORMAT_SPEC])
                    .args([OsStr::new("-o"), template.as_os_str()])
                    .arg("--")
                    .arg(url)
            },
            Capture::STDERR,
            self.timeout,
        )
        .map_err(|err| DownloadError::Unexpected(err.to_string()))?;

        if res.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&res.stderr);
        debug!("downloader stderr: {stderr}");

        // yt-dlp prefixes genuine download failures with "ERROR:"
        if stderr.lines().any(|line| line.starts_with("ERROR:")) {
            Err(DownloadError::Download(stderr.trim().to_owned()))
        } else {
            Err(DownloadError::Unexpected(format!(
                "exit status {}: {}",
                res.status,
                stderr.trim()
            )))
        }
    }
}
