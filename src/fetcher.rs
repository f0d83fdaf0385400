use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::io::{is_non_empty_file, remove_file_quietly};
use crate::outside::{DownloadError, MediaDownloader};

/// The single container format used for all final outputs.
pub const CANONICAL_EXT: &str = "mp4";

/// Hosts for which the extractor is authoritative: the direct-stream
/// fallback is never attempted against them.
const VIDEO_HOSTS: [&str; 2] = ["youtube.com", "youtu.be"];

/// Some dataset mirrors refuse requests without a browser-like client.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// The general extractor (yt-dlp)
    Extractor,
    /// Plain streamed HTTP GET
    DirectStream,
}

/// A verified local copy of a source URL.
///
/// When it is a scratch copy, the caller owns deleting the file once
/// consumed, success or failure.
#[derive(Debug)]
pub struct Fetched {
    pub path: PathBuf,
    pub strategy: FetchStrategy,
}

#[derive(Debug, Error)]
#[error("all download strategies failed: {0}")]
pub struct FetchError(String);

/// Normalize a manifest URL. Returns `None` for blank input.
///
/// A bare `www.` host gets a secure scheme; a schemeless known video host
/// does too. Anything else schemeless is passed through unchanged and the
/// extractor gets to decide.
pub fn normalize_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if url.starts_with("www.") {
        return Some(format!("https://{url}"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if is_video_host(url) {
            return Some(format!("https://{url}"));
        }
        warn!("URL {url:?} lacks a scheme and is not a recognized video host, passing it through");
    }
    Some(url.to_owned())
}

fn is_video_host(url: &str) -> bool {
    VIDEO_HOSTS.iter().any(|host| url.contains(host))
}

/// The fallback only makes sense for plain container files the extractor
/// does not own.
fn direct_stream_eligible(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.ends_with(&format!(".{CANONICAL_EXT}")) && !is_video_host(url)
}

/// Locate the file the extractor produced for `template`.
///
/// The tool appends an extension of its choosing, so every `{stem}.*`
/// sibling is a candidate. A lone match wins; among several, a single file
/// with the canonical extension wins; otherwise the lexicographically first
/// candidate is taken so reruns resolve the same file.
fn resolve_download(template: &Path) -> Option<PathBuf> {
    let dir = template.parent()?;
    let stem = template.file_name()?.to_str()?;

    let mut candidates: Vec<PathBuf> = dir
        .read_dir()
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(stem))
                .is_some_and(|rest| rest.starts_with('.'))
        })
        .collect();
    candidates.sort();

    let chosen = match candidates.len() {
        0 => return None,
        1 => candidates.swap_remove(0),
        _ => {
            let canonical: Vec<&PathBuf> = candidates
                .iter()
                .filter(|path| path.extension().is_some_and(|ext| ext == CANONICAL_EXT))
                .collect();
            if canonical.len() == 1 {
                canonical[0].clone()
            } else {
                warn!(
                    "Several files match template {}, taking the first",
                    template.display()
                );
                candidates.swap_remove(0)
            }
        }
    };

    is_non_empty_file(&chosen).then_some(chosen)
}

/// Resolves a source URL to exactly one verified local file, trying the
/// general extractor first and falling back to a direct streamed GET.
pub struct Fetcher<'a> {
    downloader: &'a dyn MediaDownloader,
    agent: ureq::Agent,
}

impl<'a> Fetcher<'a> {
    pub fn new(downloader: &'a dyn MediaDownloader, http_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(http_timeout)
            .build();

        Self { downloader, agent }
    }

    /// Fetch `url` into a file derived from `template`.
    pub fn fetch(&self, url: &str, template: &Path) -> Result<Fetched, FetchError> {
        debug!("Fetching {url} with template {}", template.display());

        let primary_err = match self.downloader.download(url, template) {
            Ok(()) => match resolve_download(template) {
                Some(path) => {
                    info!("Extractor produced {}", path.display());
                    return Ok(Fetched {
                        path,
                        strategy: FetchStrategy::Extractor,
                    });
                }
                None => {
                    warn!(
                        "Extractor reported success but produced no usable file for {}",
                        template.display()
                    );
                    "extractor produced no usable file".to_owned()
                }
            },
            Err(DownloadError::Download(msg)) => {
                warn!("Extractor failed: {msg}");
                msg
            }
            Err(DownloadError::Unexpected(msg)) => {
                warn!("Extractor failed unexpectedly: {msg}");
                msg
            }
        };

        if !direct_stream_eligible(url) {
            return Err(FetchError(primary_err));
        }

        info!("Falling back to a direct stream fetch for {url}");
        let dest = template.with_extension(CANONICAL_EXT);
        match self.stream_to_file(url, &dest) {
            Ok(()) => Ok(Fetched {
                path: dest,
                strategy: FetchStrategy::DirectStream,
            }),
            Err(fallback_err) => Err(FetchError(format!(
                "{primary_err}; direct stream: {fallback_err}"
            ))),
        }
    }

    /// Stream the response body straight to `dest`, deleting any partial
    /// file on failure.
    fn stream_to_file(&self, url: &str, dest: &Path) -> Result<(), String> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }

        let write = || -> Result<(), String> {
            let response = self.agent.get(url).call().map_err(|err| err.to_string())?;
            let mut reader = response.into_reader();
            let mut file = File::create(dest).map_err(|err| err.to_string())?;
            io::copy(&mut reader, &mut file).map_err(|err| err.to_string())?;
            Ok(())
        };

        match write() {
            Ok(()) if is_non_empty_file(dest) => Ok(()),
            Ok(()) => {
                remove_file_quietly(dest);
                Err("downloaded file is empty".to_owned())
            }
            Err(err) => {
                remove_file_quietly(dest);
                Err(err)
            }
        }
    }
}
