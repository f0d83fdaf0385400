use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::fetcher::{FetchError, Fetcher};
use crate::io::remove_file_quietly;
use crate::timecode::parse_time;
use crate::trimmer::Trimmer;

/// Parse a `START-END` pair. Malformed timecodes and non-increasing
/// windows disqualify the segment, they do not abort the run.
pub fn parse_segment(spec: &str) -> Option<(f64, f64)> {
    let (start, end) = spec.split_once('-')?;
    let start = parse_time(start).ok()?;
    let end = parse_time(end).ok()?;
    (end > start).then_some((start, end))
}

/// Output path of the `index`-th requested segment, numbered from 1 in
/// request order. A skipped segment leaves a hole in the numbering so the
/// files still map back to the request.
pub fn segment_path(out_dir: &Path, stem: &str, index: usize) -> PathBuf {
    out_dir.join(format!("{stem}_segment_{}.mp4", index + 1))
}

/// Download one source and cut the requested segments out of it, returning
/// how many were produced.
///
/// Segments that fail to parse or fail to trim are skipped with a warning.
/// The full download is a scratch artifact and is deleted whatever the
/// outcome.
pub fn cut_segments(
    fetcher: &Fetcher<'_>,
    trimmer: &Trimmer<'_>,
    url: &str,
    out_dir: &Path,
    stem: &str,
    segments: &[String],
) -> Result<usize, FetchError> {
    let template = out_dir.join(format!("{stem}_full"));
    info!("Downloading the full source of {url}");
    let fetched = fetcher.fetch(url, &template)?;

    let mut produced = 0;
    for (index, spec) in segments.iter().enumerate() {
        let Some((start, end)) = parse_segment(spec) else {
            warn!("Skipping malformed segment {spec:?}");
            continue;
        };
        let output = segment_path(out_dir, stem, index);
        match trimmer.trim(&fetched.path, &output, start, Some(end)) {
            Ok(()) => {
                info!("Cut segment {} -> {}", index + 1, output.display());
                produced += 1;
            }
            Err(err) => warn!("Segment {} failed: {err}", index + 1),
        }
    }

    remove_file_quietly(&fetched.path);
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timecode_pairs() {
        assert_eq!(parse_segment("0:05-0:10"), Some((5.0, 10.0)));
        assert_eq!(parse_segment("90-1:40"), Some((90.0, 100.0)));
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert_eq!(parse_segment("nonsense"), None);
        assert_eq!(parse_segment("5"), None);
        assert_eq!(parse_segment("a-b"), None);
        assert_eq!(parse_segment(""), None);
    }

    #[test]
    fn rejects_non_increasing_windows() {
        assert_eq!(parse_segment("10-10"), None);
        assert_eq!(parse_segment("9-4"), None);
    }

    #[test]
    fn segments_are_numbered_from_one() {
        let out = Path::new("/videos");
        assert_eq!(
            segment_path(out, "talk", 0),
            Path::new("/videos/talk_segment_1.mp4")
        );
        assert_eq!(
            segment_path(out, "talk", 3),
            Path::new("/videos/talk_segment_4.mp4")
        );
    }
}
