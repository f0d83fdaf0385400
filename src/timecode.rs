use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed time string: {0:?}")]
pub struct MalformedTime(pub String);

/// Parse a `H:MM:SS[.ms]`, `M:SS[.ms]` or `SS[.ms]` string into seconds.
///
/// Whether a parse failure is fatal or merely skips one segment is the
/// caller's call.
pub fn parse_time(value: &str) -> Result<f64, MalformedTime> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MalformedTime(value.to_owned()));
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return Err(MalformedTime(value.to_owned()));
    }

    let mut secs = 0.0;
    for part in parts {
        let n: f64 = part
            .parse()
            .map_err(|_| MalformedTime(value.to_owned()))?;
        if n < 0.0 || !n.is_finite() {
            return Err(MalformedTime(value.to_owned()));
        }
        secs = 60.0 * secs + n;
    }
    Ok(secs)
}

/// A frame range converted into a trim request in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start_secs: f64,
    /// `None` means "keep through the source's actual end"
    pub end_secs: Option<f64>,
}

impl TimeWindow {
    /// Convert a frame range to seconds, applying the dataset's frame
    /// convention.
    ///
    /// With a 1-based convention frame 1 sits at time zero, so the start
    /// frame is shifted down by one. A start below the origin is clamped
    /// to zero.
    pub fn from_frames(frame_start: i64, frame_end: Option<i64>, fps: f64, one_based: bool) -> Self {
        let adjusted = if one_based {
            if frame_start >= 1 {
                frame_start - 1
            } else {
                warn!("frame_start {frame_start} is below the 1-based origin, using 0");
                0
            }
        } else {
            frame_start
        };

        Self {
            start_secs: adjusted as f64 / fps,
            end_secs: frame_end.map(|frame| frame as f64 / fps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_timecode() {
        assert_eq!(parse_time("1:02:03.5"), Ok(3723.5));
    }

    #[test]
    fn parses_minute_second() {
        assert_eq!(parse_time("0:05"), Ok(5.0));
        assert_eq!(parse_time("2:30"), Ok(150.0));
    }

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_time("65"), Ok(65.0));
        assert_eq!(parse_time(" 6.25 "), Ok(6.25));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_time("a:b:c").is_err());
        assert!(parse_time("").is_err());
        assert!(parse_time("1:2:3:4").is_err());
        assert!(parse_time("1::2").is_err());
        assert!(parse_time("-5").is_err());
        assert!(parse_time("inf").is_err());
    }

    #[test]
    fn zero_based_window() {
        let window = TimeWindow::from_frames(30, Some(90), 30.0, false);
        assert_eq!(window.start_secs, 1.0);
        assert_eq!(window.end_secs, Some(3.0));
    }

    #[test]
    fn one_based_window_shifts_start() {
        let window = TimeWindow::from_frames(30, Some(90), 30.0, true);
        assert_eq!(window.start_secs, 29.0 / 30.0);
    }

    #[test]
    fn one_based_window_clamps_origin() {
        let window = TimeWindow::from_frames(0, None, 25.0, true);
        assert_eq!(window.start_secs, 0.0);
        assert_eq!(window.end_secs, None);
    }

    #[test]
    fn open_ended_window() {
        let window = TimeWindow::from_frames(50, None, 25.0, false);
        assert_eq!(window.start_secs, 2.0);
        assert_eq!(window.end_secs, None);
    }
}
