use std::fs;
use std::path::Path;

use miette::{miette, Context, IntoDiagnostic, Result};
use thiserror::Error;
use tracing::warn;

use crate::tabular::split_record;

pub const MANIFEST_COLUMNS: [&str; 6] = [
    "id",
    "url",
    "frame_start",
    "frame_end",
    "fps",
    "dataset_type",
];

/// Sentinel meaning "through end of source"
const OPEN_ENDED: i64 = -1;

/// One manifest line, fields still unparsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub id: String,
    pub url: String,
    pub frame_start: String,
    pub frame_end: String,
    pub fps: String,
    pub dataset_type: String,
}

/// The frame-index convention of the row's source dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetTag {
    /// 1-based frame indexing: frame 1 sits at time zero
    Wlasl,
    /// 0-based frame indexing
    Msasl,
    /// Unknown provenance, treated as 0-based
    Other(String),
}

impl DatasetTag {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "WLASL" => Self::Wlasl,
            "MSASL" => Self::Msasl,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn one_based(&self) -> bool {
        matches!(self, Self::Wlasl)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidRow(String);

/// A validated clip request, ready for I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRequest {
    pub id: u64,
    pub url: String,
    pub frame_start: i64,
    /// `None` is the manifest's `-1` sentinel: keep through end of source
    pub frame_end: Option<i64>,
    pub fps: f64,
    pub tag: DatasetTag,
}

impl TryFrom<&RawRow> for ClipRequest {
    type Error = InvalidRow;

    /// Coerce and check every field before any I/O is attempted.
    ///
    /// An unrecognized `dataset_type` is only a warning and falls back to
    /// the 0-based convention.
    fn try_from(raw: &RawRow) -> Result<Self, InvalidRow> {
        let id = parse_integer(&raw.id)
            .and_then(|id| u64::try_from(id).ok())
            .ok_or_else(|| InvalidRow(format!("invalid id: {:?}", raw.id)))?;

        let url = raw.url.trim().to_owned();
        if url.is_empty() {
            return Err(InvalidRow("missing URL".to_owned()));
        }

        let frame_start = parse_integer(&raw.frame_start)
            .ok_or_else(|| InvalidRow(format!("invalid frame_start: {:?}", raw.frame_start)))?;
        if frame_start < 0 {
            return Err(InvalidRow(format!("negative frame_start: {frame_start}")));
        }

        let frame_end = parse_integer(&raw.frame_end)
            .ok_or_else(|| InvalidRow(format!("invalid frame_end: {:?}", raw.frame_end)))?;
        let frame_end = match frame_end {
            OPEN_ENDED => None,
            end if end < 0 => {
                return Err(InvalidRow(format!("negative frame_end: {end}")));
            }
            end => Some(end),
        };

        let fps: f64 = raw
            .fps
            .trim()
            .parse()
            .map_err(|_| InvalidRow(format!("invalid fps: {:?}", raw.fps)))?;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(InvalidRow(format!("fps must be positive, got {fps}")));
        }

        let tag = DatasetTag::parse(&raw.dataset_type);
        if let DatasetTag::Other(other) = &tag {
            warn!("Row {id}: unknown dataset_type {other:?}, assuming 0-based frame indexing");
        }

        // The window must be non-empty once the frame convention is applied
        if let Some(end) = frame_end {
            let adjusted_start = if tag.one_based() {
                (frame_start - 1).max(0)
            } else {
                frame_start
            };
            if end <= adjusted_start {
                return Err(InvalidRow(format!(
                    "frame_end {end} does not follow adjusted frame_start {adjusted_start}"
                )));
            }
        }

        Ok(Self {
            id,
            url,
            frame_start,
            frame_end,
            fps,
            tag,
        })
    }
}

/// Parse an integer field, tolerating float renderings such as `"123.0"`
/// that dataframe exports tend to produce.
fn parse_integer(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    let f: f64 = value.parse().ok()?;
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

/// The input manifest, rows in file order.
#[derive(Debug)]
pub struct Manifest {
    pub rows: Vec<RawRow>,
}

impl Manifest {
    /// Read a CSV manifest, mapping columns by header name.
    ///
    /// A broken manifest is fatal: without it no row can be processed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not read manifest {}", path.display()))?;

        let mut lines = content.lines();
        let header = lines
            .next()
            .ok_or_else(|| miette!("Manifest {} is empty", path.display()))?;
        let columns = split_record(header);

        let mut indexes = [0usize; MANIFEST_COLUMNS.len()];
        for (slot, name) in indexes.iter_mut().zip(MANIFEST_COLUMNS) {
            *slot = columns
                .iter()
                .position(|column| column.trim() == name)
                .ok_or_else(|| miette!("Manifest is missing the `{name}` column"))?;
        }

        let rows = lines
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let fields = split_record(line);
                let field = |idx: usize| fields.get(idx).cloned().unwrap_or_default();
                RawRow {
                    id: field(indexes[0]),
                    url: field(indexes[1]),
                    frame_start: field(indexes[2]),
                    frame_end: field(indexes[3]),
                    fps: field(indexes[4]),
                    dataset_type: field(indexes[5]),
                }
            })
            .collect();

        Ok(Self { rows })
    }

    /// Keep a random subset of `n` rows, preserving manifest order.
    /// A no-op when the manifest is already small enough.
    pub fn sample(&mut self, n: usize) {
        if self.rows.len() <= n {
            return;
        }

        let mut indexes: Vec<usize> = (0..self.rows.len()).collect();
        fastrand::shuffle(&mut indexes);
        indexes.truncate(n);
        indexes.sort_unstable();

        self.rows = indexes
            .into_iter()
            .map(|idx| std::mem::take(&mut self.rows[idx]))
            .collect();
    }
}
