use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::audit::{Status, StatusRecord};
use crate::fetcher::{normalize_url, Fetcher};
use crate::io::{
    direct_template, is_non_empty_file, output_path, remove_file_quietly, scratch_template,
};
use crate::manifest::{ClipRequest, RawRow};
use crate::timecode::TimeWindow;
use crate::trimmer::Trimmer;

/// Drives one manifest row through validate, skip-existing, fetch,
/// trim-or-rename and cleanup, folding every failure into exactly one
/// terminal [`StatusRecord`].
pub struct RowProcessor<'a> {
    out_dir: &'a Path,
    fetcher: &'a Fetcher<'a>,
    trimmer: &'a Trimmer<'a>,
}

impl<'a> RowProcessor<'a> {
    pub fn new(out_dir: &'a Path, fetcher: &'a Fetcher<'a>, trimmer: &'a Trimmer<'a>) -> Self {
        Self {
            out_dir,
            fetcher,
            trimmer,
        }
    }

    pub fn process(&self, raw: &RawRow) -> StatusRecord {
        let request = match ClipRequest::try_from(raw) {
            Ok(request) => request,
            Err(err) => {
                warn!("Row {}: invalid data: {err}", raw.id);
                return StatusRecord::new(
                    &raw.id,
                    &raw.url,
                    "",
                    "",
                    Status::InvalidData,
                    &err.to_string(),
                );
            }
        };

        let output = output_path(self.out_dir, request.id);
        let output_str = output.to_string_lossy().into_owned();
        let record = |status, original_filename: &str, error: &str| {
            StatusRecord::new(&raw.id, &raw.url, original_filename, &output_str, status, error)
        };

        // Cheap resume: completed work is terminal immediately
        if is_non_empty_file(&output) {
            info!("Row {}: output already exists, skipping", request.id);
            return record(Status::SkippedExisting, "", "");
        }

        let Some(url) = normalize_url(&request.url) else {
            return record(Status::InvalidData, "", "empty URL after normalization");
        };

        let needs_trim = request.frame_end.is_some();
        let template = if needs_trim {
            scratch_template(self.out_dir, request.id)
        } else {
            direct_template(self.out_dir, request.id)
        };

        let fetched = match self.fetcher.fetch(&url, &template) {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!("Row {}: download failed: {err}", request.id);
                return record(Status::FailedDownload, "", &err.to_string());
            }
        };
        let original_filename = fetched
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if needs_trim {
            let window = TimeWindow::from_frames(
                request.frame_start,
                request.frame_end,
                request.fps,
                request.tag.one_based(),
            );
            debug!(
                "Row {}: trimming [{:.3}s, {:?}) of {}",
                request.id,
                window.start_secs,
                window.end_secs,
                fetched.path.display()
            );
            let result = self
                .trimmer
                .trim(&fetched.path, &output, window.start_secs, window.end_secs);

            // The scratch source is consumed whether or not the trim worked
            remove_file_quietly(&fetched.path);

            if let Err(err) = result {
                warn!("Row {}: cut failed: {err}", request.id);
                return record(Status::FailedCut, &original_filename, &err.to_string());
            }
        } else if fetched.path != output {
            debug!(
                "Row {}: renaming {} into place",
                request.id,
                fetched.path.display()
            );
            if let Err(err) = fs::rename(&fetched.path, &output) {
                warn!("Row {}: could not rename the download into place: {err}", request.id);
                remove_file_quietly(&fetched.path);
                return record(
                    Status::FailedPostprocess,
                    &original_filename,
                    &format!("rename failed: {err}"),
                );
            }
        }

        if is_non_empty_file(&output) {
            info!("Row {}: completed -> {}", request.id, output.display());
            record(Status::Success, &original_filename, "")
        } else {
            record(
                Status::FailedPostprocess,
                &original_filename,
                "final artifact missing after processing",
            )
        }
    }
}
