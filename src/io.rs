use std::path::{Path, PathBuf};

use tracing::warn;

/// Deterministic final artifact path for a manifest row.
pub fn output_path(out_dir: &Path, id: u64) -> PathBuf {
    out_dir.join(format!("{id}.mp4"))
}

/// Download template for a scratch copy that will be trimmed then deleted.
/// Kept distinct from [`output_path`] so the full source and the trimmed
/// result never collide.
pub fn scratch_template(out_dir: &Path, id: u64) -> PathBuf {
    out_dir.join(format!("{id}_temp"))
}

/// Download template for a row that needs no trimming. The tool appends
/// the extension, landing the file on (or next to) the final path.
pub fn direct_template(out_dir: &Path, id: u64) -> PathBuf {
    out_dir.join(id.to_string())
}

pub fn is_non_empty_file(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Delete a file, logging instead of failing when it cannot be removed.
/// A missing file is not an error.
pub fn remove_file_quietly(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {}: {err}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_keyed_by_id() {
        let out = Path::new("/videos");
        assert_eq!(output_path(out, 42), Path::new("/videos/42.mp4"));
        assert_eq!(scratch_template(out, 42), Path::new("/videos/42_temp"));
        assert_eq!(direct_template(out, 42), Path::new("/videos/42"));
    }

    #[test]
    fn empty_file_is_not_non_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mp4");
        std::fs::write(&path, b"").unwrap();
        assert!(!is_non_empty_file(&path));
        std::fs::write(&path, b"data").unwrap();
        assert!(is_non_empty_file(&path));
    }

    #[test]
    fn removing_a_missing_file_is_fine() {
        remove_file_quietly(Path::new("/definitely/not/here.mp4"));
    }
}
