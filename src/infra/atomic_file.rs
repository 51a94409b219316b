use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{RcmError, Result};

/// `dir/name.csv` -> `dir/name.csv.tmp`
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!("{file_name}.tmp"))
}

/// Run `write` against a sibling temp file, then rename it over `path`.
/// On failure the temp file is removed and the final name is never created.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let export_err = |reason: String| RcmError::Export {
        path: path.display().to_string(),
        reason,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| export_err(format!("creating directory: {e}")))?;
    }

    let tmp_path = tmp_path_for(path);
    if let Err(e) = write(&tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(match e {
            RcmError::Export { .. } => e,
            other => export_err(other.to_string()),
        });
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        export_err(format!("renaming {}: {e}", tmp_path.display()))
    })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Write a whole string atomically
pub fn write_string(path: &Path, content: &str) -> Result<()> {
    write_atomically(path, |tmp| Ok(fs::write(tmp, content)?))
}
