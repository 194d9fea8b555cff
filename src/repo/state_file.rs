use crate::models::error::{Result, ScanError};
use crate::models::scan_state::ScanState;
use log::{debug, info};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Reads the snapshot. A missing file is `Ok(None)`; a present but unusable one is an error.
pub fn load_state(path: &Path) -> Result<Option<ScanState>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No state file at {}", path.display());
            return Ok(None);
        }
        Err(cause) => {
            return Err(ScanError::StateRead {
                path: path.to_path_buf(),
                cause,
            })
        }
    };

    let state: ScanState = serde_json::from_str(&content).map_err(|cause| ScanError::StateParse {
        path: path.to_path_buf(),
        cause,
    })?;

    if state.last_run_iso.as_deref().map_or(true, |s| s.trim().is_empty()) {
        return Err(ScanError::StateMissingTimestamp {
            path: path.to_path_buf(),
        });
    }

    Ok(Some(state))
}

/// Writes the snapshot as pretty UTF-8 JSON through a sibling temp file and a rename.
pub fn save_state(path: &Path, state: &ScanState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    let tmp_path = temp_sibling(path);

    fs::write(&tmp_path, json.as_bytes()).map_err(|cause| ScanError::StateWrite {
        path: tmp_path.clone(),
        cause,
    })?;
    fs::rename(&tmp_path, path).map_err(|cause| ScanError::StateWrite {
        path: path.to_path_buf(),
        cause,
    })?;

    info!(
        "Saved state to {} ({} tracked files)",
        path.display(),
        state.seen_files.len()
    );
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
