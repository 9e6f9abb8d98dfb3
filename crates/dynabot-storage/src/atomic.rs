//! Whole-file replacement via temp file + rename.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use dynabot_core::error::{DynabotError, Result};

/// Write `bytes` to `path` so readers see either the old or the new content.
///
/// Creates the parent directory when missing. The data is synced before the
/// rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path)?;
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(bytes)?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        DynabotError::Storage(format!("Path has no file name: {}", path.display()))
    })?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");

        write_atomic(&path, b"[1,2,3]").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[1,2,3]");
        assert!(!dir.path().join("nested").join("out.json.tmp").exists());
    }

    #[test]
    fn test_write_atomic_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        write_atomic(&path, b"a much longer original body").unwrap();
        write_atomic(&path, b"short").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "short");
    }

    #[test]
    fn test_temp_path_sits_next_to_target() {
        let tmp = temp_path(Path::new("/data/chat_history.json")).unwrap();
        assert_eq!(tmp, PathBuf::from("/data/chat_history.json.tmp"));
    }

    #[test]
    fn test_temp_path_rejects_root() {
        assert!(temp_path(Path::new("/")).is_err());
    }
}
