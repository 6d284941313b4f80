//! Filesystem operations
//!
//! Directory handling for install prefixes and build scratch space.

use std::path::Path;

use crate::error::FilesystemError;

/// Create a directory and all parent directories.
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a directory and all its contents. Missing directories are fine.
pub fn remove_dir_all(path: &Path) -> Result<(), FilesystemError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| FilesystemError::RemoveDir {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Total size in bytes of the files under a directory.
pub fn dir_size(path: &Path) -> u64 {
    if !path.exists() {
        return 0;
    }
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_remove_nested_dirs() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b").join("c");

        create_dir_all(&nested).unwrap();
        assert!(nested.is_dir());

        remove_dir_all(&temp.path().join("a")).unwrap();
        assert!(!nested.exists());

        // Removing again is a no-op.
        remove_dir_all(&temp.path().join("a")).unwrap();
    }

    #[test]
    fn test_dir_size_sums_nested_files() {
        let temp = TempDir::new().unwrap();
        let sub = temp.path().join("lib");
        create_dir_all(&sub).unwrap();
        std::fs::write(temp.path().join("top"), vec![0u8; 100]).unwrap();
        std::fs::write(sub.join("inner"), vec![0u8; 28]).unwrap();

        assert_eq!(dir_size(temp.path()), 128);
        assert_eq!(dir_size(&temp.path().join("missing")), 0);
    }
}
