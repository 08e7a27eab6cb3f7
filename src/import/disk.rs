//! File system access used by import, behind a trait so decisions can be
//! tested without touching disk.

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

use crate::parser::is_video_file;

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DiskError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            DiskError::NotFound(path.to_path_buf())
        } else {
            DiskError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait DiskProvider: Send + Sync {
    /// Free bytes on the volume holding `path` (or its nearest existing
    /// ancestor).
    fn available_space(&self, path: &Path) -> Result<u64, DiskError>;
    fn file_size(&self, path: &Path) -> Result<u64, DiskError>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn move_file(&self, from: &Path, to: &Path) -> Result<(), DiskError>;
    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), DiskError>;
    fn delete_file(&self, path: &Path) -> Result<(), DiskError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), DiskError>;
    fn last_write_time(&self, path: &Path) -> Option<SystemTime>;
    /// Video files under `path`, recursively, sorted.
    fn get_video_files(&self, path: &Path) -> Vec<PathBuf>;
    /// Every file under `path`, recursively, sorted.
    fn get_files(&self, path: &Path) -> Vec<PathBuf>;
}

#[derive(Debug, Default, Clone)]
pub struct LocalDiskProvider;

impl LocalDiskProvider {
    pub fn new() -> Self {
        Self
    }

    fn walk_files(path: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }
}

impl DiskProvider for LocalDiskProvider {
    fn available_space(&self, path: &Path) -> Result<u64, DiskError> {
        let existing = path
            .ancestors()
            .find(|p| p.exists())
            .ok_or_else(|| DiskError::NotFound(path.to_path_buf()))?;
        fs2::available_space(existing).map_err(|e| DiskError::io(existing, e))
    }

    fn file_size(&self, path: &Path) -> Result<u64, DiskError> {
        std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| DiskError::io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<(), DiskError> {
        if to.exists() {
            return Err(DiskError::DestinationExists(to.to_path_buf()));
        }
        match std::fs::rename(from, to) {
            Ok(()) => Ok(()),
            // Cross-device: copy then delete.
            Err(_) => {
                std::fs::copy(from, to).map_err(|e| DiskError::io(from, e))?;
                std::fs::remove_file(from).map_err(|e| DiskError::io(from, e))
            }
        }
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), DiskError> {
        if to.exists() {
            return Err(DiskError::DestinationExists(to.to_path_buf()));
        }
        std::fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| DiskError::io(from, e))
    }

    fn delete_file(&self, path: &Path) -> Result<(), DiskError> {
        std::fs::remove_file(path).map_err(|e| DiskError::io(path, e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), DiskError> {
        std::fs::create_dir_all(path).map_err(|e| DiskError::io(path, e))
    }

    fn last_write_time(&self, path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn get_video_files(&self, path: &Path) -> Vec<PathBuf> {
        if path.is_file() {
            return if is_video_file(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            };
        }
        Self::walk_files(path)
            .into_iter()
            .filter(|p| is_video_file(p))
            .collect()
    }

    fn get_files(&self, path: &Path) -> Vec<PathBuf> {
        if path.is_file() {
            return vec![path.to_path_buf()];
        }
        Self::walk_files(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_video_files_are_found_recursively() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Sub")).unwrap();
        std::fs::write(dir.path().join("b.mkv"), b"x").unwrap();
        std::fs::write(dir.path().join("Sub/a.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("info.nfo"), b"x").unwrap();

        let disk = LocalDiskProvider::new();
        let videos = disk.get_video_files(dir.path());
        assert_eq!(videos.len(), 2);
        assert_eq!(disk.get_files(dir.path()).len(), 3);
    }

    #[test]
    fn test_move_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("from.mkv");
        let to = dir.path().join("to.mkv");
        std::fs::write(&from, b"new").unwrap();
        std::fs::write(&to, b"old").unwrap();

        let disk = LocalDiskProvider::new();
        assert!(matches!(
            disk.move_file(&from, &to),
            Err(DiskError::DestinationExists(_))
        ));

        std::fs::remove_file(&to).unwrap();
        disk.move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"new");
    }

    #[test]
    fn test_available_space_for_missing_path_uses_ancestor() {
        let dir = TempDir::new().unwrap();
        let disk = LocalDiskProvider::new();
        assert!(disk.available_space(&dir.path().join("not/yet/created")).is_ok());
        assert!(matches!(
            disk.file_size(&dir.path().join("missing")),
            Err(DiskError::NotFound(_))
        ));
    }
}
