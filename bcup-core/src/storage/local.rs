/*!
Local filesystem storage adapter implementation.
*/

use super::{FileStat, StorageAdapter};
use crate::{BcupError, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Local filesystem storage adapter
///
/// Files are written to a temporary file in the target directory, synced, and
/// renamed into place, so a crash never leaves a half-written backup under
/// its final name. Missing parent directories are created.
///
/// # Example
/// ```rust
/// use bcup_core::{LocalFileStorage, StorageAdapter};
///
/// let dir = tempfile::tempdir().unwrap();
/// let storage = LocalFileStorage::with_base_dir(dir.path());
/// storage.save(b"compressed backup", "backup_2024-01-01_00-00-00.json.gz").unwrap();
/// assert!(storage.exists("backup_2024-01-01_00-00-00.json.gz"));
/// ```
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    /// Optional base directory for all backups
    base_dir: Option<PathBuf>,
}

impl LocalFileStorage {
    /// Paths provided to save/load will be used as-is.
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    /// All paths will be resolved relative to `base_dir`.
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.as_ref().to_path_buf()),
        }
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Resolve the full path for a given storage path
    fn resolve_path(&self, path: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(path),
            None => PathBuf::from(path),
        }
    }

    fn list_dir(&self) -> PathBuf {
        self.base_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure the parent directory exists, creating it if necessary
    fn ensure_parent_dir(&self, path: &Path) -> Result<PathBuf> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.exists() {
            fs::create_dir_all(&parent).map_err(|e| {
                BcupError::storage(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(parent)
    }
}

impl Default for LocalFileStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found_or(path: &str, full_path: &Path, action: &str, e: std::io::Error) -> BcupError {
    if e.kind() == ErrorKind::NotFound {
        BcupError::FileNotFound(path.to_string())
    } else {
        BcupError::storage(format!("Failed to {} {}: {}", action, full_path.display(), e))
    }
}

impl StorageAdapter for LocalFileStorage {
    fn save(&self, data: &[u8], path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);
        let parent = self.ensure_parent_dir(&full_path)?;

        let write_err = |e: std::io::Error| {
            BcupError::storage(format!("Failed to write {}: {}", full_path.display(), e))
        };

        let mut temp = NamedTempFile::new_in(&parent).map_err(write_err)?;
        temp.write_all(data).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&full_path).map_err(|e| write_err(e.error))?;

        Ok(())
    }

    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve_path(path);
        fs::read(&full_path).map_err(|e| not_found_or(path, &full_path, "read", e))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve_path(path).is_file()
    }

    fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);

        if full_path.exists() {
            fs::remove_file(&full_path).map_err(|e| {
                BcupError::storage(format!("Failed to delete {}: {}", full_path.display(), e))
            })?;
        }

        Ok(())
    }

    fn list(&self, suffix: &str) -> Result<Vec<String>> {
        let dir = self.list_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(BcupError::storage(format!(
                    "Failed to list {}: {}",
                    dir.display(),
                    e
                )))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(suffix) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn stat(&self, path: &str) -> Result<FileStat> {
        let full_path = self.resolve_path(path);
        let metadata = fs::metadata(&full_path).map_err(|e| not_found_or(path, &full_path, "stat", e))?;
        let modified = metadata
            .modified()
            .map_err(|e| not_found_or(path, &full_path, "stat", e))?;

        Ok(FileStat {
            size: metadata.len(),
            modified: DateTime::<Utc>::from(modified),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_file_storage_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());

        let test_data = b"test backup data";
        let path = "backup_2024-01-01_00-00-00.json.gz";

        assert!(storage.save(test_data, path).is_ok());
        assert!(storage.exists(path));
        assert_eq!(storage.load(path).unwrap(), test_data);
        assert_eq!(storage.stat(path).unwrap().size, test_data.len() as u64);

        assert!(storage.delete(path).is_ok());
        assert!(!storage.exists(path));
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());

        storage.save(b"first", "backup_a.json.gz").unwrap();
        storage.save(b"second", "backup_a.json.gz").unwrap();

        assert_eq!(storage.load("backup_a.json.gz").unwrap(), b"second");
        // no temp files left behind
        assert_eq!(storage.list("").unwrap(), vec!["backup_a.json.gz"]);
    }

    #[test]
    fn test_creates_missing_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path().join("shop-1"));

        storage.save(b"data", "backup_a.json.gz").unwrap();
        assert!(temp_dir.path().join("shop-1/backup_a.json.gz").is_file());
    }

    #[test]
    fn test_list_filters_by_suffix_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());

        storage.save(b"b", "users_2024.json.gz").unwrap();
        storage.save(b"a", "backup_2024.json.gz").unwrap();
        storage.save(b"c", "notes.txt").unwrap();
        fs::create_dir(temp_dir.path().join("nested.json.gz")).unwrap();

        assert_eq!(
            storage.list(".json.gz").unwrap(),
            vec!["backup_2024.json.gz", "users_2024.json.gz"]
        );
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path().join("absent"));
        assert!(storage.list(".json.gz").unwrap().is_empty());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());

        assert!(matches!(
            storage.load("nonexistent.json.gz"),
            Err(BcupError::FileNotFound(_))
        ));
        assert!(matches!(
            storage.stat("nonexistent.json.gz"),
            Err(BcupError::FileNotFound(_))
        ));
    }
}
