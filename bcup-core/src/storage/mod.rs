/*!
Storage adapters for backup files.

The engine only talks to [`StorageAdapter`]; the local filesystem adapter is the
one used in production, the in-memory adapter backs unit tests.
*/

pub mod local;

use crate::Result;
use chrono::{DateTime, Utc};

pub use local::LocalFileStorage;

/// Size and modification time of a stored file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Storage abstraction for saving and loading backup files
///
/// Paths are relative to whatever root the implementation is configured with.
pub trait StorageAdapter {
    /// Save data to the specified location, replacing any existing file
    fn save(&self, data: &[u8], path: &str) -> Result<()>;

    /// Load data from the specified location
    ///
    /// # Errors
    /// `BcupError::FileNotFound` when nothing is stored at `path`
    fn load(&self, path: &str) -> Result<Vec<u8>>;

    /// Check if a file exists at the specified location
    fn exists(&self, path: &str) -> bool;

    /// Delete the file at the specified location; deleting a missing file is not an error
    fn delete(&self, path: &str) -> Result<()>;

    /// Names of all stored files ending in `suffix`, sorted by name
    fn list(&self, suffix: &str) -> Result<Vec<String>>;

    /// Size and modification time of a stored file
    fn stat(&self, path: &str) -> Result<FileStat>;
}

/// Memory-based storage adapter for testing
#[cfg(test)]
pub struct MemoryStorage {
    data: std::sync::Mutex<std::collections::BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
}

#[cfg(test)]
impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: std::sync::Mutex::new(std::collections::BTreeMap::new()),
        }
    }

    /// Store a file with an explicit modification time
    pub fn insert_at(&self, path: &str, data: &[u8], modified: DateTime<Utc>) {
        let mut storage = self.data.lock().unwrap();
        storage.insert(path.to_string(), (data.to_vec(), modified));
    }
}

#[cfg(test)]
impl StorageAdapter for MemoryStorage {
    fn save(&self, data: &[u8], path: &str) -> Result<()> {
        self.insert_at(path, data, Utc::now());
        Ok(())
    }

    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let storage = self.data.lock().unwrap();
        storage
            .get(path)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| crate::BcupError::FileNotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.data.lock().unwrap().contains_key(path)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.data.lock().unwrap().remove(path);
        Ok(())
    }

    fn list(&self, suffix: &str) -> Result<Vec<String>> {
        let storage = self.data.lock().unwrap();
        Ok(storage
            .keys()
            .filter(|name| name.ends_with(suffix))
            .cloned()
            .collect())
    }

    fn stat(&self, path: &str) -> Result<FileStat> {
        let storage = self.data.lock().unwrap();
        storage
            .get(path)
            .map(|(data, modified)| FileStat {
                size: data.len() as u64,
                modified: *modified,
            })
            .ok_or_else(|| crate::BcupError::FileNotFound(path.to_string()))
    }
}
