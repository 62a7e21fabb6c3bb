/*!
Backup engine: creating, listing, reading and deleting backup files.

The engine orchestrates the codec, compression and storage components. It is
generic over both adapters so the same logic runs against the local
filesystem in production and an in-memory store in tests.
*/

use crate::codec::{self, CanonicalBackup, DecodedBackup, BACKUP_SUFFIX};
use crate::compression::{CompressionAdapter, GzipCompressor};
use crate::config::BackupConfig;
use crate::metadata::{self, BackupSummary, METADATA_READ_LIMIT, UNIFIED_PREFIX};
use crate::storage::{LocalFileStorage, StorageAdapter};
use crate::{BcupError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of writing a backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBackup {
    pub file: String,
    pub collections: Vec<String>,
    pub documents: usize,
    /// Compressed size in bytes
    pub size: u64,
}

/// Main engine for backup file operations
///
/// # Example
/// ```rust
/// use bcup_core::{BackupEngine, CanonicalBackup, GzipCompressor, LocalFileStorage};
/// use serde_json::json;
///
/// let dir = tempfile::tempdir().unwrap();
/// let engine = BackupEngine::new(LocalFileStorage::with_base_dir(dir.path()), GzipCompressor::new());
///
/// let backup = CanonicalBackup::new().with_collection("parts", vec![json!({"id": "1"})]);
/// let created = engine.create_backup(&backup).unwrap();
///
/// let restored = engine.load_backup(&created.file).unwrap();
/// assert_eq!(restored.backup.collections, backup.collections);
/// ```
pub struct BackupEngine<S, C>
where
    S: StorageAdapter,
    C: CompressionAdapter,
{
    storage: S,
    compressor: C,
    metadata_read_limit: usize,
}

impl<S, C> BackupEngine<S, C>
where
    S: StorageAdapter,
    C: CompressionAdapter,
{
    pub fn new(storage: S, compressor: C) -> Self {
        Self {
            storage,
            compressor,
            metadata_read_limit: METADATA_READ_LIMIT,
        }
    }

    /// Cap on decompressed bytes read per file while listing
    pub fn with_metadata_read_limit(mut self, limit: usize) -> Self {
        self.metadata_read_limit = limit;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Write `backup` as a new unified backup file named after the current time
    ///
    /// # Errors
    /// * `BcupError::MissingInput` - no collections were supplied
    /// * `BcupError::Storage` - the file could not be written
    pub fn create_backup(&self, backup: &CanonicalBackup) -> Result<CreatedBackup> {
        self.create_backup_at(backup, Utc::now())
    }

    /// Same as [`create_backup`](Self::create_backup) with an explicit timestamp
    pub fn create_backup_at(&self, backup: &CanonicalBackup, at: DateTime<Utc>) -> Result<CreatedBackup> {
        if backup.is_empty() {
            return Err(BcupError::missing_input("No collections to back up"));
        }

        let file = metadata::backup_file_name(UNIFIED_PREFIX, at);
        if self.storage.exists(&file) {
            warn!(file = %file, "Backup with the same timestamp exists, overwriting");
        }

        let json = codec::encode(backup, at)?;
        let compressed = self.compressor.compress(&json)?;
        self.storage.save(&compressed, &file)?;

        let created = CreatedBackup {
            file,
            collections: backup.collection_names(),
            documents: backup.document_count(),
            size: compressed.len() as u64,
        };

        #[cfg(feature = "metrics")]
        if let Some(metrics) = crate::observability::BcupMetrics::global() {
            metrics.record_backup_created(created.size);
        }

        info!(
            file = %created.file,
            collections = created.collections.len(),
            documents = created.documents,
            size = created.size,
            "Backup created"
        );
        Ok(created)
    }

    /// Every stored backup, sorted by file name, with best-effort contents
    pub fn list_backups(&self) -> Result<Vec<BackupSummary>> {
        let names = self.storage.list(BACKUP_SUFFIX)?;
        let mut summaries = Vec::with_capacity(names.len());

        for name in names {
            let stat = match self.storage.stat(&name) {
                Ok(stat) => stat,
                Err(BcupError::FileNotFound(_)) => {
                    debug!(file = %name, "Backup vanished while listing");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let summary = BackupSummary::new(name.as_str(), stat.modified.timestamp(), stat.size);
            let summary = match self.storage.load(&name) {
                Ok(compressed) => summary.enrich(&self.compressor, &compressed, self.metadata_read_limit),
                Err(e) => {
                    debug!(file = %name, error = %e, "Backup not readable while listing");
                    summary
                }
            };
            summaries.push(summary);
        }

        debug!(count = summaries.len(), "Listed backups");
        Ok(summaries)
    }

    /// Read and decode a backup of any known shape
    ///
    /// # Errors
    /// * `BcupError::FileNotFound` - no such backup
    /// * `BcupError::InvalidBackupData` - not gzip, not JSON, or no known shape
    pub fn load_backup(&self, file: &str) -> Result<DecodedBackup> {
        let name = resolve_file(file)?;
        let compressed = self.storage.load(&name)?;
        let data = self
            .compressor
            .decompress(&compressed)
            .map_err(|e| BcupError::invalid_backup(format!("{name}: {e}")))?;

        let decoded = codec::decode(&data, &name)?;
        debug!(
            file = %name,
            format = ?decoded.format,
            documents = decoded.backup.document_count(),
            "Backup loaded"
        );
        Ok(decoded)
    }

    /// The stored (compressed) bytes of a backup, for download
    pub fn read_raw(&self, file: &str) -> Result<(String, Vec<u8>)> {
        let name = resolve_file(file)?;
        let data = self.storage.load(&name)?;
        Ok((name, data))
    }

    /// Delete one backup
    ///
    /// # Errors
    /// `BcupError::FileNotFound` when the backup does not exist
    pub fn delete_backup(&self, file: &str) -> Result<()> {
        let name = resolve_file(file)?;
        if !self.storage.exists(&name) {
            return Err(BcupError::FileNotFound(name));
        }
        self.storage.delete(&name)?;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = crate::observability::BcupMetrics::global() {
            metrics.record_backup_deleted();
        }

        info!(file = %name, "Backup deleted");
        Ok(())
    }

    /// Keep the `keep` newest backups (by modification time), delete the rest
    ///
    /// `keep == 0` disables retention. Returns the names of the deleted files,
    /// oldest first.
    pub fn apply_retention(&self, keep: usize) -> Result<Vec<String>> {
        if keep == 0 {
            return Ok(Vec::new());
        }

        let mut stamped = self.stamped_backups()?;
        if stamped.len() <= keep {
            return Ok(Vec::new());
        }

        // newest first, name breaks ties
        stamped.sort_by(|a, b| b.cmp(a));
        let mut expired: Vec<String> = stamped.split_off(keep).into_iter().map(|(_, name)| name).collect();
        expired.reverse();

        for name in &expired {
            self.storage.delete(name)?;
            #[cfg(feature = "metrics")]
            if let Some(metrics) = crate::observability::BcupMetrics::global() {
                metrics.record_backup_deleted();
            }
        }

        info!(kept = keep, deleted = expired.len(), "Retention applied");
        Ok(expired)
    }

    /// Name of the most recently modified backup, `None` when there are none
    pub fn latest_backup(&self) -> Result<Option<String>> {
        Ok(self.stamped_backups()?.into_iter().max().map(|(_, name)| name))
    }

    fn stamped_backups(&self) -> Result<Vec<(DateTime<Utc>, String)>> {
        let mut stamped = Vec::new();
        for name in self.storage.list(BACKUP_SUFFIX)? {
            match self.storage.stat(&name) {
                Ok(stat) => stamped.push((stat.modified, name)),
                Err(BcupError::FileNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(stamped)
    }
}

/// Reduce a caller-supplied file name to a stored backup name
fn resolve_file(file: &str) -> Result<String> {
    if file.trim().is_empty() {
        return Err(BcupError::missing_input("File name is required"));
    }
    metadata::sanitize_file_name(file).ok_or_else(|| BcupError::FileNotFound(file.to_string()))
}

/// Engine over a local directory with maximum gzip compression
pub fn create_default_engine<P: AsRef<Path>>(backup_dir: P) -> BackupEngine<LocalFileStorage, GzipCompressor> {
    BackupEngine::new(
        LocalFileStorage::with_base_dir(backup_dir),
        GzipCompressor::new(),
    )
}

/// Engine for one project's backup directory
pub fn create_engine_from_config(
    config: &BackupConfig,
    project: &str,
) -> Result<BackupEngine<LocalFileStorage, GzipCompressor>> {
    config.validate()?;
    let dir = config.project_dir(project)?;

    Ok(BackupEngine::new(
        LocalFileStorage::with_base_dir(dir),
        GzipCompressor::with_level(config.compression_level),
    )
    .with_metadata_read_limit(config.metadata_read_limit))
}
