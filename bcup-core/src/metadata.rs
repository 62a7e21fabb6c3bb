/*!
Backup listing metadata and file naming.
*/

use crate::codec::{self, CanonicalBackup, BACKUP_SUFFIX};
use crate::compression::CompressionAdapter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decompressed bytes read when enriching a listing entry
pub const METADATA_READ_LIMIT: usize = 5_000_000;

/// File name prefix of backups written by this crate
pub const UNIFIED_PREFIX: &str = "backup";

/// One entry of a backup listing
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BackupSummary {
    /// Base file name
    pub file: String,

    /// Modification time, seconds since the Unix epoch
    pub timestamp: i64,

    /// Collection names found in the file (empty when unreadable)
    pub collections: Vec<String>,

    /// Total document count, `None` when the contents could not be read
    pub documents: Option<usize>,

    /// Compressed size in bytes
    pub size: u64,
}

impl BackupSummary {
    /// Create a summary with no content information
    pub fn new<S: Into<String>>(file: S, timestamp: i64, size: u64) -> Self {
        Self {
            file: file.into(),
            timestamp,
            collections: Vec::new(),
            documents: None,
            size,
        }
    }

    /// Fill in collection names and document count
    pub fn with_contents(mut self, backup: &CanonicalBackup) -> Self {
        self.collections = backup.collection_names();
        self.documents = Some(backup.document_count());
        self
    }

    /// Best-effort enrichment from the compressed file contents.
    ///
    /// At most `limit` decompressed bytes are read. Files that are cut short,
    /// corrupt, or in no known shape leave the summary without content
    /// information instead of failing.
    pub fn enrich<C: CompressionAdapter>(self, compressor: &C, compressed: &[u8], limit: usize) -> Self {
        let (data, truncated) = match compressor.decompress_capped(compressed, limit) {
            Ok(read) => read,
            Err(e) => {
                debug!(file = %self.file, error = %e, "Backup not decompressible");
                return self;
            }
        };
        if truncated {
            debug!(file = %self.file, limit, "Backup read stopped at limit");
        }

        match codec::decode(&data, &self.file) {
            Ok(decoded) => self.with_contents(&decoded.backup),
            Err(e) => {
                debug!(file = %self.file, error = %e, "Backup contents unreadable");
                self
            }
        }
    }
}

/// Generate a backup file name: `{prefix}_{YYYY-MM-DD_HH-MM-SS}.json.gz`
///
/// Resolution is one second; two backups with the same prefix in the same
/// second get the same name.
pub fn backup_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}{}", prefix, at.format("%Y-%m-%d_%H-%M-%S"), BACKUP_SUFFIX)
}

/// Reduce a caller-supplied file reference to a plain backup file name.
///
/// Directory components are dropped; returns `None` for empty names and names
/// that are not `.json.gz` files.
pub fn sanitize_file_name(file: &str) -> Option<String> {
    let base = file.rsplit(['/', '\\']).next().unwrap_or(file).trim();
    if base.is_empty() || base == "." || base == ".." || !base.ends_with(BACKUP_SUFFIX) {
        return None;
    }
    Some(base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::GzipCompressor;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_backup_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            backup_file_name(UNIFIED_PREFIX, at),
            "backup_2024-01-02_03-04-05.json.gz"
        );
        assert_eq!(backup_file_name("parts", at), "parts_2024-01-02_03-04-05.json.gz");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(
            sanitize_file_name("../../etc/backup_x.json.gz"),
            Some("backup_x.json.gz".to_string())
        );
        assert_eq!(sanitize_file_name("..\\backup_x.json.gz"), Some("backup_x.json.gz".to_string()));
        assert_eq!(sanitize_file_name("../../etc/passwd"), None);
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name("dir/"), None);
    }

    #[test]
    fn test_enrich_unified_backup() {
        let compressor = GzipCompressor::new();
        let raw = serde_json::to_vec(&json!({"collections": {"users": [], "orders": [{"id": "1"}]}})).unwrap();
        let compressed = compressor.compress(&raw).unwrap();

        let summary = BackupSummary::new("backup_2024-01-01_00-00-00.json.gz", 10, 20)
            .enrich(&compressor, &compressed, METADATA_READ_LIMIT);

        assert_eq!(summary.collections, vec!["users", "orders"]);
        assert_eq!(summary.documents, Some(1));
    }

    #[test]
    fn test_enrich_legacy_backup() {
        let compressor = GzipCompressor::new();
        let compressed = compressor.compress(br#"[{"id":"1"},{"id":"2"}]"#).unwrap();

        let summary = BackupSummary::new("parts_2024-01-01_00-00-00.json.gz", 0, 0)
            .enrich(&compressor, &compressed, METADATA_READ_LIMIT);

        assert_eq!(summary.collections, vec!["parts"]);
        assert_eq!(summary.documents, Some(2));
    }

    #[test]
    fn test_enrich_over_limit_yields_no_count() {
        let compressor = GzipCompressor::new();
        let documents: Vec<_> = (0..200).map(|i| json!({"id": i.to_string(), "pad": "x".repeat(50)})).collect();
        let raw = serde_json::to_vec(&json!({"collections": {"parts": documents}})).unwrap();
        let compressed = compressor.compress(&raw).unwrap();

        let summary = BackupSummary::new("backup_2024-01-01_00-00-00.json.gz", 0, 0)
            .enrich(&compressor, &compressed, 1_000);

        assert_eq!(summary.documents, None);
        assert!(summary.collections.is_empty());
    }

    #[test]
    fn test_enrich_corrupt_file_yields_no_count() {
        let compressor = GzipCompressor::new();
        let summary = BackupSummary::new("backup_bad.json.gz", 0, 3)
            .enrich(&compressor, b"not gzip at all", METADATA_READ_LIMIT);

        assert_eq!(summary.documents, None);
        assert_eq!(summary.size, 3);
    }

    #[test]
    fn test_summary_serializes_null_count() {
        let summary = BackupSummary::new("backup_x.json.gz", 1, 2);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["documents"], serde_json::Value::Null);
        assert_eq!(value["collections"], json!([]));
    }
}
