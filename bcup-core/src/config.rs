//! Configuration for backup storage and database access
//!
//! [`BackupConfig`] describes where backup files live and how they are kept;
//! [`DatabaseConfig`] describes how to reach the document database.

use crate::metadata::METADATA_READ_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of backups the scheduled job keeps per project
pub const DEFAULT_RETENTION: usize = 30;

/// Backup storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root directory; each project gets a subdirectory
    pub backup_dir: PathBuf,
    /// Number of newest backups kept by retention; 0 keeps every backup
    pub retention: usize,
    /// Decompressed bytes read per file when listing
    pub metadata_read_limit: usize,
    /// Gzip level, 0-9
    pub compression_level: u32,
}

impl BackupConfig {
    pub fn new<P: Into<PathBuf>>(backup_dir: P) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            ..Self::default()
        }
    }

    /// Directory holding the backups of one project
    ///
    /// The project name is sanitised so it always names a single directory
    /// below `backup_dir`.
    pub fn project_dir(&self, project: &str) -> crate::Result<PathBuf> {
        let name = sanitize_project_name(project);
        if name.is_empty() {
            return Err(crate::BcupError::missing_input("Project name is required"));
        }
        Ok(self.backup_dir.join(name))
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.backup_dir.as_os_str().is_empty() {
            return Err(crate::BcupError::validation("Backup directory must not be empty"));
        }
        if self.metadata_read_limit == 0 {
            return Err(crate::BcupError::validation("Metadata read limit must be positive"));
        }
        if self.compression_level > 9 {
            return Err(crate::BcupError::validation(format!(
                "Compression level {} is out of range 0-9",
                self.compression_level
            )));
        }
        Ok(())
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        BackupConfig {
            backup_dir: PathBuf::from("backups"),
            retention: DEFAULT_RETENTION,
            metadata_read_limit: METADATA_READ_LIMIT,
            compression_level: 9,
        }
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
pub fn sanitize_project_name(project: &str) -> String {
    project
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// How requests to the database are authenticated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Path to a service-account JSON key
    ServiceAccountFile(PathBuf),
    /// A ready-made OAuth access token
    AccessToken(String),
}

/// Document database connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Project id; taken from the service-account key when absent
    pub project_id: Option<String>,
    /// Database id within the project
    pub database: String,
    pub credentials: CredentialSource,
    /// Override of the REST endpoint (emulator or proxy)
    pub base_url: Option<String>,
}

impl DatabaseConfig {
    pub fn with_service_account<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            project_id: None,
            database: "(default)".to_string(),
            credentials: CredentialSource::ServiceAccountFile(path.into()),
            base_url: None,
        }
    }

    pub fn with_access_token<S: Into<String>, T: Into<String>>(project_id: S, token: T) -> Self {
        Self {
            project_id: Some(project_id.into()),
            database: "(default)".to_string(),
            credentials: CredentialSource::AccessToken(token.into()),
            base_url: None,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.database.trim().is_empty() {
            return Err(crate::BcupError::validation("Database id must not be empty"));
        }
        if let Some(project) = &self.project_id {
            if project.trim().is_empty() {
                return Err(crate::BcupError::validation("Project id must not be empty"));
            }
        }
        match &self.credentials {
            CredentialSource::AccessToken(token) if token.trim().is_empty() => Err(
                crate::BcupError::validation("Access token must not be empty"),
            ),
            CredentialSource::AccessToken(_) if self.project_id.is_none() => Err(
                crate::BcupError::validation("Access token credentials require a project id"),
            ),
            CredentialSource::ServiceAccountFile(path) if path.as_os_str().is_empty() => Err(
                crate::BcupError::validation("Service account path must not be empty"),
            ),
            _ => Ok(()),
        }
    }
}
