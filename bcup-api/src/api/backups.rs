//! Backup API endpoints.
//!
//! Every action is scoped to a project; the project's backups live in their
//! own directory below the configured backup root.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use bcup_core::{
    create_engine_from_config, BackupConfig, BackupSummary, CanonicalBackup, CreatedBackup,
    FormatKind, ProjectRef,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{run_blocking, success, ApiResult, AppJson, AppQuery};
use crate::errors::AppError;
use crate::AppState;

/// Query of the list endpoint.
#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub project: Option<String>,
}

/// Query of the download endpoint.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub project: Option<String>,
    pub file: Option<String>,
}

/// Body of the create endpoint.
#[derive(Debug, Deserialize)]
pub struct CreateBackupRequest {
    pub collections: Option<Map<String, Value>>,
    pub project: Option<ProjectRef>,
}

/// Body of the delete and restore endpoints.
#[derive(Debug, Deserialize)]
pub struct FileRequest {
    pub file: Option<String>,
    pub project: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedBackup {
    pub file: String,
}

/// Decoded backup contents handed to the client for writing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredBackup {
    pub collections: Map<String, Value>,
    pub project: Option<ProjectRef>,
    pub format: FormatKind,
    pub created_at: Option<String>,
}

fn require_project(project: Option<&str>) -> Result<String, AppError> {
    match project.map(str::trim) {
        Some(project) if !project.is_empty() => Ok(project.to_string()),
        _ => Err(AppError::MissingInput("No project specified".to_string())),
    }
}

fn require_file(file: Option<String>) -> Result<String, AppError> {
    match file {
        Some(file) if !file.trim().is_empty() => Ok(file),
        _ => Err(AppError::MissingInput("File not specified".to_string())),
    }
}

fn backup_config(state: &AppState) -> BackupConfig {
    state.config.backup.clone()
}

/// GET /api/v1/backups?project=P - List a project's backups.
pub async fn list_backups(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ProjectQuery>,
) -> ApiResult<Vec<BackupSummary>> {
    let project = require_project(query.project.as_deref())?;
    let config = backup_config(&state);

    let backups = run_blocking(move || create_engine_from_config(&config, &project)?.list_backups()).await?;
    success(backups)
}

/// POST /api/v1/backups - Write submitted collections as a new backup.
pub async fn create_backup(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateBackupRequest>,
) -> ApiResult<CreatedBackup> {
    let project = require_project(request.project.as_ref().and_then(ProjectRef::project_id))?;
    let collections = match request.collections {
        Some(collections) if !collections.is_empty() => collections,
        _ => return Err(AppError::MissingInput("Missing collections data".to_string())),
    };

    let backup = CanonicalBackup {
        collections,
        project: request.project,
    };
    let config = backup_config(&state);

    let created = run_blocking(move || create_engine_from_config(&config, &project)?.create_backup(&backup)).await?;
    success(created)
}

/// POST /api/v1/backups/delete - Delete one backup.
pub async fn delete_backup(
    State(state): State<AppState>,
    AppJson(request): AppJson<FileRequest>,
) -> ApiResult<DeletedBackup> {
    let project = require_project(request.project.as_deref())?;
    let file = require_file(request.file)?;
    let config = backup_config(&state);

    let deleted = run_blocking(move || {
        let engine = create_engine_from_config(&config, &project)?;
        engine.delete_backup(&file)?;
        Ok(file)
    })
    .await?;

    success(DeletedBackup { file: deleted })
}

/// POST /api/v1/backups/restore - Decode a backup for the client to write back.
pub async fn restore_backup(
    State(state): State<AppState>,
    AppJson(request): AppJson<FileRequest>,
) -> ApiResult<RestoredBackup> {
    let project = require_project(request.project.as_deref())?;
    let file = require_file(request.file)?;
    let config = backup_config(&state);

    let decoded = run_blocking(move || create_engine_from_config(&config, &project)?.load_backup(&file)).await?;
    tracing::info!(
        format = ?decoded.format,
        documents = decoded.backup.document_count(),
        "Backup decoded for restore"
    );

    success(RestoredBackup {
        collections: decoded.backup.collections,
        project: decoded.backup.project,
        format: decoded.format,
        created_at: decoded.created_at,
    })
}

/// GET /api/v1/backups/download?project=P&file=F - Stream the stored file.
pub async fn download_backup(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DownloadQuery>,
) -> Result<Response, AppError> {
    let project = require_project(query.project.as_deref())?;
    let file = require_file(query.file)?;
    let config = backup_config(&state);

    let (name, data) = run_blocking(move || create_engine_from_config(&config, &project)?.read_raw(&file)).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{name}\""))
        .map_err(|e| AppError::Internal(format!("Invalid file name header: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/gzip")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}
