/*!
Batch operations between a document store and backup contents.

Both directions run sequentially, one collection and one document at a time.
A failing collection or document is recorded and the batch moves on; the
caller gets a report and decides whether a partial result is acceptable
(see [`BatchOutcome::ensure_complete`]).
*/

use crate::alert::Notifier;
use crate::codec::{CanonicalBackup, Document, ProjectRef};
use crate::compression::CompressionAdapter;
use crate::config::BackupConfig;
use crate::engine::{BackupEngine, CreatedBackup};
use crate::storage::StorageAdapter;
use crate::store::{DocumentStore, ID_FIELD};
use crate::{BcupError, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// One collection or document that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// `collection` or `collection/id`
    pub target: String,
    pub error: String,
}

impl FailedItem {
    fn new(target: String, error: &BcupError) -> Self {
        Self {
            target,
            error: error.to_string(),
        }
    }
}

/// Common view of batch results
pub trait BatchOutcome {
    fn succeeded(&self) -> usize;
    fn failures(&self) -> &[FailedItem];

    /// `Err(PartialFailure)` when anything failed
    fn ensure_complete(&self) -> Result<()> {
        let failures = self.failures();
        if failures.is_empty() {
            return Ok(());
        }
        Err(BcupError::PartialFailure {
            succeeded: self.succeeded(),
            failed: failures.iter().map(|f| f.target.clone()).collect(),
        })
    }
}

/// Result of writing backup contents into a document store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub restored: usize,
    pub failed: usize,
    /// Documents without a usable `id`
    pub skipped: usize,
    pub failures: Vec<FailedItem>,
}

impl BatchOutcome for RestoreReport {
    fn succeeded(&self) -> usize {
        self.restored
    }

    fn failures(&self) -> &[FailedItem] {
        &self.failures
    }
}

/// Result of reading collections from a document store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub collections: usize,
    pub documents: usize,
    pub failures: Vec<FailedItem>,
}

impl BatchOutcome for BackupReport {
    fn succeeded(&self) -> usize {
        self.collections
    }

    fn failures(&self) -> &[FailedItem] {
        &self.failures
    }
}

/// Write every document of `backup` to `store`.
///
/// With a non-empty `only`, just those collections are restored; naming a
/// collection the backup does not hold is `MissingInput`. Documents are
/// written under their `id`, which is removed from the stored fields.
/// Documents without a string `id` are skipped.
pub async fn restore_collections<D>(store: &D, backup: &CanonicalBackup, only: &[String]) -> Result<RestoreReport>
where
    D: DocumentStore + ?Sized,
{
    if let Some(unknown) = only.iter().find(|name| !backup.collections.contains_key(name.as_str())) {
        return Err(BcupError::missing_input(format!("Collection {unknown} is not in the backup")));
    }

    let mut report = RestoreReport::default();

    for (collection, documents) in &backup.collections {
        if !only.is_empty() && !only.contains(collection) {
            continue;
        }
        let Value::Array(documents) = documents else {
            warn!(collection = %collection, "Collection is not a document list, skipping");
            continue;
        };

        info!(collection = %collection, documents = documents.len(), "Restoring collection");
        for document in documents {
            let Some((id, fields)) = split_id(document) else {
                report.skipped += 1;
                continue;
            };

            match store.write_document(collection, id, &fields).await {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    warn!(collection = %collection, id, error = %e, "Document restore failed");
                    report.failed += 1;
                    report.failures.push(FailedItem::new(format!("{collection}/{id}"), &e));
                }
            }
        }
    }

    #[cfg(feature = "metrics")]
    if let Some(metrics) = crate::observability::BcupMetrics::global() {
        metrics.record_restore(report.restored, report.failed);
    }

    info!(
        restored = report.restored,
        failed = report.failed,
        skipped = report.skipped,
        "Restore finished"
    );
    Ok(report)
}

fn split_id(document: &Value) -> Option<(&str, Document)> {
    let object = document.as_object()?;
    let id = object.get(ID_FIELD)?.as_str().filter(|id| !id.is_empty())?;
    let fields = object
        .iter()
        .filter(|(name, _)| name.as_str() != ID_FIELD)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    Some((id, fields))
}

/// Read collections from `store` into backup contents.
///
/// An empty `names` means every collection the store reports. Collections
/// that cannot be read are listed in the report and left out of the backup.
pub async fn snapshot_collections<D>(store: &D, names: &[String]) -> Result<(CanonicalBackup, BackupReport)>
where
    D: DocumentStore + ?Sized,
{
    let names = if names.is_empty() {
        store.list_collection_names().await?
    } else {
        names.to_vec()
    };

    let mut backup = CanonicalBackup::new();
    let mut report = BackupReport::default();

    for name in names {
        match store.list_documents(&name).await {
            Ok(documents) => {
                debug!(collection = %name, documents = documents.len(), "Collection fetched");
                report.collections += 1;
                report.documents += documents.len();
                backup = backup.with_collection(name, documents.into_iter().map(Value::Object).collect());
            }
            Err(e) => {
                warn!(collection = %name, error = %e, "Collection fetch failed");
                report.failures.push(FailedItem::new(name, &e));
            }
        }
    }

    Ok((backup, report))
}

/// Parameters of an unattended backup run
#[derive(Debug, Clone, Default)]
pub struct BackupJob {
    /// Collections to back up; empty means all
    pub collections: Vec<String>,
    /// Backups kept after the run; 0 keeps everything
    pub keep: usize,
    pub project: Option<ProjectRef>,
}

impl BackupJob {
    /// A job over all collections that keeps `config.retention` backups
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            keep: config.retention,
            ..Self::default()
        }
    }

    pub fn with_collections(mut self, collections: Vec<String>) -> Self {
        self.collections = collections;
        self
    }

    pub fn with_project(mut self, project: ProjectRef) -> Self {
        self.project = Some(project);
        self
    }
}

/// What an unattended backup run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub created: CreatedBackup,
    pub report: BackupReport,
    /// Backups removed by retention
    pub expired: Vec<String>,
}

/// Fetch, write, and prune in one go, alerting through `notifier` on failure.
///
/// Partial fetch failures still produce a backup of what could be read and
/// raise an alert. The run fails when nothing could be backed up or the file
/// could not be written. Retention failures are alerted but do not fail the
/// run.
pub async fn run_scheduled_backup<D, S, C, N>(
    store: &D,
    engine: &BackupEngine<S, C>,
    job: &BackupJob,
    notifier: &N,
) -> Result<JobReport>
where
    D: DocumentStore + ?Sized,
    S: StorageAdapter,
    C: CompressionAdapter,
    N: Notifier + ?Sized,
{
    let (mut backup, report) = match snapshot_collections(store, &job.collections).await {
        Ok(fetched) => fetched,
        Err(e) => {
            notifier.notify_failure("Backup failed", &format!("Listing collections failed: {e}"));
            return Err(e);
        }
    };

    if backup.is_empty() {
        let e = if report.failures.is_empty() {
            BcupError::missing_input("No collections to back up")
        } else {
            BcupError::PartialFailure {
                succeeded: 0,
                failed: report.failures.iter().map(|f| f.target.clone()).collect(),
            }
        };
        notifier.notify_failure("Backup failed", &e.to_string());
        return Err(e);
    }

    backup.project = job.project.clone();
    let created = match engine.create_backup(&backup) {
        Ok(created) => created,
        Err(e) => {
            notifier.notify_failure("Backup failed", &format!("Writing backup failed: {e}"));
            return Err(e);
        }
    };

    if let Err(e) = report.ensure_complete() {
        notifier.notify_failure(
            "Backup incomplete",
            &format!("{} written without some collections: {e}", created.file),
        );
    }

    let expired = match engine.apply_retention(job.keep) {
        Ok(expired) => expired,
        Err(e) => {
            warn!(error = %e, "Retention failed");
            notifier.notify_failure("Backup retention failed", &e.to_string());
            Vec::new()
        }
    };

    Ok(JobReport {
        created,
        report,
        expired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::MockNotifier;
    use crate::compression::GzipCompressor;
    use crate::storage::MemoryStorage;
    use crate::store::{MemoryDocumentStore, MockDocumentStore};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn engine() -> BackupEngine<MemoryStorage, GzipCompressor> {
        BackupEngine::new(MemoryStorage::new(), GzipCompressor::fast())
    }

    #[tokio::test]
    async fn test_restore_skips_documents_without_id() {
        let store = MemoryDocumentStore::new();
        let backup = CanonicalBackup::new().with_collection(
            "parts",
            vec![
                json!({"id": "1", "name": "bolt"}),
                json!({"name": "orphan"}),
                json!({"id": "2", "name": "nut"}),
            ],
        );

        let report = restore_collections(&store, &backup, &[]).await.unwrap();
        assert_eq!(report.restored, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert!(report.ensure_complete().is_ok());

        assert_eq!(
            store.documents("parts"),
            vec![
                doc(json!({"id": "1", "name": "bolt"})),
                doc(json!({"id": "2", "name": "nut"}))
            ]
        );
    }

    #[tokio::test]
    async fn test_restore_continues_after_write_failure() {
        let store = MemoryDocumentStore::new().fail_on("parts/2");
        let backup = CanonicalBackup::new()
            .with_collection("parts", vec![json!({"id": "1"}), json!({"id": "2"}), json!({"id": "3"})])
            .with_collection("orders", vec![json!({"id": "a"})]);

        let report = restore_collections(&store, &backup, &[]).await.unwrap();
        assert_eq!(report.restored, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].target, "parts/2");

        match report.ensure_complete() {
            Err(BcupError::PartialFailure { succeeded, failed }) => {
                assert_eq!(succeeded, 3);
                assert_eq!(failed, vec!["parts/2"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_restore_selected_collections_only() {
        let store = MemoryDocumentStore::new();
        let backup = CanonicalBackup::new()
            .with_collection("parts", vec![json!({"id": "1"})])
            .with_collection("orders", vec![json!({"id": "a"})]);

        let report = restore_collections(&store, &backup, &["orders".to_string()])
            .await
            .unwrap();
        assert_eq!(report.restored, 1);
        assert!(store.documents("parts").is_empty());

        assert!(matches!(
            restore_collections(&store, &backup, &["users".to_string()]).await,
            Err(BcupError::MissingInput(_))
        ));
    }

    #[tokio::test]
    async fn test_restore_strips_id_from_written_fields() {
        let mut store = MockDocumentStore::new();
        store
            .expect_write_document()
            .withf(|collection, id, fields| {
                collection.to_string() == "parts" && id.to_string() == "7" && !fields.contains_key("id")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let backup = CanonicalBackup::new()
            .with_collection("parts", vec![json!({"id": "7", "qty": 1}), json!("not a document")]);
        let report = restore_collections(&store, &backup, &[]).await.unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_restore_skips_non_array_collections() {
        let store = MemoryDocumentStore::new();
        let mut backup = CanonicalBackup::new().with_collection("parts", vec![json!({"id": "1"})]);
        backup.collections.insert("settings".to_string(), json!({"theme": "dark"}));

        let report = restore_collections(&store, &backup, &[]).await.unwrap();
        assert_eq!(report.restored, 1);
        assert!(store.documents("settings").is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_all_collections_with_failure() {
        let store = MemoryDocumentStore::new()
            .with_collection("parts", vec![doc(json!({"id": "1"})), doc(json!({"id": "2"}))])
            .with_collection("orders", vec![doc(json!({"id": "a"}))])
            .fail_on("orders");

        let (backup, report) = snapshot_collections(&store, &[]).await.unwrap();
        assert_eq!(backup.collection_names(), vec!["parts"]);
        assert_eq!(report.collections, 1);
        assert_eq!(report.documents, 2);
        assert_eq!(report.failures[0].target, "orders");
    }

    #[tokio::test]
    async fn test_scheduled_backup_writes_and_prunes() {
        let store = MemoryDocumentStore::new().with_collection("parts", vec![doc(json!({"id": "1"}))]);
        let engine = engine();
        for day in 1..=3 {
            engine.storage().insert_at(
                &format!("backup_2020-01-0{day}_00-00-00.json.gz"),
                b"old",
                chrono::DateTime::from_timestamp(1_577_836_800 + day * 86_400, 0).unwrap(),
            );
        }

        let mut notifier = MockNotifier::new();
        notifier.expect_notify_failure().never();

        let job = BackupJob {
            collections: vec![],
            keep: 2,
            project: Some(ProjectRef(json!({"name": "Shop"}))),
        };
        let outcome = run_scheduled_backup(&store, &engine, &job, &notifier).await.unwrap();

        assert_eq!(outcome.created.documents, 1);
        assert_eq!(
            outcome.expired,
            vec!["backup_2020-01-01_00-00-00.json.gz", "backup_2020-01-02_00-00-00.json.gz"]
        );
        let loaded = engine.load_backup(&outcome.created.file).unwrap();
        assert_eq!(loaded.backup.project, job.project);
    }

    #[tokio::test]
    async fn test_scheduled_backup_alerts_on_partial_failure() {
        let store = MemoryDocumentStore::new()
            .with_collection("parts", vec![doc(json!({"id": "1"}))])
            .with_collection("orders", vec![])
            .fail_on("orders");
        let engine = engine();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify_failure()
            .withf(|subject, _| subject.to_string() == "Backup incomplete")
            .times(1)
            .return_const(());

        let job = BackupJob {
            keep: 30,
            ..BackupJob::default()
        };
        let outcome = run_scheduled_backup(&store, &engine, &job, &notifier).await.unwrap();
        assert_eq!(outcome.created.collections, vec!["parts"]);
        assert_eq!(outcome.report.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_scheduled_backup_follows_configured_retention() {
        let store = MemoryDocumentStore::new().with_collection("parts", vec![doc(json!({"id": "1"}))]);
        let engine = engine();
        for day in 1..=3 {
            engine.storage().insert_at(
                &format!("backup_2020-01-0{day}_00-00-00.json.gz"),
                b"old",
                chrono::DateTime::from_timestamp(1_577_836_800 + day * 86_400, 0).unwrap(),
            );
        }

        let mut notifier = MockNotifier::new();
        notifier.expect_notify_failure().never();

        let mut config = BackupConfig::new("/unused");
        config.retention = 0;
        let job = BackupJob::from_config(&config).with_collections(vec!["parts".to_string()]);
        assert_eq!(job.keep, 0);

        let outcome = run_scheduled_backup(&store, &engine, &job, &notifier).await.unwrap();
        assert!(outcome.expired.is_empty());
        assert_eq!(engine.list_backups().unwrap().len(), 4);

        config.retention = 2;
        let job = BackupJob::from_config(&config);
        assert_eq!(job.keep, 2);
        assert!(job.collections.is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_backup_fails_when_nothing_fetched() {
        let store = MemoryDocumentStore::new()
            .with_collection("parts", vec![])
            .fail_on("parts");
        let engine = engine();

        let mut notifier = MockNotifier::new();
        notifier.expect_notify_failure().times(1).return_const(());

        let job = BackupJob {
            keep: 30,
            ..BackupJob::default()
        };
        let result = run_scheduled_backup(&store, &engine, &job, &notifier).await;
        assert!(matches!(result, Err(BcupError::PartialFailure { succeeded: 0, .. })));
        assert!(engine.list_backups().unwrap().is_empty());
    }
}
