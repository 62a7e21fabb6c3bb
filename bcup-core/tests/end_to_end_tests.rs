/*!
End-to-end tests: documents travel from a database into a backup file on disk
and back into a fresh database.
*/

use bcup_core::{
    create_engine_from_config, restore_collections, run_scheduled_backup, snapshot_collections,
    wire, BackupConfig, BackupJob, BatchOutcome, CompressionAdapter, Document, FormatKind,
    GzipCompressor, LogNotifier, MemoryDocumentStore, ProjectRef,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn shop() -> MemoryDocumentStore {
    MemoryDocumentStore::new()
        .with_collection(
            "parts",
            vec![
                doc(json!({"id": "p1", "name": "bolt", "qty": 120, "dims": {"w": 4, "h": 12}})),
                doc(json!({"id": "p2", "name": "nut", "qty": 0, "tags": ["m4", "steel"]})),
            ],
        )
        .with_collection(
            "orders",
            vec![doc(json!({"id": "o1", "parts": ["p1"], "paid": true, "total": 12.5}))],
        )
}

#[tokio::test]
async fn test_backup_then_restore_into_empty_database() {
    let temp_dir = TempDir::new().unwrap();
    let config = BackupConfig::new(temp_dir.path());
    let engine = create_engine_from_config(&config, "shop-1").unwrap();

    let source = shop();
    let (backup, report) = snapshot_collections(&source, &[]).await.unwrap();
    assert!(report.ensure_complete().is_ok());
    assert_eq!(report.documents, 3);

    let created = engine
        .create_backup(&backup.with_project(ProjectRef(json!({"name": "Shop"}))))
        .unwrap();
    assert!(temp_dir.path().join("shop-1").join(&created.file).is_file());

    let listed = engine.list_backups().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].collections, vec!["parts", "orders"]);
    assert_eq!(listed[0].documents, Some(3));

    let decoded = engine.load_backup(&created.file).unwrap();
    assert_eq!(decoded.format, FormatKind::Unified);

    let target = MemoryDocumentStore::new();
    let restored = restore_collections(&target, &decoded.backup, &[]).await.unwrap();
    assert_eq!(restored.restored, 3);
    assert!(restored.ensure_complete().is_ok());

    assert_eq!(target.documents("parts"), source.documents("parts"));
    assert_eq!(target.documents("orders"), source.documents("orders"));
}

#[tokio::test]
async fn test_legacy_file_restores_into_named_collection() {
    let temp_dir = TempDir::new().unwrap();
    let config = BackupConfig::new(temp_dir.path());
    let engine = create_engine_from_config(&config, "shop-1").unwrap();

    let legacy = json!([{"id": "u1", "email": "a@example.com"}, {"email": "no-id@example.com"}]);
    let compressed = GzipCompressor::new()
        .compress(&serde_json::to_vec(&legacy).unwrap())
        .unwrap();
    std::fs::create_dir_all(temp_dir.path().join("shop-1")).unwrap();
    std::fs::write(
        temp_dir.path().join("shop-1/users_2023-05-01_10-00-00.json.gz"),
        compressed,
    )
    .unwrap();

    let decoded = engine.load_backup("users_2023-05-01_10-00-00.json.gz").unwrap();
    assert_eq!(decoded.format, FormatKind::Legacy);

    let target = MemoryDocumentStore::new();
    let report = restore_collections(&target, &decoded.backup, &[]).await.unwrap();
    assert_eq!(report.restored, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        target.documents("users"),
        vec![doc(json!({"id": "u1", "email": "a@example.com"}))]
    );
}

#[tokio::test]
async fn test_scheduled_backups_keep_newest() {
    let temp_dir = TempDir::new().unwrap();
    let config = BackupConfig::new(temp_dir.path());
    let engine = create_engine_from_config(&config, "shop-1").unwrap();

    let job = BackupJob {
        collections: vec!["parts".to_string()],
        keep: 1,
        project: None,
    };

    let first = run_scheduled_backup(&shop(), &engine, &job, &LogNotifier)
        .await
        .unwrap();
    assert!(first.expired.is_empty());

    // second run lands in a later second so it gets its own file
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = run_scheduled_backup(&shop(), &engine, &job, &LogNotifier)
        .await
        .unwrap();

    assert_eq!(second.expired, vec![first.created.file.clone()]);
    let listed = engine.list_backups().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].file, second.created.file);
}

#[test]
fn test_documents_survive_wire_translation() {
    let source = shop();
    for document in source.documents("parts") {
        let wire_fields = wire::encode_fields(&document);
        let back = wire::decode_fields(&wire_fields);
        assert_eq!(back, document);
    }
}
