/*!
# bcup core

Backup and restore of Firestore-style document databases.

- [`codec`] reads every historical backup file shape into one canonical form
  and writes only the unified shape
- [`wire`] translates between the REST API's typed values and plain JSON
- [`engine`] manages compressed backup files through pluggable storage and
  compression adapters
- [`store`] and [`batch`] move documents between the database and backups

## Architecture

Storage, compression and the database are ports ([`StorageAdapter`],
[`CompressionAdapter`], [`DocumentStore`]); the engine and batch drivers only
depend on those traits.

## Usage

```rust
use bcup_core::{create_default_engine, CanonicalBackup};
use serde_json::json;

let dir = tempfile::tempdir().unwrap();
let engine = create_default_engine(dir.path());

let backup = CanonicalBackup::new().with_collection("parts", vec![json!({"id": "p1", "qty": 4})]);
let created = engine.create_backup(&backup)?;

for summary in engine.list_backups()? {
    println!("{} holds {:?} documents", summary.file, summary.documents);
}

let decoded = engine.load_backup(&created.file)?;
assert_eq!(decoded.backup.document_count(), 1);
# Ok::<(), bcup_core::BcupError>(())
```
*/

pub mod alert;
pub mod batch;
pub mod codec;
pub mod compression;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod observability;
pub mod storage;
pub mod store;
pub mod wire;

pub use alert::{LogNotifier, Notifier};
pub use batch::{
    restore_collections, run_scheduled_backup, snapshot_collections, BackupJob, BackupReport,
    BatchOutcome, FailedItem, JobReport, RestoreReport,
};
pub use codec::{CanonicalBackup, DecodedBackup, Document, FormatKind, ProjectRef};
pub use compression::{CompressionAdapter, GzipCompressor};
pub use config::{sanitize_project_name, BackupConfig, CredentialSource, DatabaseConfig};
pub use engine::{create_default_engine, create_engine_from_config, BackupEngine, CreatedBackup};
pub use error::{BcupError, Result};
pub use metadata::BackupSummary;
pub use storage::{FileStat, LocalFileStorage, StorageAdapter};
pub use store::{DocumentStore, MemoryDocumentStore};
#[cfg(feature = "rest")]
pub use store::RestDocumentStore;
pub use wire::WireValue;
