/*!
Backup file codec.

Backups have been written in three shapes over time:

- legacy: a bare JSON array of documents, the collection named by the file name
  prefix (`parts_2024-01-01_00-00-00.json.gz` holds `parts`);
- single-collection: `{ "collection", "documents", "project"?, "createdAt"? }`;
- unified: `{ "collections": { name: [documents] }, "project"?, "createdAt"? }`.

Every shape decodes into one [`CanonicalBackup`]. Only the unified shape is
ever written.
*/

use crate::{BcupError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document: field name to value, carrying its identifier under `id`.
pub type Document = Map<String, Value>;

/// Suffix of every backup file.
pub const BACKUP_SUFFIX: &str = ".json.gz";

/// Source project metadata stored alongside a backup.
///
/// Passed through untouched; the shape (`{ name, firebaseConfig }`) is never
/// validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectRef(pub Value);

impl ProjectRef {
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// `firebaseConfig.projectId`, when present
    pub fn project_id(&self) -> Option<&str> {
        self.0
            .get("firebaseConfig")
            .and_then(|config| config.get("projectId"))
            .and_then(Value::as_str)
    }
}

/// Format-independent backup contents.
///
/// Collection values are normally arrays of documents. Anything else found in
/// a unified backup is kept verbatim so it survives re-encoding, but holds no
/// documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBackup {
    pub collections: Map<String, Value>,
    #[serde(default)]
    pub project: Option<ProjectRef>,
}

impl CanonicalBackup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a collection
    pub fn with_collection<S: Into<String>>(mut self, name: S, documents: Vec<Value>) -> Self {
        self.collections.insert(name.into(), Value::Array(documents));
        self
    }

    pub fn with_project(mut self, project: ProjectRef) -> Self {
        self.project = Some(project);
        self
    }

    /// Documents of a collection; empty when absent or not an array
    pub fn documents(&self, collection: &str) -> &[Value] {
        self.collections
            .get(collection)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of documents across all collections
    pub fn document_count(&self) -> usize {
        self.collections
            .values()
            .filter_map(Value::as_array)
            .map(Vec::len)
            .sum()
    }

    /// Collection names in insertion order
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Which on-disk shape a backup was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatKind {
    Legacy,
    SingleCollection,
    Unified,
}

/// A parsed backup in the shape it was stored in.
#[derive(Debug, Clone, PartialEq)]
pub enum BackupFormat {
    Unified {
        collections: Map<String, Value>,
        project: Option<ProjectRef>,
        created_at: Option<String>,
    },
    SingleCollection {
        collection: String,
        documents: Vec<Value>,
        project: Option<ProjectRef>,
        created_at: Option<String>,
    },
    Legacy {
        collection: String,
        documents: Vec<Value>,
    },
}

impl BackupFormat {
    /// Classify parsed JSON. First match wins:
    ///
    /// 1. object whose `collections` is an object: unified;
    /// 2. object whose `documents` is an array: single-collection;
    /// 3. a top-level array: legacy;
    /// 4. anything else is invalid.
    pub fn detect(value: Value, file_name: &str) -> Result<Self> {
        match value {
            Value::Object(mut object) => {
                if let Some(Value::Object(collections)) = object.remove("collections") {
                    return Ok(BackupFormat::Unified {
                        collections,
                        project: take_project(&mut object),
                        created_at: take_created_at(&mut object),
                    });
                }

                if let Some(Value::Array(documents)) = object.remove("documents") {
                    let collection = match object.get("collection").and_then(Value::as_str) {
                        Some(name) => name.to_string(),
                        None => collection_from_file_name(file_name),
                    };
                    return Ok(BackupFormat::SingleCollection {
                        collection,
                        documents,
                        project: take_project(&mut object),
                        created_at: take_created_at(&mut object),
                    });
                }

                Err(BcupError::invalid_backup(
                    "object has neither a 'collections' map nor a 'documents' array",
                ))
            }
            Value::Array(documents) => Ok(BackupFormat::Legacy {
                collection: collection_from_file_name(file_name),
                documents,
            }),
            other => Err(BcupError::invalid_backup(format!(
                "expected a JSON object or array, found {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn kind(&self) -> FormatKind {
        match self {
            BackupFormat::Unified { .. } => FormatKind::Unified,
            BackupFormat::SingleCollection { .. } => FormatKind::SingleCollection,
            BackupFormat::Legacy { .. } => FormatKind::Legacy,
        }
    }

    pub fn into_decoded(self) -> DecodedBackup {
        let format = self.kind();
        match self {
            BackupFormat::Unified {
                collections,
                project,
                created_at,
            } => DecodedBackup {
                format,
                created_at,
                backup: CanonicalBackup {
                    collections,
                    project,
                },
            },
            BackupFormat::SingleCollection {
                collection,
                documents,
                project,
                created_at,
            } => DecodedBackup {
                format,
                created_at,
                backup: CanonicalBackup {
                    collections: single_collection(collection, documents),
                    project,
                },
            },
            BackupFormat::Legacy {
                collection,
                documents,
            } => DecodedBackup {
                format,
                created_at: None,
                backup: CanonicalBackup {
                    collections: single_collection(collection, documents),
                    project: None,
                },
            },
        }
    }
}

/// Result of decoding a backup file
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBackup {
    pub format: FormatKind,
    pub created_at: Option<String>,
    pub backup: CanonicalBackup,
}

/// Decode decompressed backup bytes.
///
/// `file_name` supplies the collection name for shapes that do not carry one.
pub fn decode(bytes: &[u8], file_name: &str) -> Result<DecodedBackup> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| BcupError::invalid_backup(format!("{file_name}: {e}")))?;
    Ok(BackupFormat::detect(value, file_name)?.into_decoded())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnifiedBackup<'a> {
    collections: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a ProjectRef>,
    created_at: String,
}

/// Encode a backup in the unified shape (uncompressed JSON).
pub fn encode(backup: &CanonicalBackup, created_at: DateTime<Utc>) -> Result<Vec<u8>> {
    let unified = UnifiedBackup {
        collections: &backup.collections,
        project: backup.project.as_ref(),
        created_at: created_at.to_rfc3339_opts(SecondsFormat::Secs, false),
    };
    Ok(serde_json::to_vec_pretty(&unified)?)
}

/// Collection name implied by a backup file name: the text before the first `_`.
///
/// `order_items_2024-01-01_00-00-00.json.gz` yields `order`; collections whose
/// names contain `_` cannot be recovered from legacy file names.
pub fn collection_from_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let base = base.strip_suffix(BACKUP_SUFFIX).unwrap_or(base);
    base.split('_').next().unwrap_or(base).to_string()
}

fn single_collection(name: String, documents: Vec<Value>) -> Map<String, Value> {
    let mut collections = Map::new();
    collections.insert(name, Value::Array(documents));
    collections
}

fn take_project(object: &mut Map<String, Value>) -> Option<ProjectRef> {
    match object.remove("project") {
        None | Some(Value::Null) => None,
        Some(project) => Some(ProjectRef(project)),
    }
}

fn take_created_at(object: &mut Map<String, Value>) -> Option<String> {
    match object.remove("createdAt") {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
