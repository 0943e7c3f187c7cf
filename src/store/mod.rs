//! Persistence Adapter
//!
//! [`DocumentStore`] is the interface the editor saves through. [`FileStore`]
//! keeps one JSON record per saved flowchart in a directory.
//!
//! Records hold the document payload as raw JSON and are validated when they
//! are loaded into an editor, the same way an imported file is.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::document::{Document, DocumentFile, ImportResult, ImportedDocument, Metadata};


pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Flowchart '{0}' not found")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Who can see a saved flowchart. Drafts are private.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    #[serde(rename = "private", alias = "draft")]
    Draft,
    #[serde(rename = "public")]
    Public,
}

impl Visibility {
    pub fn from_draft(is_draft: bool) -> Self {
        if is_draft {
            Visibility::Draft
        } else {
            Visibility::Public
        }
    }

    pub fn is_draft(self) -> bool {
        self == Visibility::Draft
    }

    pub fn noun(self) -> &'static str {
        match self {
            Visibility::Draft => "draft",
            Visibility::Public => "project",
        }
    }
}

/// A saved flowchart as the store keeps it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(rename = "sharing_permission")]
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Document payload, validated on load
    #[serde(rename = "flowchart_data")]
    pub data: Value,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl StoredDocument {
    /// Metadata to use when the payload carries none of its own
    pub fn fallback_metadata(&self) -> Metadata {
        Metadata {
            title: self.title.clone(),
            description: self.description.clone(),
            version: 1,
            last_modified: self.updated_at,
            is_draft: self.visibility.is_draft(),
            ..Metadata::default()
        }
    }

    /// Validate the payload as if it had been imported
    pub fn import(&self) -> ImportResult<ImportedDocument> {
        let file = DocumentFile::deserialize(&self.data)?;
        file.validate()
    }

    /// The payload as a complete document
    pub fn document(&self) -> ImportResult<Document> {
        Ok(self.import()?.into_document(&self.fallback_metadata()))
    }
}

/// Selection criteria for [`DocumentStore::load`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub visibility: Option<Visibility>,
    /// Case-insensitive substring of the title
    pub title_contains: Option<String>,
    pub limit: Option<usize>,
}

impl DocumentFilter {
    pub fn recent(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &StoredDocument) -> bool {
        if self.visibility.is_some_and(|v| v != record.visibility) {
            return false;
        }
        match &self.title_contains {
            Some(needle) => record
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

/// Partial update for [`DocumentStore::update`]
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub document: Option<Document>,
}

/// The persistence collaborator
pub trait DocumentStore {
    /// Store `document` as a new record
    fn save(&self, document: &Document, visibility: Visibility) -> StoreResult<StoredDocument>;
    /// Matching records, newest first
    fn load(&self, filter: &DocumentFilter) -> StoreResult<Vec<StoredDocument>>;
    fn get(&self, id: &str) -> StoreResult<StoredDocument>;
    fn update(&self, id: &str, patch: DocumentPatch) -> StoreResult<StoredDocument>;
    fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Payload written for a save: metadata stamped with the visibility and time
fn payload(document: &Document, visibility: Visibility, now: DateTime<Utc>) -> StoreResult<Value> {
    let mut document = document.clone();
    document.metadata.is_draft = visibility.is_draft();
    document.metadata.last_modified = now;
    Ok(serde_json::to_value(&document)?)
}

// ============================================================================
// FILE STORE
// ============================================================================

/// One `<id>.json` file per record
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        debug!("file store at {:?}", dir);
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> StoreResult<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write_record(&self, record: &StoredDocument) -> StoreResult<()> {
        let path = self.record_path(&record.id)?;
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&tmp, json).map_err(Self::io_error(&tmp))?;
        std::fs::rename(&tmp, &path).map_err(Self::io_error(&path))?;
        Ok(())
    }

    fn read_record(path: &Path) -> StoreResult<StoredDocument> {
        let text = std::fs::read_to_string(path).map_err(Self::io_error(path))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl DocumentStore for FileStore {
    fn save(&self, document: &Document, visibility: Visibility) -> StoreResult<StoredDocument> {
        let now = Utc::now();
        let record = StoredDocument {
            id: Uuid::new_v4().to_string(),
            title: document.metadata.title.clone(),
            description: document.metadata.description.clone(),
            category: default_category(),
            visibility,
            created_at: now,
            updated_at: now,
            data: payload(document, visibility, now)?,
        };
        self.write_record(&record)?;
        info!("saved '{}' as {} ({})", record.title, visibility.noun(), record.id);
        Ok(record)
    }

    fn load(&self, filter: &DocumentFilter) -> StoreResult<Vec<StoredDocument>> {
        let entries = std::fs::read_dir(&self.dir).map_err(Self::io_error(&self.dir))?;

        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(Self::io_error(&self.dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path) {
                Ok(record) if filter.matches(&record) => records.push(record),
                Ok(_) => {}
                Err(e) => warn!("skipping {:?}: {e}", path),
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn get(&self, id: &str) -> StoreResult<StoredDocument> {
        let path = self.record_path(id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Self::read_record(&path)
    }

    fn update(&self, id: &str, patch: DocumentPatch) -> StoreResult<StoredDocument> {
        let mut record = self.get(id)?;
        let now = Utc::now();

        if let Some(title) = patch.title {
            record.title = title;
        }
        if let Some(description) = patch.description {
            record.description = description;
        }
        if let Some(visibility) = patch.visibility {
            record.visibility = visibility;
        }
        if let Some(document) = patch.document {
            record.data = payload(&document, record.visibility, now)?;
        } else if let Some(meta) = record.data.get_mut("metadata").and_then(Value::as_object_mut) {
            meta.insert("isDraft".into(), Value::Bool(record.visibility.is_draft()));
        }
        record.updated_at = now;

        self.write_record(&record)?;
        debug!("updated record {id}");
        Ok(record)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let path = self.record_path(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("deleted record {id}");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}
