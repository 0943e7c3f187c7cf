//! Documents and the JSON exchange format
//!
//! A document is a graph plus its metadata. On disk and over the wire it is
//! a single JSON object with the top-level keys `nodes`, `edges` and
//! `metadata`. Keys this crate does not know about are collected and written
//! back out, so files produced by other tools survive a load/save cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::graph::{Edge, Graph, Node};


pub const DEFAULT_TITLE: &str = "Untitled Flowchart";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid flowchart file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid flowchart: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("Could not read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ImportResult<T> = Result<T, ImportError>;

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_version() -> u32 {
    1
}

fn default_draft() -> bool {
    true
}

/// Descriptive fields stored alongside the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "Utc::now", alias = "last_modified")]
    pub last_modified: DateTime<Utc>,
    #[serde(default = "default_draft", alias = "is_draft")]
    pub is_draft: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: default_title(),
            description: String::new(),
            version: default_version(),
            last_modified: Utc::now(),
            is_draft: default_draft(),
            extra: Map::new(),
        }
    }
}

/// Exchange-file shape of a document.
///
/// `nodes` is mandatory, `edges` defaults to empty and `metadata` may be
/// absent (importers then keep whatever metadata they already had).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFile {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentFile {
    /// Check the graph's structural invariants and split off the metadata
    pub fn validate(self) -> ImportResult<ImportedDocument> {
        let graph = Graph {
            nodes: self.nodes,
            edges: self.edges,
        };
        graph.validate().map_err(ImportError::Invalid)?;
        Ok(ImportedDocument {
            graph,
            metadata: self.metadata,
            extra: self.extra,
        })
    }
}

/// A parsed and validated file that has not been applied to an editor yet
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedDocument {
    pub graph: Graph,
    pub metadata: Option<Metadata>,
    pub extra: Map<String, Value>,
}

impl ImportedDocument {
    pub fn into_document(self, fallback: &Metadata) -> Document {
        Document {
            graph: self.graph,
            metadata: self.metadata.unwrap_or_else(|| fallback.clone()),
            extra: self.extra,
        }
    }
}

/// Parse and validate exchange JSON without touching any live state
pub fn parse_import(json: &str) -> ImportResult<ImportedDocument> {
    let file: DocumentFile = serde_json::from_str(json)?;
    file.validate()
}

/// Read and validate an exchange file from disk
pub fn read_import(path: &Path) -> ImportResult<ImportedDocument> {
    let json = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_import(&json)
}

/// File name for an export: whitespace runs in the title become `_`
pub fn export_file_name(title: &str, extension: &str) -> String {
    let stem = title.split_whitespace().collect::<Vec<_>>().join("_");
    let stem = if stem.is_empty() { "flowchart" } else { stem.as_str() };
    format!("{stem}.{extension}")
}

/// The persisted unit: a graph with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DocumentFile", into = "DocumentFile")]
pub struct Document {
    pub graph: Graph,
    pub metadata: Metadata,
    pub extra: Map<String, Value>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A fresh document holding the single default start node
    pub fn new() -> Self {
        Self {
            graph: Graph::starter(),
            metadata: Metadata::default(),
            extra: Map::new(),
        }
    }

    pub fn with_graph(graph: Graph, metadata: Metadata) -> Self {
        Self {
            graph,
            metadata,
            extra: Map::new(),
        }
    }

    /// Refresh `last_modified`
    pub fn touch(&mut self) {
        self.metadata.last_modified = Utc::now();
    }

    /// Pretty-printed exchange JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Strict parse: missing metadata falls back to defaults
    pub fn from_json(json: &str) -> ImportResult<Self> {
        Ok(parse_import(json)?.into_document(&Metadata::default()))
    }

    pub fn file_name(&self, extension: &str) -> String {
        export_file_name(&self.metadata.title, extension)
    }
}

impl TryFrom<DocumentFile> for Document {
    type Error = ImportError;

    fn try_from(file: DocumentFile) -> ImportResult<Self> {
        Ok(file.validate()?.into_document(&Metadata::default()))
    }
}

impl From<Document> for DocumentFile {
    fn from(doc: Document) -> Self {
        Self {
            nodes: doc.graph.nodes,
            edges: doc.graph.edges,
            metadata: Some(doc.metadata),
            extra: doc.extra,
        }
    }
}
