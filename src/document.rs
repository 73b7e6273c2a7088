/*!
 * JSON document adapter.
 *
 * A document is either a bare array of row objects or an object carrying the
 * rows in a `records` array. Its identity is the SHA-256 of the file content,
 * so a snapshot only resumes against the exact file it was made from.
 * Translated values are written back into the original rows, leaving key order,
 * passthrough columns and any wrapper fields as they were.
 */

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::RecordError;
use crate::file_utils::FileManager;
use crate::records::{ColumnSchema, Record, RecordSet};
use crate::snapshot::SnapshotKey;

/// Field holding the rows when the root is an object
pub const RECORDS_FIELD: &str = "records";

/// A loaded JSON document
#[derive(Debug, Clone)]
pub struct TableDocument {
    /// Where the document was read from, if anywhere
    path: Option<PathBuf>,

    /// SHA-256 of the content
    id: String,

    /// Parsed root, kept for write-back
    root: Value,

    records: RecordSet,
}

impl TableDocument {
    /// Parse document content
    pub fn parse(content: &str, schema: &ColumnSchema) -> Result<Self> {
        let root: Value = serde_json::from_str(content).context("Document is not valid JSON")?;
        let rows = Self::rows_of(&root).ok_or(RecordError::InvalidDocument)?;
        let records = RecordSet::ingest(rows, schema)?;

        let id = format!("{:x}", Sha256::digest(content.as_bytes()));
        debug!("Parsed document {} with {} record(s)", &id[..8], records.len());

        Ok(Self {
            path: None,
            id,
            root,
            records,
        })
    }

    /// Load a document from disk
    pub fn load<P: AsRef<Path>>(path: P, schema: &ColumnSchema) -> Result<Self> {
        let path = path.as_ref();
        let content = FileManager::read_to_string(path)?;
        let mut document =
            Self::parse(&content, schema).with_context(|| format!("Failed to load document: {:?}", path))?;
        document.path = Some(path.to_path_buf());
        Ok(document)
    }

    fn rows_of(root: &Value) -> Option<&Vec<Value>> {
        match root {
            Value::Array(rows) => Some(rows),
            Value::Object(map) => map.get(RECORDS_FIELD).and_then(Value::as_array),
            _ => None,
        }
    }

    /// Content hash identifying this document
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Snapshot address for one target language
    pub fn snapshot_key(&self, target_language: &str) -> SnapshotKey {
        SnapshotKey::new(&self.id, target_language)
    }

    /// Render translated records into the document's original layout
    pub fn render(&self, translated: &[Record]) -> Result<String> {
        let mut root = self.root.clone();
        let rows = match &mut root {
            Value::Array(rows) => rows,
            Value::Object(map) => map
                .get_mut(RECORDS_FIELD)
                .and_then(Value::as_array_mut)
                .ok_or(RecordError::InvalidDocument)?,
            _ => return Err(RecordError::InvalidDocument.into()),
        };

        for (row, record) in rows.iter_mut().zip(translated) {
            if let Value::Object(object) = row {
                for (key, value) in record.fields() {
                    object.insert(key.clone(), value.to_json());
                }
            }
        }

        serde_json::to_string_pretty(&root).context("Failed to serialize document")
    }

    /// Write translated records to `output`
    pub fn save_translated<P: AsRef<Path>>(&self, translated: &[Record], output: P) -> Result<()> {
        let rendered = self.render(translated)?;
        FileManager::write_to_file(output.as_ref(), &rendered)?;
        debug!("Wrote {} record(s) to {:?}", translated.len(), output.as_ref());
        Ok(())
    }
}
