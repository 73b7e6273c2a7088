/*!
 * Snapshot models and their conversion to database rows.
 */

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::{RunStatus, SnapshotRecord};
use crate::records::Record;

/// Address of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    /// Caller-supplied document identity
    pub document_id: String,
    /// Target language code
    pub target_language: String,
}

impl SnapshotKey {
    pub fn new(document_id: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            target_language: target_language.into(),
        }
    }

    /// First eight characters of the document identity, for logs
    pub fn short_id(&self) -> String {
        self.document_id.chars().take(8).collect()
    }
}

impl std::fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.short_id(), self.target_language)
    }
}

/// Translation progress for one document and target language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationSnapshot {
    /// Target language code
    pub target_language: String,
    /// Working copy of the records
    pub records: Vec<Record>,
    /// Per-row completion
    pub completion_flags: Vec<bool>,
    /// Rows pending another pass
    pub missing_rows: BTreeSet<usize>,
    /// Rows an operator gave up on
    pub exhausted_rows: BTreeSet<usize>,
    /// Run that last wrote this snapshot
    pub run_id: String,
    /// Status of that run
    pub status: RunStatus,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl TranslationSnapshot {
    /// Number of rows marked complete
    pub fn completed_rows(&self) -> usize {
        self.completion_flags.iter().filter(|done| **done).count()
    }

    /// True when every row is complete
    pub fn is_complete(&self) -> bool {
        self.completion_flags.iter().all(|done| *done)
    }

    /// Convert into a database row
    pub fn to_record(&self, key: &SnapshotKey) -> Result<SnapshotRecord> {
        Ok(SnapshotRecord {
            document_id: key.document_id.clone(),
            target_language: key.target_language.clone(),
            run_id: self.run_id.clone(),
            status: self.status,
            records_json: serde_json::to_string(&self.records).context("Failed to serialize snapshot records")?,
            completion_flags_json: serde_json::to_string(&self.completion_flags)?,
            missing_rows_json: serde_json::to_string(&self.missing_rows)?,
            exhausted_rows_json: serde_json::to_string(&self.exhausted_rows)?,
            updated_at: self.updated_at.to_rfc3339(),
        })
    }

    /// Rebuild from a database row
    pub fn from_record(record: &SnapshotRecord) -> Result<Self> {
        let updated_at = DateTime::parse_from_rfc3339(&record.updated_at)
            .map(|t| t.with_timezone(&Utc))
            .with_context(|| format!("Invalid snapshot timestamp: {}", record.updated_at))?;

        Ok(Self {
            target_language: record.target_language.clone(),
            records: serde_json::from_str(&record.records_json).context("Failed to parse snapshot records")?,
            completion_flags: serde_json::from_str(&record.completion_flags_json)
                .context("Failed to parse completion flags")?,
            missing_rows: serde_json::from_str(&record.missing_rows_json).context("Failed to parse missing rows")?,
            exhausted_rows: serde_json::from_str(&record.exhausted_rows_json)
                .context("Failed to parse exhausted rows")?,
            run_id: record.run_id.clone(),
            status: record.status,
            updated_at,
        })
    }
}
