/*!
 * Database entity models.
 *
 * Columns holding structured data are stored as JSON text.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the last run that wrote a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// A run is writing batches
    #[default]
    InProgress,
    /// The run stopped at a batch boundary on request
    Paused,
    /// The run reached the end of the document
    Completed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::InProgress => write!(f, "in_progress"),
            RunStatus::Paused => write!(f, "paused"),
            RunStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(RunStatus::InProgress),
            "paused" => Ok(RunStatus::Paused),
            "completed" => Ok(RunStatus::Completed),
            _ => Err(anyhow::anyhow!("Invalid run status: {}", s)),
        }
    }
}

/// One row of the `snapshots` table
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    /// Document identity
    pub document_id: String,
    /// Target language code
    pub target_language: String,
    /// Run that last wrote the row
    pub run_id: String,
    /// Last run status
    pub status: RunStatus,
    /// Serialized records
    pub records_json: String,
    /// Serialized per-row completion flags
    pub completion_flags_json: String,
    /// Serialized missing row indexes
    pub missing_rows_json: String,
    /// Serialized exhausted row indexes
    pub exhausted_rows_json: String,
    /// RFC 3339 timestamp
    pub updated_at: String,
}
