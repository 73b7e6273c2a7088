/*!
 * Repository layer for snapshot rows.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{OptionalExtension, params};

use super::connection::DatabaseConnection;
use super::models::{RunStatus, SnapshotRecord};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    /// Insert or overwrite the snapshot for a document/target pair
    pub async fn upsert_snapshot(&self, record: &SnapshotRecord) -> Result<()> {
        let record = record.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO snapshots (
                        document_id, target_language, run_id, status, records_json,
                        completion_flags_json, missing_rows_json, exhausted_rows_json, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                    params![
                        record.document_id,
                        record.target_language,
                        record.run_id,
                        record.status.to_string(),
                        record.records_json,
                        record.completion_flags_json,
                        record.missing_rows_json,
                        record.exhausted_rows_json,
                        record.updated_at,
                    ],
                )?;
                let short_id: String = record.document_id.chars().take(8).collect();
                debug!("Stored snapshot for {}/{}", short_id, record.target_language);
                Ok(())
            })
            .await
    }

    /// Load the snapshot for a document/target pair
    pub async fn get_snapshot(
        &self,
        document_id: &str,
        target_language: &str,
    ) -> Result<Option<SnapshotRecord>> {
        let document_id = document_id.to_string();
        let target_language = target_language.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        r#"
                        SELECT document_id, target_language, run_id, status, records_json,
                               completion_flags_json, missing_rows_json, exhausted_rows_json, updated_at
                        FROM snapshots WHERE document_id = ?1 AND target_language = ?2
                        "#,
                        params![document_id, target_language],
                        |row| {
                            Ok(SnapshotRecord {
                                document_id: row.get(0)?,
                                target_language: row.get(1)?,
                                run_id: row.get(2)?,
                                status: row
                                    .get::<_, String>(3)?
                                    .parse()
                                    .unwrap_or(RunStatus::InProgress),
                                records_json: row.get(4)?,
                                completion_flags_json: row.get(5)?,
                                missing_rows_json: row.get(6)?,
                                exhausted_rows_json: row.get(7)?,
                                updated_at: row.get(8)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// Delete the snapshot for a document/target pair, returning whether one existed
    pub async fn delete_snapshot(&self, document_id: &str, target_language: &str) -> Result<bool> {
        let document_id = document_id.to_string();
        let target_language = target_language.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM snapshots WHERE document_id = ?1 AND target_language = ?2",
                    params![document_id, target_language],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Target languages with a stored snapshot for a document
    pub async fn list_targets(&self, document_id: &str) -> Result<Vec<String>> {
        let document_id = document_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT target_language FROM snapshots WHERE document_id = ?1 ORDER BY target_language",
                )?;
                let targets = stmt
                    .query_map(params![document_id], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(targets)
            })
            .await
    }
}
