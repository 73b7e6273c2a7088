/*!
 * Snapshot table layout.
 *
 * The schema version lives in SQLite's `user_version` pragma. A database
 * written by a newer build is refused rather than guessed at.
 */

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_SNAPSHOTS: &str = r#"
    CREATE TABLE IF NOT EXISTS snapshots (
        document_id TEXT NOT NULL,
        target_language TEXT NOT NULL,
        run_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'in_progress',
        records_json TEXT NOT NULL,
        completion_flags_json TEXT NOT NULL DEFAULT '[]',
        missing_rows_json TEXT NOT NULL DEFAULT '[]',
        exhausted_rows_json TEXT NOT NULL DEFAULT '[]',
        updated_at TEXT NOT NULL,
        PRIMARY KEY (document_id, target_language)
    );

    CREATE INDEX IF NOT EXISTS idx_snapshots_updated ON snapshots(updated_at);
"#;

/// Create the snapshot table on a fresh database and check the version on an old one
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    match schema_version(conn)? {
        0 => {
            info!("Initializing snapshot schema v{}", SCHEMA_VERSION);
            // A crash mid-write leaves the previous snapshot readable
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            conn.execute_batch(CREATE_SNAPSHOTS)
                .context("Failed to create snapshots table")?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            Ok(())
        }
        SCHEMA_VERSION => {
            debug!("Snapshot schema is up to date (v{})", SCHEMA_VERSION);
            Ok(())
        }
        other => Err(anyhow!(
            "Snapshot database has schema v{}, this build understands v{}",
            other,
            SCHEMA_VERSION
        )),
    }
}

fn schema_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("Failed to read schema version")
}
