/*!
 * SQLite persistence for translation snapshots.
 *
 * One row per (document identity, target language), overwritten wholesale
 * after every batch.
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

use std::path::PathBuf;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{RunStatus, SnapshotRecord};
pub use repository::Repository;

/// Default database path, or a file in the working directory when no data dir exists
pub fn default_database_path() -> PathBuf {
    DatabaseConnection::default_database_path()
        .unwrap_or_else(|_| PathBuf::from(connection::DEFAULT_DB_FILENAME))
}
