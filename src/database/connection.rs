/*!
 * SQLite connection handle.
 *
 * One connection per store, shared behind a lock. Async callers go through
 * `execute_async`, which moves the query onto the blocking pool.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::Connection;

use super::schema;

/// Database file name used when no path is configured
pub(crate) const DEFAULT_DB_FILENAME: &str = "tablewai.db";

/// Directory created under the user data dir
const DEFAULT_DB_DIRNAME: &str = "tablewai";

/// Shared SQLite connection
#[derive(Clone)]
pub struct DatabaseConnection {
    db_path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open or create the database at `db_path`, creating parent directories
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        info!("Opening snapshot database at: {:?}", db_path);
        let conn = Connection::open(&db_path).with_context(|| format!("Failed to open database: {:?}", db_path))?;
        Self::wrap(conn, db_path)
    }

    /// Throwaway database for tests
    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory snapshot database");
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        Self::wrap(conn, PathBuf::from(":memory:"))
    }

    fn wrap(conn: Connection, db_path: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn)?;
        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// `<data dir>/tablewai/tablewai.db`
    pub fn default_database_path() -> Result<PathBuf> {
        dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .map(|base| base.join(DEFAULT_DB_DIRNAME).join(DEFAULT_DB_FILENAME))
            .ok_or_else(|| anyhow!("Could not determine data directory"))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` against the connection on the current thread
    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        f(&self.connection.lock())
    }

    /// Run `f` against the connection on the blocking pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || f(&connection.lock()))
            .await
            .context("Database task panicked")?
    }

    /// Rows in the snapshots table
    pub fn snapshot_count(&self) -> Result<i64> {
        self.execute(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?))
    }
}
