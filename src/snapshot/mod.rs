/*!
 * Durable translation progress.
 *
 * A snapshot is written after every batch and read back on resume. Stores are
 * injected into the orchestrator so tests can use the in-memory variant.
 */

pub mod models;
pub mod store;

pub use models::{SnapshotKey, TranslationSnapshot};
pub use store::{MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};
