/*!
 * # tablewai - resumable translation of tabular records with AI
 *
 * A Rust library for translating structured records (rows of column/value
 * pairs) from one language into another through language-model services.
 *
 * ## Features
 *
 * - Translate records using various AI backends with ordered fallback:
 *   - OpenAI API (and OpenAI-compatible servers such as LM Studio)
 *   - Anthropic API
 *   - Ollama (local LLM)
 * - Protect identifiers, format specifiers and embedded literals from the model
 * - Detect cells that are not yet in the target language
 * - Persist progress after every batch and resume after interruption
 * - Targeted retry of unfinished cells, and an audit pass over the output
 *
 * ## Architecture
 *
 * - `records` / `document`: the record model and the JSON document adapter
 * - `token_guard`: placeholder protection and restoration
 * - `language_detector`: target-language heuristic
 * - `providers`: HTTP clients for the remote services
 * - `translation`: backends, hub, orchestrator and quality pass
 * - `snapshot` / `database`: durable progress
 * - `app_config`, `app_controller`, `errors`, `language_utils`, `file_utils`
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod document;
pub mod errors;
pub mod file_utils;
pub mod language_detector;
pub mod language_utils;
pub mod providers;
pub mod records;
pub mod snapshot;
pub mod token_guard;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use document::TableDocument;
pub use errors::{AppError, BackendError, ProviderError, TranslationError};
pub use language_detector::is_likely_target_language;
pub use records::{CellValue, Record, RecordSet};
pub use snapshot::{SnapshotKey, SnapshotStore, TranslationSnapshot};
pub use token_guard::{protect, restore};
pub use translation::{BatchOrchestrator, RunMode, RunOutcome, TranslationHub};
