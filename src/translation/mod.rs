/*!
 * Batch translation of tabular records.
 *
 * - `backend`: uniform translate interface over the providers
 * - `prompts`: the shared instruction prompt and record payload
 * - `response`: repair and validation of model output
 * - `cache`: bounded cache of translated batches
 * - `hub`: backend selection, fallback and retry
 * - `quality`: polishing of merged values and defect reports
 * - `orchestrator`: resumable per-row state machine over a document
 */

// Re-export main types for easier usage
pub use self::backend::{ProviderBackend, TranslationBackend, build_backends};
pub use self::cache::{CacheStats, TranslationCache};
pub use self::hub::TranslationHub;
pub use self::orchestrator::{
    AuditReport, AuditedRun, BatchOrchestrator, OrchestratorSettings, PauseHandle, ProgressEvent, RowState,
    RunMode, RunOutcome,
};
pub use self::prompts::{PromptTemplate, TranslationPromptBuilder};
pub use self::quality::{DefectCategory, Polisher, QualityReport, run_quality_checks};

// Submodules
pub mod backend;
pub mod cache;
pub mod hub;
pub mod orchestrator;
pub mod prompts;
pub mod quality;
pub mod response;
