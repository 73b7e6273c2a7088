use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::database::RunStatus;
use crate::document::TableDocument;
use crate::file_utils::FileManager;
use crate::records::ColumnSchema;
use crate::snapshot::{SnapshotKey, SnapshotStore, SqliteSnapshotStore};
use crate::translation::{
    AuditReport, BatchOrchestrator, PauseHandle, ProgressEvent, RunMode, RunOutcome, TranslationHub,
};

// @module: Application controller for document translation

/// Per-invocation options for a translation
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    // @field: Continue from the stored snapshot
    pub resume: bool,

    // @field: Audit and retry once after the run
    pub audit: bool,

    // @field: Backend to use exclusively
    pub backend: Option<String>,

    // @field: Output path; defaults to `<stem>.<target>.<ext>` next to the input
    pub output: Option<PathBuf>,

    // @field: Columns offered for translation; empty means all
    pub columns: Vec<String>,
}

/// What a translation produced
#[derive(Debug, Clone)]
pub struct TranslateSummary {
    pub outcome: RunOutcome,
    /// Audit after the retry, when requested
    pub audit: Option<AuditReport>,
    /// Where the translated document was written; `None` while paused
    pub output_path: Option<PathBuf>,
    pub duration: Duration,
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Shared hub so the result cache spans calls
    hub: Arc<TranslationHub>,

    // @field: Durable progress
    store: Arc<dyn SnapshotStore>,

    // @field: Set on Ctrl-C
    pause: PauseHandle,
}

impl Controller {
    // @method: Create a controller with backends and store built from the configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let db_path = config.snapshot_db_path();
        let store = SqliteSnapshotStore::open(&db_path)
            .with_context(|| format!("Failed to open snapshot database: {:?}", db_path))?;
        let hub = TranslationHub::from_config(&config);
        Self::with_components(config, Arc::new(hub), Arc::new(store))
    }

    // @method: Create a controller around existing components
    pub fn with_components(config: Config, hub: Arc<TranslationHub>, store: Arc<dyn SnapshotStore>) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self {
            config,
            hub,
            store,
            pause: PauseHandle::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle that pauses a running translation at the next batch boundary
    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    fn orchestrator(&self, backend: Option<&str>) -> Result<BatchOrchestrator> {
        let orchestrator = BatchOrchestrator::from_config(&self.config, Arc::clone(&self.hub), Arc::clone(&self.store))?
            .with_pause_handle(self.pause.clone());
        let mut settings = orchestrator.settings().clone();
        settings.backend_preference = backend.map(str::to_string);
        Ok(orchestrator.with_settings(settings))
    }

    fn load_document(&self, input: &Path, columns: &[String]) -> Result<TableDocument> {
        if !FileManager::file_exists(input) {
            return Err(anyhow!("Input file does not exist: {:?}", input));
        }
        let schema = if columns.is_empty() {
            ColumnSchema::open()
        } else {
            ColumnSchema::with_columns(columns.iter().cloned())
        };
        TableDocument::load(input, &schema)
    }

    fn key_for(&self, document: &TableDocument) -> SnapshotKey {
        document.snapshot_key(&self.config.target_language)
    }

    fn progress_bar(total_rows: usize) -> ProgressBar {
        let progress_bar = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}% {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message(format!("0/{} rows", total_rows));
        progress_bar
    }

    fn update_progress(progress_bar: &ProgressBar, event: &ProgressEvent) {
        progress_bar.set_position(event.percent as u64);
        progress_bar.set_message(format!(
            "batch {}/{}, {}/{} rows ({})",
            event.batch_index,
            event.total_batches,
            event.completed_rows,
            event.total_rows,
            event.engine.as_deref().unwrap_or("-")
        ));
    }

    async fn write_output(&self, document: &TableDocument, key: &SnapshotKey, output: &Path) -> Result<()> {
        let snapshot = self
            .store
            .load(key)
            .await?
            .ok_or_else(|| anyhow!("No snapshot for {}", key))?;
        document.save_translated(&snapshot.records, output)?;
        info!("Success: {}", output.display());
        Ok(())
    }

    fn output_path(&self, input: &Path, output: Option<&Path>) -> PathBuf {
        output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| FileManager::generate_output_path(input, &self.config.target_language))
    }

    /// Translate a document, showing progress, and write the result
    pub async fn translate(&self, input: &Path, options: &TranslateOptions) -> Result<TranslateSummary> {
        let start_time = Instant::now();
        let document = self.load_document(input, &options.columns)?;
        let key = self.key_for(&document);
        let orchestrator = self.orchestrator(options.backend.as_deref())?;
        let mode = if options.resume { RunMode::Resume } else { RunMode::Fresh };

        info!(
            "tablewai: {} record(s), {} -> {} ({})",
            document.records().len(),
            self.config.source_language,
            self.config.target_language,
            self.hub.backend_names().join(" > ")
        );

        let progress_bar = Self::progress_bar(document.records().len());
        let pb = progress_bar.clone();
        let on_progress = move |event: &ProgressEvent| Self::update_progress(&pb, event);

        let (outcome, audit) = if options.audit {
            let audited = orchestrator
                .run_with_audit(&key, document.records(), mode, on_progress)
                .await?;
            (audited.outcome, audited.audit)
        } else {
            let outcome = orchestrator.run(&key, document.records(), mode, on_progress).await?;
            (outcome, None)
        };
        progress_bar.finish_and_clear();

        let output_path = if outcome.status == RunStatus::Paused {
            warn!("Paused; run again with --resume to continue");
            None
        } else {
            let path = self.output_path(input, options.output.as_deref());
            self.write_output(&document, &key, &path).await?;
            Some(path)
        };

        Self::log_outcome(&outcome);
        let duration = start_time.elapsed();
        info!("Finished in {}", Self::format_duration(duration));

        Ok(TranslateSummary {
            outcome,
            audit,
            output_path,
            duration,
        })
    }

    /// Re-translate the unfinished cells of explicit rows
    pub async fn retry(
        &self,
        input: &Path,
        rows: &BTreeSet<usize>,
        options: &TranslateOptions,
    ) -> Result<TranslateSummary> {
        let start_time = Instant::now();
        let document = self.load_document(input, &options.columns)?;
        let key = self.key_for(&document);
        let orchestrator = self.orchestrator(options.backend.as_deref())?;

        let progress_bar = Self::progress_bar(rows.len());
        let pb = progress_bar.clone();
        let outcome = orchestrator
            .retry_rows(&key, document.records(), rows, move |event: &ProgressEvent| {
                Self::update_progress(&pb, event)
            })
            .await?;
        progress_bar.finish_and_clear();

        let path = self.output_path(input, options.output.as_deref());
        self.write_output(&document, &key, &path).await?;
        Self::log_outcome(&outcome);

        Ok(TranslateSummary {
            outcome,
            audit: None,
            output_path: Some(path),
            duration: start_time.elapsed(),
        })
    }

    /// Audit the stored translation without retrying
    pub async fn audit(&self, input: &Path, columns: &[String]) -> Result<AuditReport> {
        let document = self.load_document(input, columns)?;
        let key = self.key_for(&document);
        self.orchestrator(None)?.audit(&key, document.records()).await
    }

    /// Give up on rows
    pub async fn abandon(&self, input: &Path, rows: &BTreeSet<usize>, columns: &[String]) -> Result<RunOutcome> {
        let document = self.load_document(input, columns)?;
        let key = self.key_for(&document);
        let outcome = self.orchestrator(None)?.abandon_rows(&key, document.records(), rows).await?;
        Self::log_outcome(&outcome);
        Ok(outcome)
    }

    /// Forget stored progress for the document and target language
    pub async fn clear(&self, input: &Path, columns: &[String]) -> Result<bool> {
        let document = self.load_document(input, columns)?;
        let key = self.key_for(&document);
        let cleared = self.orchestrator(None)?.clear(&key).await?;
        if cleared {
            info!("Cleared snapshot {}", key);
        } else {
            info!("No snapshot stored for {}", key);
        }
        Ok(cleared)
    }

    fn log_outcome(outcome: &RunOutcome) {
        info!(
            "{}/{} rows complete ({})",
            outcome.completed_rows, outcome.total_rows, outcome.status
        );
        if outcome.retry_available {
            let rows: Vec<String> = outcome.missing_rows.iter().map(|r| r.to_string()).collect();
            warn!(
                "{} row(s) still missing; retry with: retry --rows {}",
                rows.len(),
                rows.join(",")
            );
        }
        if !outcome.exhausted_rows.is_empty() {
            info!("{} row(s) abandoned", outcome.exhausted_rows.len());
        }
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
