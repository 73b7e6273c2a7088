/*!
 * Resumable batch translation of a record set.
 *
 * The orchestrator walks a document in small batches of rows. Each row moves
 * through `Pending -> InFlight -> Complete | Incomplete`; only an operator can
 * move a row to `Exhausted`. After every batch the whole working state is
 * written to the snapshot store, so a paused or interrupted run resumes from
 * the first incomplete row without re-translating finished rows.
 *
 * Backend failures never abort a run. A batch that no backend could translate
 * leaves its rows `Incomplete` and the run moves on; those rows are reported
 * as missing and can be fed to `retry_rows`.
 */

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::app_config::{Config, GlossaryEntry};
use crate::database::models::RunStatus;
use crate::errors::TranslationError;
use crate::language_detector::{is_likely_target_language, is_neutral};
use crate::records::{CellAddress, CellValue, LockedKeys, Record, RecordSet};
use crate::snapshot::{SnapshotKey, SnapshotStore, TranslationSnapshot};
use crate::token_guard::{self, PlaceholderMap, new_placeholders};
use crate::translation::hub::TranslationHub;
use crate::translation::quality::{Polisher, QualityReport, run_quality_checks};

/// Lifecycle of one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Pending,
    InFlight,
    Complete,
    /// Failed or unverified; eligible for retry
    Incomplete,
    /// Given up on by an operator
    Exhausted,
}

/// Cooperative pause flag, checked between batches
#[derive(Debug, Clone, Default)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running orchestrator to stop after the current batch
    pub fn pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a pause request
    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Whether to start over or continue from the stored snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Fresh,
    Resume,
}

/// Progress report emitted after every batch
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Share of batches done, 0-100
    pub percent: u8,
    /// 1-based index of the batch just finished
    pub batch_index: usize,
    pub total_batches: usize,
    /// Backend that served the last successful batch
    pub engine: Option<String>,
    pub completed_rows: usize,
    pub total_rows: usize,
}

/// Result of a run, retry or abandon call
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub total_rows: usize,
    pub completed_rows: usize,
    /// Rows left incomplete by failed batches
    pub missing_rows: BTreeSet<usize>,
    pub exhausted_rows: BTreeSet<usize>,
    /// Batches sent to the hub
    pub batches_dispatched: usize,
    /// True when `missing_rows` can be fed to `retry_rows`
    pub retry_available: bool,
}

/// Cells still needing work after a run
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    /// Columns failing the language check or a retry-worthy quality check, per row
    pub discrepancies: BTreeMap<usize, BTreeSet<String>>,
    pub quality: QualityReport,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn discrepant_rows(&self) -> BTreeSet<usize> {
        self.discrepancies.keys().copied().collect()
    }

    pub fn cell_count(&self) -> usize {
        self.discrepancies.values().map(BTreeSet::len).sum()
    }

    /// Discrepant cells in row, then column order
    pub fn cells(&self) -> Vec<CellAddress> {
        self.discrepancies
            .iter()
            .flat_map(|(row, columns)| columns.iter().map(move |column| CellAddress::new(*row, column.clone())))
            .collect()
    }
}

/// A run followed by an audit, one targeted retry and a re-audit
#[derive(Debug, Clone)]
pub struct AuditedRun {
    pub outcome: RunOutcome,
    /// Audit after the retry; `None` when the run was paused
    pub audit: Option<AuditReport>,
    /// Rows sent to targeted retry
    pub retried_rows: BTreeSet<usize>,
}

/// Tunables for a run
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Rows per batch on a full run
    pub batch_size: usize,
    /// Rows per batch on a targeted retry
    pub retry_batch_size: usize,
    pub inter_batch_delay: Duration,
    /// Skip cells already in the target language
    pub selective: bool,
    /// Send every batch to this backend only
    pub backend_preference: Option<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            retry_batch_size: 3,
            inter_batch_delay: Duration::from_millis(300),
            selective: false,
            backend_preference: None,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        let common = &config.translation.common;
        Self {
            batch_size: common.batch_size,
            retry_batch_size: common.retry_batch_size,
            inter_batch_delay: Duration::from_millis(common.inter_batch_delay_ms),
            selective: config.orchestrator.selective,
            backend_preference: None,
        }
    }
}

/// How a batch reaches the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    /// Full run batches; cached results are reused
    Run,
    /// Targeted retry batches; always sent to a backend
    Retry,
}

/// Cells of one row to send in a batch
#[derive(Debug, Clone)]
struct CellJob {
    row: usize,
    columns: Vec<String>,
}

/// Working copy of the document plus per-row state
#[derive(Debug, Clone)]
struct WorkState {
    records: Vec<Record>,
    rows: Vec<RowState>,
}

impl WorkState {
    fn fresh(source: &RecordSet) -> Self {
        Self {
            records: source.records().to_vec(),
            rows: vec![RowState::Pending; source.len()],
        }
    }

    /// Rebuild from a snapshot. A snapshot of another length is merged row by
    /// row, falling back to the source where the snapshot has no row.
    fn from_snapshot(snapshot: TranslationSnapshot, source: &RecordSet) -> Self {
        let stored_rows = snapshot.records.len();
        let records = if stored_rows == source.len() {
            snapshot.records
        } else {
            warn!(
                "Snapshot has {} rows, document has {}; merging row by row",
                stored_rows,
                source.len()
            );
            source
                .iter()
                .enumerate()
                .map(|(idx, original)| snapshot.records.get(idx).unwrap_or(original).clone())
                .collect()
        };

        let rows = (0..source.len())
            .map(|idx| {
                if snapshot.exhausted_rows.contains(&idx) {
                    RowState::Exhausted
                } else if idx < stored_rows && snapshot.completion_flags.get(idx).copied().unwrap_or(false) {
                    RowState::Complete
                } else {
                    RowState::Pending
                }
            })
            .collect();

        Self { records, rows }
    }

    fn completed(&self) -> usize {
        self.rows.iter().filter(|s| **s == RowState::Complete).count()
    }

    fn rows_in(&self, state: RowState) -> BTreeSet<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == state)
            .map(|(idx, _)| idx)
            .collect()
    }

    fn is_settled(&self) -> bool {
        self.rows
            .iter()
            .all(|s| matches!(s, RowState::Complete | RowState::Exhausted))
    }

    fn first_unsettled(&self) -> Option<usize> {
        self.rows
            .iter()
            .position(|s| !matches!(s, RowState::Complete | RowState::Exhausted))
    }

    fn snapshot(&self, target_language: &str, run_id: &str, status: RunStatus) -> TranslationSnapshot {
        TranslationSnapshot {
            target_language: target_language.to_string(),
            records: self.records.clone(),
            completion_flags: self.rows.iter().map(|s| *s == RowState::Complete).collect(),
            missing_rows: self.rows_in(RowState::Incomplete),
            exhausted_rows: self.rows_in(RowState::Exhausted),
            run_id: run_id.to_string(),
            status,
            updated_at: Utc::now(),
        }
    }

    fn outcome(&self, status: RunStatus, batches_dispatched: usize) -> RunOutcome {
        let missing_rows = self.rows_in(RowState::Incomplete);
        RunOutcome {
            status,
            total_rows: self.rows.len(),
            completed_rows: self.completed(),
            retry_available: !missing_rows.is_empty(),
            missing_rows,
            exhausted_rows: self.rows_in(RowState::Exhausted),
            batches_dispatched,
        }
    }
}

/// Drives translation of one document into one target language at a time
pub struct BatchOrchestrator {
    hub: Arc<TranslationHub>,
    store: Arc<dyn SnapshotStore>,
    settings: OrchestratorSettings,
    locked: LockedKeys,
    glossary: Vec<GlossaryEntry>,
    pause: PauseHandle,
}

impl BatchOrchestrator {
    pub fn new(hub: Arc<TranslationHub>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            hub,
            store,
            settings: OrchestratorSettings::default(),
            locked: LockedKeys::default(),
            glossary: Vec::new(),
            pause: PauseHandle::new(),
        }
    }

    /// Build from configuration
    pub fn from_config(config: &Config, hub: Arc<TranslationHub>, store: Arc<dyn SnapshotStore>) -> Result<Self> {
        let locked = LockedKeys::new(&config.orchestrator.locked_key_pattern)
            .with_context(|| format!("Invalid locked key pattern: {}", config.orchestrator.locked_key_pattern))?;
        Ok(Self::new(hub, store)
            .with_settings(OrchestratorSettings::from_config(config))
            .with_locked_keys(locked)
            .with_glossary(config.glossary.clone()))
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_locked_keys(mut self, locked: LockedKeys) -> Self {
        self.locked = locked;
        self
    }

    pub fn with_glossary(mut self, glossary: Vec<GlossaryEntry>) -> Self {
        self.glossary = glossary;
        self
    }

    pub fn with_pause_handle(mut self, pause: PauseHandle) -> Self {
        self.pause = pause;
        self
    }

    /// Handle that pauses this orchestrator
    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn hub(&self) -> &TranslationHub {
        &self.hub
    }

    /// Text cells of a source row that a run translates
    pub fn translatable_cells(&self, source_row: &Record, target_language: &str) -> Vec<String> {
        source_row
            .text_cells()
            .filter(|(key, text)| !self.locked.is_locked(key) && !is_neutral(text))
            .filter(|(_, text)| !self.settings.selective || !is_likely_target_language(text, target_language))
            .map(|(key, _)| key.to_string())
            .collect()
    }

    /// Translatable cells of a row that still need work.
    ///
    /// A cell needs work when it fails the language check, carries a
    /// placeholder its source did not have, or still equals its source on a
    /// row that was never completed.
    fn unfinished_cells(&self, source_row: &Record, current: &Record, row_complete: bool, target: &str) -> Vec<String> {
        self.translatable_cells(source_row, target)
            .into_iter()
            .filter(|key| {
                let source_text = source_row.text(key).unwrap_or_default();
                let Some(value) = current.text(key) else {
                    return true;
                };
                !is_likely_target_language(value, target)
                    || !new_placeholders(source_text, value).is_empty()
                    || (!row_complete && value == source_text)
            })
            .collect()
    }

    /// True when every translatable cell of the row is in the target language
    /// and carries no new placeholder
    fn row_passes(&self, source_row: &Record, current: &Record, target: &str) -> bool {
        self.translatable_cells(source_row, target).iter().all(|key| {
            let source_text = source_row.text(key).unwrap_or_default();
            current.text(key).is_some_and(|value| {
                is_likely_target_language(value, target) && new_placeholders(source_text, value).is_empty()
            })
        })
    }

    async fn load_state(&self, key: &SnapshotKey, source: &RecordSet) -> Result<Option<WorkState>> {
        let snapshot = self
            .store
            .load(key)
            .await
            .with_context(|| format!("Failed to load snapshot {}", key))?;
        Ok(snapshot.map(|s| WorkState::from_snapshot(s, source)))
    }

    async fn require_state(&self, key: &SnapshotKey, source: &RecordSet) -> Result<WorkState> {
        self.load_state(key, source)
            .await?
            .ok_or_else(|| anyhow!("No snapshot for {}; run a translation first", key))
    }

    async fn save_state(&self, key: &SnapshotKey, state: &WorkState, run_id: &str, status: RunStatus) -> Result<()> {
        let snapshot = state.snapshot(&key.target_language, run_id, status);
        self.store
            .save(key, &snapshot)
            .await
            .with_context(|| format!("Failed to save snapshot {}", key))?;
        debug!(
            "Snapshot {} saved ({}/{} rows complete, {})",
            key,
            snapshot.completed_rows(),
            snapshot.records.len(),
            status
        );
        Ok(())
    }

    /// Translate a document, from scratch or from its stored snapshot.
    ///
    /// Fails only when no backend can be selected, or the snapshot store
    /// fails. `progress` is called after every batch.
    pub async fn run<F>(&self, key: &SnapshotKey, source: &RecordSet, mode: RunMode, mut progress: F) -> Result<RunOutcome>
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        let target = key.target_language.as_str();
        let resumed = match mode {
            RunMode::Resume => self.load_state(key, source).await?,
            RunMode::Fresh => None,
        };

        let mut state = match resumed {
            Some(state) => {
                if state.is_settled() {
                    info!("Snapshot {} is already complete; nothing to do", key);
                    return Ok(state.outcome(RunStatus::Completed, 0));
                }
                info!(
                    "Resuming {} from row {} ({}/{} rows complete)",
                    key,
                    state.first_unsettled().unwrap_or(0),
                    state.completed(),
                    source.len()
                );
                state
            }
            None => {
                if mode == RunMode::Resume {
                    info!("No snapshot for {}; starting fresh", key);
                }
                WorkState::fresh(source)
            }
        };

        let mut jobs = Vec::new();
        for row in 0..state.rows.len() {
            if state.rows[row] != RowState::Pending && state.rows[row] != RowState::Incomplete {
                continue;
            }
            let columns = self.translatable_cells(&source.records()[row], target);
            if columns.is_empty() {
                state.rows[row] = RowState::Complete;
            } else {
                state.rows[row] = RowState::Pending;
                jobs.push(CellJob { row, columns });
            }
        }

        if !jobs.is_empty() {
            self.hub.check_selection(self.settings.backend_preference.as_deref())?;
        }
        if mode == RunMode::Fresh && self.store.clear(key).await? {
            debug!("Cleared previous snapshot {}", key);
        }

        let run_id = Uuid::new_v4().to_string();
        info!(
            "Translating {} row(s) of {} into {} in batches of {}",
            jobs.len(),
            key,
            target,
            self.settings.batch_size
        );
        self.drive(key, source, &mut state, jobs, Dispatch::Run, &run_id, &mut progress)
            .await
    }

    /// Re-translate only the unfinished cells of the given rows, from their source text
    pub async fn retry_rows<F>(
        &self,
        key: &SnapshotKey,
        source: &RecordSet,
        rows: &BTreeSet<usize>,
        mut progress: F,
    ) -> Result<RunOutcome>
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        let target = key.target_language.as_str();
        let mut state = self.require_state(key, source).await?;

        let mut jobs = Vec::new();
        for &row in rows {
            let (Some(source_row), Some(current)) = (source.get(row), state.records.get(row)) else {
                warn!("Row {} is outside the document; skipping", row);
                continue;
            };
            if state.rows[row] == RowState::Exhausted {
                warn!("Row {} was abandoned; skipping", row);
                continue;
            }

            let complete = state.rows[row] == RowState::Complete;
            let columns = self.unfinished_cells(source_row, current, complete, target);
            if columns.is_empty() {
                state.rows[row] = if self.row_passes(source_row, current, target) {
                    RowState::Complete
                } else {
                    RowState::Incomplete
                };
            } else {
                debug!("Row {}: retrying {}", row, columns.join(", "));
                jobs.push(CellJob { row, columns });
            }
        }

        if !jobs.is_empty() {
            self.hub.check_selection(self.settings.backend_preference.as_deref())?;
        }

        let run_id = Uuid::new_v4().to_string();
        info!("Retrying {} row(s) of {}", jobs.len(), key);
        self.drive(key, source, &mut state, jobs, Dispatch::Retry, &run_id, &mut progress)
            .await
    }

    /// Sweep every output cell for language and quality problems
    pub async fn audit(&self, key: &SnapshotKey, source: &RecordSet) -> Result<AuditReport> {
        let target = key.target_language.as_str();
        let state = self.require_state(key, source).await?;

        let mut discrepancies: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
        for (row, (source_row, current)) in source.iter().zip(&state.records).enumerate() {
            if state.rows[row] == RowState::Exhausted {
                continue;
            }
            for column in self.translatable_cells(source_row, target) {
                let passes = current
                    .text(&column)
                    .is_some_and(|value| is_likely_target_language(value, target));
                if !passes {
                    discrepancies.entry(row).or_default().insert(column);
                }
            }
        }

        let quality = run_quality_checks(source.records(), &state.records, &self.locked, target);
        for (row, columns) in quality.retry_cells() {
            if state.rows.get(row) != Some(&RowState::Exhausted) {
                discrepancies.entry(row).or_default().extend(columns);
            }
        }

        let report = AuditReport { discrepancies, quality };
        info!(
            "Audit of {}: {} discrepant cell(s) in {} row(s)",
            key,
            report.cell_count(),
            report.discrepancies.len()
        );
        Ok(report)
    }

    /// Run, audit, retry the discrepant rows once, then audit again
    pub async fn run_with_audit<F>(
        &self,
        key: &SnapshotKey,
        source: &RecordSet,
        mode: RunMode,
        mut progress: F,
    ) -> Result<AuditedRun>
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        let outcome = self.run(key, source, mode, &mut progress).await?;
        if outcome.status == RunStatus::Paused {
            return Ok(AuditedRun {
                outcome,
                audit: None,
                retried_rows: BTreeSet::new(),
            });
        }

        let first = self.audit(key, source).await?;
        if first.is_clean() {
            return Ok(AuditedRun {
                outcome,
                audit: Some(first),
                retried_rows: BTreeSet::new(),
            });
        }

        let retried_rows = first.discrepant_rows();
        let outcome = self.retry_rows(key, source, &retried_rows, &mut progress).await?;
        let audit = self.audit(key, source).await?;
        if !audit.is_clean() {
            warn!(
                "{} cell(s) still need manual attention after retry",
                audit.cell_count()
            );
        }

        Ok(AuditedRun {
            outcome,
            audit: Some(audit),
            retried_rows,
        })
    }

    /// Mark rows as given up on; they are skipped by later runs and retries
    pub async fn abandon_rows(&self, key: &SnapshotKey, source: &RecordSet, rows: &BTreeSet<usize>) -> Result<RunOutcome> {
        let snapshot = self
            .store
            .load(key)
            .await?
            .ok_or_else(|| anyhow!("No snapshot for {}; run a translation first", key))?;
        let status = snapshot.status;
        let run_id = snapshot.run_id.clone();
        let mut state = WorkState::from_snapshot(snapshot, source);

        for &row in rows {
            match state.rows.get_mut(row) {
                Some(slot) => *slot = RowState::Exhausted,
                None => warn!("Row {} is outside the document; skipping", row),
            }
        }

        self.save_state(key, &state, &run_id, status).await?;
        info!("Abandoned {} row(s) of {}", rows.len(), key);
        Ok(state.outcome(status, 0))
    }

    /// Remove the stored snapshot
    pub async fn clear(&self, key: &SnapshotKey) -> Result<bool> {
        self.store.clear(key).await
    }

    /// Dispatch jobs batch by batch, saving after each one
    #[allow(clippy::too_many_arguments)]
    async fn drive<F>(
        &self,
        key: &SnapshotKey,
        source: &RecordSet,
        state: &mut WorkState,
        jobs: Vec<CellJob>,
        dispatch: Dispatch,
        run_id: &str,
        progress: &mut F,
    ) -> Result<RunOutcome>
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        if jobs.is_empty() {
            self.save_state(key, state, run_id, RunStatus::Completed).await?;
            return Ok(state.outcome(RunStatus::Completed, 0));
        }

        let target = key.target_language.as_str();
        let polisher = Polisher::new(target, &self.glossary);
        let batch_size = match dispatch {
            Dispatch::Run => self.settings.batch_size,
            Dispatch::Retry => self.settings.retry_batch_size,
        };
        let batches: Vec<&[CellJob]> = jobs.chunks(batch_size.max(1)).collect();
        let total = batches.len();

        for (idx, batch) in batches.iter().enumerate() {
            let dispatched = self.dispatch_batch(source, state, batch, target, &polisher, dispatch).await;
            if let Err(error) = dispatched {
                self.save_state(key, state, run_id, RunStatus::Paused).await?;
                return Err(error.into());
            }

            let last = idx + 1 == total;
            progress(&ProgressEvent {
                percent: ((idx + 1) * 100 / total) as u8,
                batch_index: idx + 1,
                total_batches: total,
                engine: self.hub.last_engine(),
                completed_rows: state.completed(),
                total_rows: state.rows.len(),
            });

            let status = if last {
                RunStatus::Completed
            } else if self.pause.is_paused() {
                RunStatus::Paused
            } else {
                RunStatus::InProgress
            };
            self.save_state(key, state, run_id, status).await?;

            if status == RunStatus::Paused {
                info!("Paused {} after batch {}/{}", key, idx + 1, total);
                return Ok(state.outcome(RunStatus::Paused, idx + 1));
            }
            if !last && !self.settings.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_batch_delay).await;
            }
        }

        let outcome = state.outcome(RunStatus::Completed, total);
        info!(
            "Finished {}: {}/{} rows complete, {} missing",
            key,
            outcome.completed_rows,
            outcome.total_rows,
            outcome.missing_rows.len()
        );
        Ok(outcome)
    }

    /// Send one batch and merge what comes back.
    ///
    /// Only a selection failure is returned as an error; a batch that every
    /// backend failed leaves its rows `Incomplete`.
    async fn dispatch_batch(
        &self,
        source: &RecordSet,
        state: &mut WorkState,
        batch: &[CellJob],
        target: &str,
        polisher: &Polisher,
        dispatch: Dispatch,
    ) -> Result<(), TranslationError> {
        let mut requests = Vec::with_capacity(batch.len());
        let mut guards: Vec<Vec<Option<PlaceholderMap>>> = Vec::with_capacity(batch.len());

        for job in batch {
            let source_row = &source.records()[job.row];
            let mut request = Record::new();
            let mut maps = Vec::with_capacity(job.columns.len());
            for column in &job.columns {
                let (sanitized, map) = token_guard::protect(source_row.text(column).unwrap_or_default());
                request.set(column.clone(), CellValue::Text(sanitized));
                maps.push(map);
            }
            requests.push(request);
            guards.push(maps);
            state.rows[job.row] = RowState::InFlight;
        }

        let preference = self.settings.backend_preference.as_deref();
        let result = match dispatch {
            Dispatch::Run => self.hub.translate_batch(&requests, target, preference).await,
            // A retry must reach a backend even if this exact batch was answered before
            Dispatch::Retry => self.hub.refresh_batch(&requests, target, preference).await,
        };

        let translated = match result {
            Ok(translated) => translated,
            Err(TranslationError::AllBackendsFailed { attempts }) => {
                warn!(
                    "Batch of rows {:?} failed on every backend: {}",
                    batch.iter().map(|j| j.row).collect::<Vec<_>>(),
                    attempts
                );
                for job in batch {
                    state.rows[job.row] = RowState::Incomplete;
                }
                return Ok(());
            }
            Err(error) => {
                for job in batch {
                    state.rows[job.row] = RowState::Incomplete;
                }
                return Err(error);
            }
        };

        for ((job, maps), output) in batch.iter().zip(&guards).zip(translated.iter()) {
            let source_row = &source.records()[job.row];
            let mut accepted = true;

            for (column, map) in job.columns.iter().zip(maps) {
                if self.locked.is_locked(column) {
                    continue;
                }
                let source_text = source_row.text(column).unwrap_or_default();
                let Some(raw) = output.text(column) else {
                    accepted = false;
                    continue;
                };

                // Polish while guarded content is still behind placeholders
                let polished = polisher.polish(source_text, raw);
                let restored = token_guard::restore(&polished, map.as_ref());
                let leaked = new_placeholders(source_text, &restored);
                if !leaked.is_empty() {
                    warn!("Row {}, '{}': rejected value with leaked {:?}", job.row, column, leaked);
                    accepted = false;
                    continue;
                }
                state.records[job.row].set(column.clone(), CellValue::Text(restored));
            }

            let passes = self.row_passes(source_row, &state.records[job.row], target);
            state.rows[job.row] = if accepted && passes {
                RowState::Complete
            } else {
                RowState::Incomplete
            };
        }

        let rejected = batch.iter().any(|job| state.rows[job.row] != RowState::Complete);
        if rejected && self.hub.forget_batch(&requests, target, preference) {
            debug!("Batch result rejected; it will not be served from cache again");
        }

        Ok(())
    }
}
