/*!
 * Backend selection, fallback and caching.
 *
 * The hub owns the backends in priority order. A batch goes to the requested
 * backend only, or else down the priority list; each backend gets a bounded
 * number of retries with linear backoff before the hub falls through to the
 * next one. Results are validated against the request before they are cached
 * or returned.
 */

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::app_config::Config;
use crate::errors::{AttemptLog, BackendError, BackendErrorKind, TranslationError};
use crate::records::{Record, RecordSet};
use crate::translation::backend::{TranslationBackend, build_backends};
use crate::translation::cache::{CacheKey, CacheStats, TranslationCache};

/// Engine name reported when a batch is served from the cache
pub const CACHE_ENGINE: &str = "cache";

/// Default retries per backend
pub const DEFAULT_RETRY_COUNT: u32 = 2;

/// Default linear backoff base in milliseconds
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Dispatches batches to backends
pub struct TranslationHub {
    /// Backends in priority order
    backends: Vec<Arc<dyn TranslationBackend>>,

    /// Batch result cache
    cache: TranslationCache,

    /// Retries per backend after the first attempt
    retry_count: u32,

    /// Backoff base; attempt `n` waits `n * base`
    retry_backoff: Duration,

    /// Backend that produced the last result
    last_engine: RwLock<Option<String>>,
}

impl TranslationHub {
    /// Create a hub over backends in priority order
    pub fn new(backends: Vec<Arc<dyn TranslationBackend>>) -> Self {
        Self {
            backends,
            cache: TranslationCache::default(),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            last_engine: RwLock::new(None),
        }
    }

    /// Build the configured backends, cache and retry policy
    pub fn from_config(config: &Config) -> Self {
        let common = &config.translation.common;
        Self::new(build_backends(config))
            .with_cache(TranslationCache::new(common.cache_capacity))
            .with_retry(common.retry_count, common.retry_backoff_ms)
    }

    /// Use an explicit cache
    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = cache;
        self
    }

    /// Set retries per backend and the backoff base
    pub fn with_retry(mut self, retry_count: u32, backoff_ms: u64) -> Self {
        self.retry_count = retry_count;
        self.retry_backoff = Duration::from_millis(backoff_ms);
        self
    }

    /// Names of all registered backends, in priority order
    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// True if at least one backend can be used
    pub fn has_available_backend(&self) -> bool {
        self.backends.iter().any(|b| b.is_available())
    }

    /// Backend that produced the most recent result
    pub fn last_engine(&self) -> Option<String> {
        self.last_engine.read().clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Fail unless a batch could be dispatched with this preference
    pub fn check_selection(&self, preference: Option<&str>) -> Result<(), TranslationError> {
        self.candidates(preference).map(|_| ())
    }

    /// Backends to try for a request, failing before any network call
    fn candidates(&self, preference: Option<&str>) -> Result<Vec<Arc<dyn TranslationBackend>>, TranslationError> {
        if let Some(name) = preference {
            let backend = self
                .backends
                .iter()
                .find(|b| b.name().eq_ignore_ascii_case(name))
                .ok_or_else(|| TranslationError::UnknownBackend(name.to_string()))?;
            if !backend.is_available() {
                return Err(TranslationError::BackendUnavailable(backend.name().to_string()));
            }
            return Ok(vec![Arc::clone(backend)]);
        }

        let available: Vec<_> = self
            .backends
            .iter()
            .filter(|b| b.is_available())
            .cloned()
            .collect();
        if available.is_empty() {
            return Err(TranslationError::NoBackendAvailable);
        }
        Ok(available)
    }

    /// Translate a batch, with cache, retries and fallback.
    ///
    /// With a `preference`, only that backend is used.
    pub async fn translate_batch(
        &self,
        records: &[Record],
        target_language: &str,
        preference: Option<&str>,
    ) -> Result<RecordSet, TranslationError> {
        self.dispatch(records, target_language, preference, true).await
    }

    /// Like `translate_batch`, but always asks a backend. The new result
    /// replaces any cached one.
    pub async fn refresh_batch(
        &self,
        records: &[Record],
        target_language: &str,
        preference: Option<&str>,
    ) -> Result<RecordSet, TranslationError> {
        self.dispatch(records, target_language, preference, false).await
    }

    /// Evict the cached result for a batch whose output was rejected downstream
    pub fn forget_batch(&self, records: &[Record], target_language: &str, preference: Option<&str>) -> bool {
        let removed = self
            .cache
            .remove(&CacheKey::new(records, target_language, preference));
        if removed {
            debug!("Evicted rejected batch of {} record(s) from cache", records.len());
        }
        removed
    }

    async fn dispatch(
        &self,
        records: &[Record],
        target_language: &str,
        preference: Option<&str>,
        use_cache: bool,
    ) -> Result<RecordSet, TranslationError> {
        let candidates = self.candidates(preference)?;
        if records.is_empty() {
            return Ok(RecordSet::default());
        }

        let key = CacheKey::new(records, target_language, preference);
        if use_cache {
            if let Some(cached) = self.cache.get(&key) {
                *self.last_engine.write() = Some(CACHE_ENGINE.to_string());
                return Ok(cached);
            }
        }

        let mut attempts = Vec::new();
        for backend in candidates {
            match self.try_backend(backend.as_ref(), records, target_language, &mut attempts).await {
                Some(result) => {
                    *self.last_engine.write() = Some(backend.name().to_string());
                    self.cache.insert(key, result.clone());
                    return Ok(result);
                }
                None => {
                    warn!("Backend '{}' exhausted, falling through", backend.name());
                }
            }
        }

        info!("All backends failed for a batch of {} record(s)", records.len());
        Err(TranslationError::AllBackendsFailed {
            attempts: AttemptLog(attempts),
        })
    }

    /// Run one backend with retries; every failure is appended to `attempts`
    async fn try_backend(
        &self,
        backend: &dyn TranslationBackend,
        records: &[Record],
        target_language: &str,
        attempts: &mut Vec<BackendError>,
    ) -> Option<RecordSet> {
        for attempt in 0..=self.retry_count {
            if attempt > 0 {
                let delay = self.retry_backoff * attempt;
                debug!(
                    "Retrying '{}' in {}ms (attempt {}/{})",
                    backend.name(),
                    delay.as_millis(),
                    attempt,
                    self.retry_count
                );
                tokio::time::sleep(delay).await;
            }

            let outcome = backend
                .translate(records, target_language)
                .await
                .and_then(|result| validate_result(backend.name(), records, result));

            match outcome {
                Ok(result) => return Some(result),
                Err(error) => {
                    warn!("{}", error);
                    let fatal = error.kind == BackendErrorKind::CredentialMissing;
                    attempts.push(error);
                    if fatal {
                        break;
                    }
                }
            }
        }
        None
    }
}

/// Check that a result has one record per input carrying every input text key
pub fn validate_result(backend: &str, records: &[Record], result: RecordSet) -> Result<RecordSet, BackendError> {
    if result.len() != records.len() {
        return Err(BackendError::shape(
            backend,
            format!("expected {} records, got {}", records.len(), result.len()),
        ));
    }

    for (idx, (input, output)) in records.iter().zip(result.iter()).enumerate() {
        if let Some((key, _)) = input.text_cells().find(|(key, _)| output.text(key).is_none()) {
            return Err(BackendError::shape(
                backend,
                format!("record {} lacks text for '{}'", idx, key),
            ));
        }
    }

    Ok(result)
}
